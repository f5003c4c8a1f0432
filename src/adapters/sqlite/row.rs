//! Shared row-decoding helpers for the SQLite adapters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

pub(crate) fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

pub(crate) fn parse_ts(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DomainError::SerializationError(e.to_string()))
}

pub(crate) fn parse_opt_ts(s: Option<&str>) -> DomainResult<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}
