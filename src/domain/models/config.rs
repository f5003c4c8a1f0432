use serde::{Deserialize, Serialize};

/// Main configuration structure for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session lifecycle configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Archive mirror configuration
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// ERP sync configuration
    #[serde(default)]
    pub sync: SyncConfig,

    /// Invitation configuration, including the invitable-test policy
    #[serde(default)]
    pub invitations: InvitationConfig,

    /// Background maintenance configuration
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            archive: ArchiveConfig::default(),
            sync: SyncConfig::default(),
            invitations: InvitationConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".appraise/appraise.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional directory for rolling file output
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Minutes a session may stay open before the expiry sweep closes it
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: u32,
}

const fn default_session_ttl_minutes() -> u32 {
    120
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

/// Archive mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArchiveConfig {
    /// Root directory of the file archive
    #[serde(default = "default_archive_root")]
    pub root: String,

    /// Maximum outbox jobs drained per maintenance pass
    #[serde(default = "default_archive_batch_size")]
    pub batch_size: u32,

    /// Attempts before a job is parked as failed
    #[serde(default = "default_archive_max_attempts")]
    pub max_attempts: u32,
}

fn default_archive_root() -> String {
    ".appraise/archive".to_string()
}

const fn default_archive_batch_size() -> u32 {
    50
}

const fn default_archive_max_attempts() -> u32 {
    10
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
            batch_size: default_archive_batch_size(),
            max_attempts: default_archive_max_attempts(),
        }
    }
}

/// ERP sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Seconds a sync lease stays valid before it is reclaimable
    #[serde(default = "default_sync_lease_seconds")]
    pub lease_seconds: u32,

    /// Connector request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u32,
}

const fn default_sync_lease_seconds() -> u32 {
    900
}

const fn default_request_timeout_seconds() -> u32 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_sync_lease_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

/// Invitation configuration.
///
/// `invitable_tests` is the deployment-specific allow-list of tests
/// that bulk invitations may target. It is injected into the invitation
/// service rather than hardcoded; an empty list allows every test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationConfig {
    /// Days an invitation token stays redeemable
    #[serde(default = "default_invitation_validity_days")]
    pub validity_days: u32,

    /// Tests that may be bulk-invited to; empty allows all
    #[serde(default)]
    pub invitable_tests: Vec<String>,
}

const fn default_invitation_validity_days() -> u32 {
    14
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            validity_days: default_invitation_validity_days(),
            invitable_tests: vec![],
        }
    }
}

/// Which tests bulk invitations may target.
///
/// Built from [`InvitationConfig::invitable_tests`] and handed to the
/// invitation service as a value, so tests and deployments can supply
/// their own.
#[derive(Debug, Clone, Default)]
pub struct InvitePolicy {
    allowed: Vec<String>,
}

impl InvitePolicy {
    /// Allow every test.
    pub fn allow_all() -> Self {
        Self { allowed: vec![] }
    }

    /// Allow only the listed test ids.
    pub fn allow_only<I, S>(tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: tests.into_iter().map(Into::into).collect(),
        }
    }

    pub fn permits(&self, test_id: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|t| t == test_id)
    }
}

impl From<&InvitationConfig> for InvitePolicy {
    fn from(config: &InvitationConfig) -> Self {
        Self {
            allowed: config.invitable_tests.clone(),
        }
    }
}

/// Background maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MaintenanceConfig {
    /// Seconds between maintenance cycles
    #[serde(default = "default_maintenance_interval_seconds")]
    pub interval_seconds: u32,

    /// Whether a cycle runs immediately on startup
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,

    /// Consecutive failed cycles tolerated before the daemon stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

const fn default_maintenance_interval_seconds() -> u32 {
    300
}

const fn default_run_on_startup() -> bool {
    true
}

const fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_maintenance_interval_seconds(),
            run_on_startup: default_run_on_startup(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_permits_everything() {
        let policy = InvitePolicy::allow_all();
        assert!(policy.permits("big5"));
        assert!(policy.permits("anything"));
    }

    #[test]
    fn restricted_policy_permits_only_listed_tests() {
        let policy = InvitePolicy::allow_only(["big5", "disc"]);
        assert!(policy.permits("big5"));
        assert!(!policy.permits("iq"));
    }
}
