//! Wire models for the generic JSON ERP connector.

use serde::{Deserialize, Serialize};

use crate::domain::models::RemoteEmployee;

/// Response of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Request body of the login endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    pub login: &'a str,
    pub password: &'a str,
}

/// One page of the employee roster.
#[derive(Debug, Clone, Deserialize)]
pub struct EmployeePage {
    pub employees: Vec<WireEmployee>,
    /// Page number to request next, absent on the last page.
    #[serde(default)]
    pub next_page: Option<u32>,
}

/// Employee record as the remote system serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEmployee {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

impl From<WireEmployee> for RemoteEmployee {
    fn from(wire: WireEmployee) -> Self {
        RemoteEmployee {
            external_id: wire.id,
            first_name: wire.first_name,
            last_name: wire.last_name,
            email: wire.email,
            department: wire.department,
            position: wire.position,
        }
    }
}
