//! Types for authentication and account creation

use serde::{Deserialize, Serialize};

/// Request body for the login and signup endpoints
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    /// The username
    pub username: String,

    /// The password
    pub password: String,
}

/// Authentication response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// The access token
    #[serde(rename = "access_token")]
    pub access_token: Option<String>,

    /// Any error that occurred
    pub error: Option<String>,

    /// Informational message returned on signup
    pub message: Option<String>,
}
