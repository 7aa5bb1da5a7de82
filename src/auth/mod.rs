//! Authentication against the Grocery List backend

mod types;
mod session;

use reqwest::Client;

use crate::error::Error;
use crate::fetch::Fetch;

pub use types::*;
pub use session::*;

/// Client for the login and signup endpoints
#[derive(Clone)]
pub struct AuthClient {
    /// The base URL for the backend
    url: String,

    /// HTTP client used for requests
    client: Client,
}

impl AuthClient {
    /// Create a new auth client
    pub(crate) fn new(url: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/grocery{}", self.url, path)
    }

    /// Log in an existing user
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, Error> {
        self.authenticate("/login", username, password).await
    }

    /// Register a new user; the backend logs the new account straight in
    pub async fn signup(&self, username: &str, password: &str) -> Result<Session, Error> {
        self.authenticate("/signup", username, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, Error> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::validation("username and password are required"));
        }

        let url = self.endpoint(path);
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = Fetch::post(&self.client, &url)
            .json(&body)?
            .execute_raw()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let reason = serde_json::from_str::<AuthResponse>(&body)
                .ok()
                .and_then(|parsed| parsed.error)
                .unwrap_or(body);
            return Err(Error::auth(reason));
        }

        let parsed = response.json::<AuthResponse>().await?;
        match parsed.access_token {
            Some(token) => Ok(Session::new(token, username.to_string())),
            None => Err(Error::auth("response carried no access token")),
        }
    }
}
