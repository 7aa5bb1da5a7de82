//! Configuration options for the Grocery List client

use std::time::Duration;

/// Configuration options for the Grocery List client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// How long a checked item stays on the list before it is removed
    pub removal_delay: Duration,

    /// Minimum item-name length (in characters) before asking for a
    /// category prediction
    pub predict_min_chars: usize,

    /// Upper bound on the state save performed during logout
    pub logout_save_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            removal_delay: Duration::from_millis(800),
            predict_min_chars: 3,
            logout_save_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the checked-item removal delay
    pub fn with_removal_delay(mut self, value: Duration) -> Self {
        self.removal_delay = value;
        self
    }

    /// Set the prediction length threshold
    pub fn with_predict_min_chars(mut self, value: usize) -> Self {
        self.predict_min_chars = value;
        self
    }

    /// Set the bound on the logout-time state save
    pub fn with_logout_save_timeout(mut self, value: Duration) -> Self {
        self.logout_save_timeout = value;
        self
    }
}
