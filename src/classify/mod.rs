//! Category prediction backed by the remote classifier
//!
//! Predictions are advisory. The classifier keeps exactly one current
//! suggestion; responses are applied only if no newer request has been
//! issued in the meantime, and failures leave the previous suggestion in
//! place rather than surfacing an error.

use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionContext;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::events::{ClientEvent, EventSender};
use crate::fetch::Fetch;

/// Request body for the prediction endpoint
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    #[serde(rename = "itemName")]
    item_name: &'a str,
}

/// Response body from the prediction endpoint
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(rename = "predictedCategory")]
    predicted_category: String,
}

#[derive(Debug, Default)]
struct Inner {
    prediction: Option<String>,
    loading: bool,
    /// Generation of the newest request issued; responses carrying an
    /// older generation are dropped
    latest: u64,
}

/// Client for the category prediction endpoint
#[derive(Clone)]
pub struct Classifier {
    url: String,
    client: Client,
    session: SessionContext,
    events: EventSender,
    options: ClientOptions,
    inner: Arc<Mutex<Inner>>,
}

impl Classifier {
    pub(crate) fn new(
        url: &str,
        client: Client,
        session: SessionContext,
        events: EventSender,
        options: ClientOptions,
    ) -> Self {
        Self {
            url: url.to_string(),
            client,
            session,
            events,
            options,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Feed the item name as typed so far. Names long enough to classify
    /// trigger a prediction request; shorter input clears the current
    /// suggestion without issuing a call.
    pub async fn suggest(&self, item_name: &str) {
        if item_name.chars().count() < self.options.predict_min_chars {
            self.clear();
            return;
        }

        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.latest += 1;
            inner.loading = true;
            inner.latest
        };

        let token = match self.session.token() {
            Some(token) => token,
            None => {
                self.fail(generation, "not authenticated".to_string());
                return;
            }
        };

        match self.request_prediction(item_name, &token).await {
            Ok(prediction) => self.apply(generation, prediction),
            Err(e) => {
                warn!(error = %e, "category prediction failed");
                self.fail(generation, e.to_string());
            }
        }
    }

    /// The current suggestion, if any
    pub fn prediction(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.prediction.clone()
    }

    /// Whether a prediction request is in flight
    pub fn is_loading(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.loading
    }

    /// Drop the current suggestion and invalidate any request in flight
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.latest += 1;
        inner.prediction = None;
        inner.loading = false;
    }

    async fn request_prediction(&self, item_name: &str, token: &str) -> Result<String, Error> {
        let url = format!("{}/grocery/predict", self.url);
        let request = PredictRequest { item_name };

        let response = Fetch::post(&self.client, &url)
            .bearer_auth(token)
            .json(&request)?
            .execute::<PredictResponse>()
            .await?;

        Ok(response.predicted_category)
    }

    fn apply(&self, generation: u64, prediction: String) {
        let mut inner = self.inner.lock().unwrap();
        if inner.latest != generation {
            debug!("discarding stale prediction response");
            return;
        }
        inner.prediction = Some(prediction);
        inner.loading = false;
    }

    fn fail(&self, generation: u64, reason: String) {
        let stale = {
            let mut inner = self.inner.lock().unwrap();
            if inner.latest == generation {
                inner.loading = false;
                false
            } else {
                true
            }
        };

        if !stale {
            self.events.emit(ClientEvent::PredictFailed { reason });
        }
    }
}
