//! Session lifecycle and state synchronization with the backend
//!
//! The controller moves between two states, unauthenticated and
//! authenticated. Entering a session pulls the server's aggregate
//! wholesale; leaving one pushes it back under a bounded, best-effort
//! save. While authenticated, mutations mirror into a per-user cache and
//! adds are additionally reported item by item, fire and forget.

mod types;

pub use types::*;

use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::auth::{AuthClient, Session, SessionContext};
use crate::config::ClientOptions;
use crate::error::Error;
use crate::events::{ClientEvent, EventSender};
use crate::fetch::Fetch;
use crate::list::ListState;
use crate::storage::KvStore;

fn items_key(username: &str) -> String {
    format!("groceryItems_{}", username)
}

fn categories_key(username: &str) -> String {
    format!("categories_{}", username)
}

fn usage_key(username: &str) -> String {
    format!("categoryUsage_{}", username)
}

fn history_key(username: &str) -> String {
    format!("userHistory_{}", username)
}

fn parse_or_default<T: DeserializeOwned + Default>(key: &str, json: Option<&str>) -> T {
    match json {
        Some(json) => match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable cache entry");
                T::default()
            }
        },
        None => T::default(),
    }
}

/// Orchestrates the session state machine and all list persistence
#[derive(Clone)]
pub struct SyncController {
    url: String,
    client: Client,
    auth: AuthClient,
    session: SessionContext,
    storage: Arc<dyn KvStore>,
    state: Arc<Mutex<ListState>>,
    events: EventSender,
    options: ClientOptions,
}

impl SyncController {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        url: &str,
        client: Client,
        auth: AuthClient,
        session: SessionContext,
        storage: Arc<dyn KvStore>,
        state: Arc<Mutex<ListState>>,
        events: EventSender,
        options: ClientOptions,
    ) -> Self {
        Self {
            url: url.to_string(),
            client,
            auth,
            session,
            storage,
            state,
            events,
            options,
        }
    }

    /// Log in and pull the server's copy of the list
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        let session = self.auth.login(username, password).await?;
        self.enter_session(session).await;
        Ok(())
    }

    /// Create an account; the backend logs the new account straight in
    pub async fn signup(&self, username: &str, password: &str) -> Result<(), Error> {
        let session = self.auth.signup(username, password).await?;
        self.enter_session(session).await;
        Ok(())
    }

    /// Pick a persisted session back up, if one exists
    pub async fn restore_session(&self) -> Option<String> {
        let session = self.session.restore()?;
        let username = session.username.clone();
        info!(username = %username, "restored persisted session");
        self.events.emit(ClientEvent::SessionRestored {
            username: username.clone(),
        });
        self.load_user_data().await;
        Some(username)
    }

    async fn enter_session(&self, session: Session) {
        let username = session.username.clone();
        self.session.establish(session);
        info!(username = %username, "session established");
        self.events.emit(ClientEvent::LoggedIn { username });
        self.load_user_data().await;
    }

    /// Pull the whole aggregate from the server, replacing local state. A
    /// failed load leaves whatever is local in place.
    pub async fn load_user_data(&self) {
        let token = match self.session.token() {
            Some(token) => token,
            None => return,
        };

        let url = format!("{}/grocery/loadUserData", self.url);
        let result = Fetch::get(&self.client, &url)
            .bearer_auth(&token)
            .execute::<StateSnapshot>()
            .await;

        match result {
            Ok(snapshot) => {
                let items = snapshot.items.len();
                let categories = snapshot.categories.len();
                {
                    let mut state = self.state.lock().unwrap();
                    *state = snapshot.into_state();
                }
                info!(items, categories, "loaded user data");
                self.events.emit(ClientEvent::StateLoaded { items, categories });
            }
            Err(e) => {
                warn!(error = %e, "failed to load user data");
                self.events.emit(ClientEvent::LoadFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Push the whole aggregate to the server
    pub async fn save_state(&self) -> Result<(), Error> {
        let token = self
            .session
            .token()
            .ok_or_else(|| Error::auth("not logged in"))?;

        let snapshot = {
            let state = self.state.lock().unwrap();
            StateSnapshot::capture(&state)
        };

        self.post_checked("/grocery/saveState", &token, &snapshot)
            .await
    }

    /// Save, then tear the session down. The save is best effort and
    /// bounded; the session ends regardless of how it went.
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            match timeout(self.options.logout_save_timeout, self.save_state()).await {
                Ok(Ok(())) => self.events.emit(ClientEvent::StateSaved),
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to save state during logout");
                    self.events.emit(ClientEvent::SaveFailed {
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!("state save timed out during logout");
                    self.events.emit(ClientEvent::SaveFailed {
                        reason: "save timed out".to_string(),
                    });
                }
            }
        }

        self.session.clear();
        {
            let mut state = self.state.lock().unwrap();
            *state = ListState::default();
        }
        self.events.emit(ClientEvent::LoggedOut);
    }

    /// Report one added item to the server without holding up the caller
    pub(crate) fn save_item_detached(&self, item_name: String, category: String) {
        let token = match self.session.token() {
            Some(token) => token,
            None => return,
        };

        let controller = self.clone();
        tokio::spawn(async move {
            let request = SaveItemRequest {
                item_name: item_name.clone(),
                category,
            };

            match controller
                .post_checked("/grocery/saveItem", &token, &request)
                .await
            {
                Ok(()) => controller
                    .events
                    .emit(ClientEvent::ItemSaved { name: item_name }),
                Err(e) => {
                    warn!(error = %e, item = %item_name, "failed to save item");
                    controller.events.emit(ClientEvent::ItemSaveFailed {
                        name: item_name,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    /// Copy the current aggregate into the per-user cache. There is no
    /// cache key without a session, so unauthenticated edits stay in
    /// memory only.
    pub(crate) fn mirror_to_cache(&self) {
        let username = match self.session.username() {
            Some(username) => username,
            None => return,
        };

        let snapshot = {
            let state = self.state.lock().unwrap();
            StateSnapshot::capture(&state)
        };
        self.write_cache(&username, &snapshot);
    }

    fn write_cache(&self, username: &str, snapshot: &StateSnapshot) {
        let entries = [
            (items_key(username), serde_json::to_string(&snapshot.items)),
            (
                categories_key(username),
                serde_json::to_string(&snapshot.categories),
            ),
            (
                usage_key(username),
                serde_json::to_string(&snapshot.category_usage),
            ),
            (
                history_key(username),
                serde_json::to_string(&snapshot.user_history),
            ),
        ];

        for (key, json) in entries {
            match json {
                Ok(json) => self.storage.set(&key, &json),
                Err(e) => warn!(key = %key, error = %e, "failed to serialize cache entry"),
            }
        }
    }

    /// Read a user's cache back, for showing a list while the server is
    /// unreachable. Pieces missing from the store come back empty; a user
    /// with no cache at all comes back `None`.
    pub fn cached_snapshot(&self, username: &str) -> Option<StateSnapshot> {
        let items = self.storage.get(&items_key(username));
        let categories = self.storage.get(&categories_key(username));
        let usage = self.storage.get(&usage_key(username));
        let history = self.storage.get(&history_key(username));

        if items.is_none() && categories.is_none() && usage.is_none() && history.is_none() {
            return None;
        }

        Some(StateSnapshot {
            items: parse_or_default("items", items.as_deref()),
            categories: parse_or_default("categories", categories.as_deref()),
            category_usage: parse_or_default("categoryUsage", usage.as_deref()),
            user_history: parse_or_default("userHistory", history.as_deref()),
        })
    }

    async fn post_checked<T: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<(), Error> {
        let url = format!("{}{}", self.url, path);
        let response = Fetch::post(&self.client, &url)
            .bearer_auth(token)
            .json(body)?
            .execute_raw()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(Error::Status { status, body });
        }
        Ok(())
    }
}
