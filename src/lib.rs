//! Grocery List Client Library
//!
//! A Rust client for the Grocery List backend, providing the local list
//! state (items, categories, usage ledger), server-predicted
//! categorization, and session-scoped synchronization with a per-user
//! offline cache.
//!
//! The client is asynchronous and expects to run inside a Tokio runtime:
//! checked-off items are removed on a timer and per-item saves run as
//! detached tasks.

pub mod auth;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod list;
pub mod storage;
pub mod sync;

use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::auth::{AuthClient, SessionContext};
use crate::classify::Classifier;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::events::{ClientEvent, EventSender};
use crate::list::{
    CategoryId, CategorySelection, Item, ItemId, ListState, RemovalToken, RenameOutcome,
};
use crate::storage::{KvStore, MemoryKvStore};
use crate::sync::{StateSnapshot, SyncController};

/// The main entry point for the Grocery List client
pub struct GroceryClient {
    /// The base URL for the backend
    pub url: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    session: SessionContext,
    state: Arc<Mutex<ListState>>,
    classifier: Classifier,
    sync: SyncController,
    event_sender: EventSender,
}

impl GroceryClient {
    /// Create a new client with in-memory persistence
    ///
    /// # Example
    ///
    /// ```
    /// use grocery_list_client::GroceryClient;
    ///
    /// let client = GroceryClient::new("http://127.0.0.1:5000");
    /// ```
    pub fn new(backend_url: &str) -> Self {
        Self::with_options(backend_url, ClientOptions::default())
    }

    /// Create a new client with custom options
    ///
    /// # Example
    ///
    /// ```
    /// use grocery_list_client::{GroceryClient, config::ClientOptions};
    /// use std::time::Duration;
    ///
    /// let options = ClientOptions::default().with_removal_delay(Duration::from_millis(500));
    /// let client = GroceryClient::with_options("http://127.0.0.1:5000", options);
    /// ```
    pub fn with_options(backend_url: &str, options: ClientOptions) -> Self {
        Self::with_storage(backend_url, options, Arc::new(MemoryKvStore::new()))
    }

    /// Create a new client persisting sessions and cached lists to
    /// `storage`
    pub fn with_storage(
        backend_url: &str,
        options: ClientOptions,
        storage: Arc<dyn KvStore>,
    ) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().expect("failed to build HTTP client");

        let session = SessionContext::new(Arc::clone(&storage));
        let state = Arc::new(Mutex::new(ListState::default()));
        let event_sender = EventSender::new();

        let auth = AuthClient::new(backend_url, http_client.clone());
        let classifier = Classifier::new(
            backend_url,
            http_client.clone(),
            session.clone(),
            event_sender.clone(),
            options.clone(),
        );
        let sync = SyncController::new(
            backend_url,
            http_client.clone(),
            auth,
            session.clone(),
            storage,
            Arc::clone(&state),
            event_sender.clone(),
            options.clone(),
        );

        Self {
            url: backend_url.to_string(),
            http_client,
            options,
            session,
            state,
            classifier,
            sync,
            event_sender,
        }
    }

    /// Take the event stream. It is handed out once; later calls return
    /// `None`. Events emitted before this call are dropped.
    pub fn take_events(&self) -> Option<UnboundedReceiver<ClientEvent>> {
        self.event_sender.take()
    }

    /// Whether a session is currently established
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Username of the current session
    pub fn username(&self) -> Option<String> {
        self.session.username()
    }

    /// Pick a persisted session back up and pull the server's list.
    /// Returns the restored username, or `None` when no session was
    /// stored.
    pub async fn restore_session(&self) -> Option<String> {
        self.sync.restore_session().await
    }

    /// Log in and pull the server's copy of the list
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        self.sync.login(username, password).await
    }

    /// Create an account and pull the server's copy of the list
    pub async fn signup(&self, username: &str, password: &str) -> Result<(), Error> {
        self.sync.signup(username, password).await
    }

    /// Save the list, then end the session and reset local state
    pub async fn logout(&self) {
        self.sync.logout().await
    }

    /// Push the whole aggregate to the server
    pub async fn save_state(&self) -> Result<(), Error> {
        self.sync.save_state().await
    }

    /// Pull the whole aggregate from the server, replacing local state
    pub async fn load_user_data(&self) {
        self.sync.load_user_data().await
    }

    /// Feed the item name as typed so far to the classifier
    pub async fn suggest_category(&self, item_name: &str) {
        self.classifier.suggest(item_name).await
    }

    /// The classifier's current suggestion, if any
    pub fn prediction(&self) -> Option<String> {
        self.classifier.prediction()
    }

    /// Whether a prediction request is in flight
    pub fn is_prediction_loading(&self) -> bool {
        self.classifier.is_loading()
    }

    /// Add an item to the list. `Automatic` files it under the
    /// classifier's current suggestion; `Manual` uses the given category
    /// name, creating the category when it is new. The add lands locally
    /// first; the server is told about it in the background.
    pub fn add_item(&self, name: &str, selection: CategorySelection) -> Result<Item, Error> {
        let category = match selection {
            CategorySelection::Automatic => self
                .classifier
                .prediction()
                .ok_or_else(|| Error::validation("no category prediction available"))?,
            CategorySelection::Manual(category) => category,
        };

        let item = {
            let mut state = self.state.lock().unwrap();
            state.add_item(name, &category)?
        };

        self.classifier.clear();
        self.sync.mirror_to_cache();
        self.sync
            .save_item_detached(item.name.clone(), item.category.clone());
        Ok(item)
    }

    /// Flip an item's checked flag, returning the new value. Checking
    /// arms a deferred removal; unchecking before the delay elapses
    /// cancels it, and checking again re-arms a full delay.
    pub fn toggle_checked(&self, id: ItemId) -> Option<bool> {
        let (checked, token) = {
            let mut state = self.state.lock().unwrap();
            let checked = state.toggle_checked(id)?;
            let token = if checked {
                Some(state.arm_removal(id))
            } else {
                state.disarm_removal(id);
                None
            };
            (checked, token)
        };

        if let Some(token) = token {
            self.schedule_removal(id, token);
        }
        self.sync.mirror_to_cache();
        Some(checked)
    }

    /// Delete an item immediately; unknown ids are a no-op
    pub fn remove_item(&self, id: ItemId) -> bool {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state.remove_item(id)
        };
        if removed {
            self.sync.mirror_to_cache();
        }
        removed
    }

    /// Create a category from user input, reusing an existing one on a
    /// case-insensitive match
    pub fn add_custom_category(&self, name: &str) -> Result<CategoryId, Error> {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.add_custom_category(name)?
        };
        self.sync.mirror_to_cache();
        Ok(id)
    }

    /// Rename a category, cascading the new name through items and the
    /// usage ledger
    pub fn rename_category(&self, id: CategoryId, new_name: &str) -> Result<RenameOutcome, Error> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.rename_category(id, new_name)?
        };
        self.sync.mirror_to_cache();
        Ok(outcome)
    }

    /// Begin renaming a category
    pub fn start_category_edit(&self, id: CategoryId) {
        let mut state = self.state.lock().unwrap();
        state.start_category_edit(id);
    }

    /// Update the draft of the rename in flight
    pub fn set_category_edit_draft(&self, draft: &str) {
        let mut state = self.state.lock().unwrap();
        state.set_category_edit_draft(draft);
    }

    /// Abandon the rename in flight
    pub fn cancel_category_edit(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancel_category_edit();
    }

    /// Commit the category edit in flight. A rejected draft leaves the
    /// edit open with its text intact.
    pub fn save_category_edit(&self) -> Result<RenameOutcome, Error> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.save_category_edit()?
        };
        self.sync.mirror_to_cache();
        Ok(outcome)
    }

    /// Run `f` with read access to the list
    pub fn with_state<R>(&self, f: impl FnOnce(&ListState) -> R) -> R {
        let state = self.state.lock().unwrap();
        f(&state)
    }

    /// Photograph the current aggregate
    pub fn snapshot(&self) -> StateSnapshot {
        let state = self.state.lock().unwrap();
        StateSnapshot::capture(&state)
    }

    /// Read a user's offline cache, if one has been written
    pub fn cached_snapshot(&self, username: &str) -> Option<StateSnapshot> {
        self.sync.cached_snapshot(username)
    }

    fn schedule_removal(&self, id: ItemId, token: RemovalToken) {
        let state = Arc::clone(&self.state);
        let sync = self.sync.clone();
        let events = self.event_sender.clone();
        let delay = self.options.removal_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let expired = {
                let mut state = state.lock().unwrap();
                state.removal_armed(id, token) && state.remove_item(id)
            };

            if expired {
                events.emit(ClientEvent::ItemExpired { item_id: id });
                sync.mirror_to_cache();
            }
        });
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::GroceryClient;
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::events::ClientEvent;
    pub use crate::list::{CategorySelection, ListState};
}
