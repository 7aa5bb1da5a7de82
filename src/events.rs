//! Client events surfaced to embedders
//!
//! Background work (detached saves, deferred removals, predictions) has no
//! caller to return an error to. Outcomes land on this channel instead so
//! an embedder can observe them without scraping logs.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::list::ItemId;

/// Events emitted while the client works
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A persisted session was picked back up
    SessionRestored { username: String },

    /// Login or signup completed
    LoggedIn { username: String },

    /// The session ended
    LoggedOut,

    /// Server state replaced the local list
    StateLoaded { items: usize, categories: usize },

    /// Loading server state failed; whatever is local stays in place
    LoadFailed { reason: String },

    /// The full aggregate reached the server
    StateSaved,

    /// Saving the aggregate failed
    SaveFailed { reason: String },

    /// A single item landed in the server-side history
    ItemSaved { name: String },

    /// The per-item save failed; the item stays on the local list
    ItemSaveFailed { name: String, reason: String },

    /// A category prediction request failed
    PredictFailed { reason: String },

    /// A checked item's removal delay elapsed and it left the list
    ItemExpired { item_id: ItemId },
}

/// Sending half of the client's event stream.
///
/// The channel does not exist until a receiver is taken, so a client
/// nobody listens to never accumulates events.
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<ClientEvent>>>>,
}

impl EventSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the channel and hand out its receiving half. The stream has
    /// one consumer; later calls return `None`.
    pub fn take(&self) -> Option<mpsc::UnboundedReceiver<ClientEvent>> {
        let mut slot = self.tx.lock().unwrap();
        if slot.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Some(rx)
    }

    /// Emit an event, dropping it when nobody is listening
    pub fn emit(&self, event: ClientEvent) {
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}
