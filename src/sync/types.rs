//! Wire types for the state endpoints

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::list::{Category, HistoryEntry, Item, ListState};

/// The full aggregate as the backend stores it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// The items
    #[serde(default)]
    pub items: Vec<Item>,

    /// The categories
    #[serde(default)]
    pub categories: Vec<Category>,

    /// Usage counts by category name
    #[serde(default, rename = "categoryUsage")]
    pub category_usage: HashMap<String, u64>,

    /// The add log
    #[serde(default, rename = "userHistory")]
    pub user_history: Vec<HistoryEntry>,
}

impl StateSnapshot {
    /// Photograph the aggregate for saving or mirroring
    pub fn capture(state: &ListState) -> Self {
        Self {
            items: state.items().all().to_vec(),
            categories: state.categories().all().to_vec(),
            category_usage: state.ledger().usage().clone(),
            user_history: state.ledger().history().to_vec(),
        }
    }

    /// Rebuild the aggregate this snapshot describes
    pub(crate) fn into_state(self) -> ListState {
        ListState::from_parts(
            self.categories,
            self.items,
            self.category_usage,
            self.user_history,
        )
    }
}

/// Body of the per-item durability hint
#[derive(Debug, Serialize)]
pub(crate) struct SaveItemRequest {
    #[serde(rename = "itemName")]
    pub item_name: String,

    pub category: String,
}
