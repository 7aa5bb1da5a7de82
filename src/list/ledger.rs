//! Usage counts and the add-history log

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One add-item event as remembered for the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The item name as entered
    #[serde(rename = "item")]
    pub item_name: String,

    /// The category it was filed under, kept current across renames
    pub category: String,
}

/// Per-category usage counters plus the ordered add log.
///
/// The two views cover the same events, so the counter total always equals
/// the log length. Counts never decrease; removing an item does not unwind
/// its add.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    usage: HashMap<String, u64>,
    history: Vec<HistoryEntry>,
}

impl Ledger {
    pub(crate) fn from_parts(usage: HashMap<String, u64>, history: Vec<HistoryEntry>) -> Self {
        Self { usage, history }
    }

    /// Count one add under `category_name`
    pub(crate) fn record_add(&mut self, item_name: &str, category_name: &str) {
        *self.usage.entry(category_name.to_string()).or_insert(0) += 1;
        self.history.push(HistoryEntry {
            item_name: item_name.to_string(),
            category: category_name.to_string(),
        });
    }

    /// Move everything recorded under `old_name` to `new_name`: the usage
    /// count folds into any count already there, and history entries are
    /// rewritten in place.
    pub(crate) fn migrate_category(&mut self, old_name: &str, new_name: &str) {
        if let Some(count) = self.usage.remove(old_name) {
            *self.usage.entry(new_name.to_string()).or_insert(0) += count;
        }
        for entry in self.history.iter_mut().filter(|e| e.category == old_name) {
            entry.category = new_name.to_string();
        }
    }

    /// Usage counts by category name
    pub fn usage(&self) -> &HashMap<String, u64> {
        &self.usage
    }

    /// Usage count for one category, zero when never used
    pub fn usage_of(&self, category_name: &str) -> u64 {
        self.usage.get(category_name).copied().unwrap_or(0)
    }

    /// The add log, oldest first
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Sum of all usage counts
    pub fn total_usage(&self) -> u64 {
        self.usage.values().sum()
    }
}
