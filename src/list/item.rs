//! Items on the list and their deferred-removal bookkeeping

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::IdGen;

/// Identifier for a list item
pub type ItemId = u64;

/// Token tying a scheduled removal to the check that armed it
pub type RemovalToken = u64;

/// One item on the grocery list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// The item ID
    pub id: ItemId,

    /// The display name
    pub name: String,

    /// Name of the category the item is filed under
    pub category: String,

    /// Whether the item has been checked off
    #[serde(default)]
    pub checked: bool,
}

/// Ordered collection of items plus the removals currently armed.
///
/// A removal token is handed out when a check arms the delay and checked
/// again when the delay elapses. Re-arming supersedes the old token, so a
/// timer that fires after its token was replaced or cleared does nothing.
#[derive(Debug, Default, Clone)]
pub struct ItemStore {
    items: Vec<Item>,
    pending_removals: HashMap<ItemId, RemovalToken>,
    next_token: RemovalToken,
}

impl ItemStore {
    pub(crate) fn from_rows(items: Vec<Item>) -> Self {
        Self {
            items,
            pending_removals: HashMap::new(),
            next_token: 0,
        }
    }

    /// All items in display order
    pub fn all(&self) -> &[Item] {
        &self.items
    }

    /// Look up an item by id
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub(crate) fn add(&mut self, name: &str, category: &str, ids: &mut IdGen) -> Item {
        let item = Item {
            id: ids.next_id(),
            name: name.to_string(),
            category: category.to_string(),
            checked: false,
        };
        self.items.push(item.clone());
        item
    }

    /// Flip an item's checked flag, returning the new value
    pub(crate) fn toggle_checked(&mut self, id: ItemId) -> Option<bool> {
        let item = self.items.iter_mut().find(|i| i.id == id)?;
        item.checked = !item.checked;
        Some(item.checked)
    }

    /// Delete an item, disarming any pending removal. Unknown ids are a
    /// no-op, not an error.
    pub(crate) fn remove(&mut self, id: ItemId) -> bool {
        self.pending_removals.remove(&id);
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Repoint every item under `old_name` to `new_name`
    pub(crate) fn rename_category(&mut self, old_name: &str, new_name: &str) -> usize {
        let mut moved = 0;
        for item in self.items.iter_mut().filter(|i| i.category == old_name) {
            item.category = new_name.to_string();
            moved += 1;
        }
        moved
    }

    /// Arm a deferred removal for `id`, superseding any token already out
    pub(crate) fn arm_removal(&mut self, id: ItemId) -> RemovalToken {
        self.next_token += 1;
        let token = self.next_token;
        self.pending_removals.insert(id, token);
        token
    }

    /// Cancel a deferred removal
    pub(crate) fn disarm_removal(&mut self, id: ItemId) {
        self.pending_removals.remove(&id);
    }

    /// Whether `token` is still the removal armed for `id`
    pub(crate) fn removal_armed(&self, id: ItemId, token: RemovalToken) -> bool {
        self.pending_removals.get(&id) == Some(&token)
    }
}
