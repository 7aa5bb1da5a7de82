//! The grocery list aggregate: items, categories, and the usage ledger
//!
//! The three stores reference categories by name, so every rename fans out
//! in a fixed order: the category row first, then items, then the ledger.
//! `ListState` is the only writer and keeps that ordering; the stores stay
//! consistent as long as all mutation goes through it.

mod category;
mod item;
mod ledger;
pub mod defaults;

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Error;

pub use category::*;
pub use item::*;
pub use ledger::*;

/// Row id allocator. Starts at the current wall-clock milliseconds and
/// only counts up; `reserve_through` keeps it ahead of ids loaded from
/// stored lists.
#[derive(Debug, Clone)]
pub(crate) struct IdGen {
    next: u64,
}

impl IdGen {
    fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis() as u64;
        Self { next: millis }
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    fn reserve_through(&mut self, floor: u64) {
        if self.next <= floor {
            self.next = floor + 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

/// How the category for a new item is chosen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategorySelection {
    /// Use the classifier's current prediction
    #[default]
    Automatic,

    /// Use a caller-supplied category name
    Manual(String),
}

/// The full local list: categories, items, and the ledger, with one id
/// source shared by all of them
#[derive(Debug, Clone)]
pub struct ListState {
    categories: CategoryStore,
    items: ItemStore,
    ledger: Ledger,
    ids: IdGen,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            categories: CategoryStore::from_rows(defaults::initial_categories()),
            items: ItemStore::default(),
            ledger: Ledger::default(),
            ids: IdGen::new(),
        }
    }
}

impl ListState {
    /// Rebuild state from stored rows, keeping the id allocator ahead of
    /// everything loaded
    pub(crate) fn from_parts(
        categories: Vec<Category>,
        items: Vec<Item>,
        usage: HashMap<String, u64>,
        history: Vec<HistoryEntry>,
    ) -> Self {
        let mut ids = IdGen::new();
        for category in &categories {
            ids.reserve_through(category.id);
        }
        for item in &items {
            ids.reserve_through(item.id);
        }

        Self {
            categories: CategoryStore::from_rows(categories),
            items: ItemStore::from_rows(items),
            ledger: Ledger::from_parts(usage, history),
            ids,
        }
    }

    /// The categories
    pub fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    /// The items
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// The usage ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Resolve a user-chosen category name case-insensitively, creating
    /// it when nothing matches
    pub fn add_custom_category(&mut self, name: &str) -> Result<CategoryId, Error> {
        self.categories.select_or_create(name, &mut self.ids)
    }

    /// Add an item under `category_name`, materializing the category when
    /// it is new and recording the add in the ledger
    pub fn add_item(&mut self, name: &str, category_name: &str) -> Result<Item, Error> {
        if name.trim().is_empty() {
            return Err(Error::validation("item name cannot be empty"));
        }
        if category_name.trim().is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }

        self.categories.ensure(category_name, &mut self.ids);
        let item = self.items.add(name, category_name, &mut self.ids);
        self.ledger.record_add(&item.name, &item.category);
        Ok(item)
    }

    /// Rename a category and cascade the new name through items and the
    /// ledger, in that order
    pub fn rename_category(
        &mut self,
        id: CategoryId,
        new_name: &str,
    ) -> Result<RenameOutcome, Error> {
        let outcome = self.categories.rename(id, new_name)?;
        if outcome.old_name() != outcome.new_name() {
            self.items
                .rename_category(outcome.old_name(), outcome.new_name());
            self.ledger
                .migrate_category(outcome.old_name(), outcome.new_name());
        }
        Ok(outcome)
    }

    /// Flip an item's checked flag, returning the new value
    pub fn toggle_checked(&mut self, id: ItemId) -> Option<bool> {
        self.items.toggle_checked(id)
    }

    /// Delete an item; unknown ids are a no-op
    pub fn remove_item(&mut self, id: ItemId) -> bool {
        self.items.remove(id)
    }

    /// Begin renaming a category
    pub fn start_category_edit(&mut self, id: CategoryId) {
        self.categories.start_edit(id);
    }

    /// Update the draft of the rename in flight
    pub fn set_category_edit_draft(&mut self, draft: &str) {
        self.categories.set_edit_draft(draft);
    }

    /// Abandon the rename in flight
    pub fn cancel_category_edit(&mut self) {
        self.categories.cancel_edit();
    }

    /// Commit the category edit in flight. A rejected draft leaves the
    /// edit open with its text intact.
    pub fn save_category_edit(&mut self) -> Result<RenameOutcome, Error> {
        let edit = match self.categories.take_edit() {
            Some(edit) => edit,
            None => return Err(Error::validation("no category edit in progress")),
        };

        match self.rename_category(edit.category_id, &edit.draft) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.categories.restore_edit(edit);
                Err(e)
            }
        }
    }

    pub(crate) fn arm_removal(&mut self, id: ItemId) -> RemovalToken {
        self.items.arm_removal(id)
    }

    pub(crate) fn disarm_removal(&mut self, id: ItemId) {
        self.items.disarm_removal(id)
    }

    pub(crate) fn removal_armed(&self, id: ItemId, token: RemovalToken) -> bool {
        self.items.removal_armed(id, token)
    }

    /// Verify the cross-store invariants hold: unique category ids and
    /// names, no item pointing at a missing category, and a usage total
    /// equal to the history length
    pub fn check_invariants(&self) -> Result<(), Error> {
        let categories = self.categories.all();
        for (i, a) in categories.iter().enumerate() {
            for b in &categories[i + 1..] {
                if a.id == b.id {
                    return Err(Error::general(format!("duplicate category id {}", a.id)));
                }
                if a.name == b.name {
                    return Err(Error::general(format!(
                        "duplicate category name {:?}",
                        a.name
                    )));
                }
            }
        }

        for item in self.items.all() {
            if self.categories.find_by_name(&item.category).is_none() {
                return Err(Error::general(format!(
                    "item {:?} references missing category {:?}",
                    item.name, item.category
                )));
            }
        }

        let total = self.ledger.total_usage();
        let history_len = self.ledger.history().len() as u64;
        if total != history_len {
            return Err(Error::general(format!(
                "usage total {} does not match history length {}",
                total, history_len
            )));
        }

        Ok(())
    }
}
