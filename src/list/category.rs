//! Category records and the rename machinery around them

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::IdGen;

/// Identifier for a category
pub type CategoryId = u64;

/// One shopping category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// The category ID
    pub id: CategoryId,

    /// The display name
    pub name: String,
}

/// What a rename did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The category kept its id and took the new name
    Renamed {
        id: CategoryId,
        old_name: String,
        new_name: String,
    },

    /// The new name already belonged to another category; the renamed
    /// one was absorbed into it and its id retired
    Merged {
        into: CategoryId,
        old_name: String,
        new_name: String,
    },
}

impl RenameOutcome {
    /// Name the category had before the rename
    pub fn old_name(&self) -> &str {
        match self {
            RenameOutcome::Renamed { old_name, .. } => old_name,
            RenameOutcome::Merged { old_name, .. } => old_name,
        }
    }

    /// Name the category's items carry after the rename
    pub fn new_name(&self) -> &str {
        match self {
            RenameOutcome::Renamed { new_name, .. } => new_name,
            RenameOutcome::Merged { new_name, .. } => new_name,
        }
    }
}

/// In-progress rename of a single category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    /// The category being renamed
    pub category_id: CategoryId,

    /// The name as typed so far
    pub draft: String,
}

/// Ordered collection of categories plus the one edit in flight
#[derive(Debug, Default, Clone)]
pub struct CategoryStore {
    categories: Vec<Category>,
    edit: Option<EditSession>,
}

impl CategoryStore {
    pub(crate) fn from_rows(categories: Vec<Category>) -> Self {
        Self {
            categories,
            edit: None,
        }
    }

    /// All categories in display order
    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    /// Look up a category by id
    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Look up a category by exact name
    pub fn find_by_name(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Resolve `name` to an id, appending a new category when no exact
    /// match exists
    pub(crate) fn ensure(&mut self, name: &str, ids: &mut IdGen) -> CategoryId {
        if let Some(existing) = self.find_by_name(name) {
            return existing.id;
        }

        let id = ids.next_id();
        self.categories.push(Category {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Resolve a user-chosen name case-insensitively, creating the
    /// category when nothing matches
    pub(crate) fn select_or_create(
        &mut self,
        name: &str,
        ids: &mut IdGen,
    ) -> Result<CategoryId, Error> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }

        let lowered = trimmed.to_lowercase();
        if let Some(existing) = self
            .categories
            .iter()
            .find(|c| c.name.to_lowercase() == lowered)
        {
            return Ok(existing.id);
        }

        let id = ids.next_id();
        self.categories.push(Category {
            id,
            name: trimmed.to_string(),
        });
        Ok(id)
    }

    /// Rename `id`. When the new name already belongs to a different
    /// category the renamed one is merged into it; the caller decides how
    /// to propagate either outcome to items and the ledger.
    pub(crate) fn rename(
        &mut self,
        id: CategoryId,
        new_name: &str,
    ) -> Result<RenameOutcome, Error> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("category name cannot be empty"));
        }

        let old_name = match self.get(id) {
            Some(category) => category.name.clone(),
            None => return Err(Error::validation(format!("unknown category id {}", id))),
        };

        let collision = self
            .categories
            .iter()
            .find(|c| c.id != id && c.name == trimmed)
            .map(|c| c.id);

        match collision {
            Some(into) => {
                self.categories.retain(|c| c.id != id);
                Ok(RenameOutcome::Merged {
                    into,
                    old_name,
                    new_name: trimmed.to_string(),
                })
            }
            None => {
                if let Some(category) = self.categories.iter_mut().find(|c| c.id == id) {
                    category.name = trimmed.to_string();
                }
                Ok(RenameOutcome::Renamed {
                    id,
                    old_name,
                    new_name: trimmed.to_string(),
                })
            }
        }
    }

    /// Begin editing `id`, seeding the draft with its current name.
    /// Starting a new edit replaces any edit already in flight; unknown
    /// ids are ignored.
    pub(crate) fn start_edit(&mut self, id: CategoryId) {
        if let Some(category) = self.get(id) {
            self.edit = Some(EditSession {
                category_id: id,
                draft: category.name.clone(),
            });
        }
    }

    /// Replace the draft text of the edit in flight
    pub(crate) fn set_edit_draft(&mut self, draft: &str) {
        if let Some(edit) = self.edit.as_mut() {
            edit.draft = draft.to_string();
        }
    }

    /// Abandon the edit in flight
    pub(crate) fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// The edit in flight, if any
    pub fn editing(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    pub(crate) fn take_edit(&mut self) -> Option<EditSession> {
        self.edit.take()
    }

    pub(crate) fn restore_edit(&mut self, edit: EditSession) {
        self.edit = Some(edit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(names: &[&str]) -> (CategoryStore, IdGen) {
        let mut store = CategoryStore::default();
        let mut ids = IdGen::starting_at(100);
        for name in names {
            store.ensure(name, &mut ids);
        }
        (store, ids)
    }

    #[test]
    fn ensure_reuses_exact_match() {
        let (mut store, mut ids) = seeded(&["Dairy"]);
        let first = store.find_by_name("Dairy").map(|c| c.id);

        let again = store.ensure("Dairy", &mut ids);
        assert_eq!(Some(again), first);
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn ensure_is_case_sensitive() {
        let (mut store, mut ids) = seeded(&["Dairy"]);
        let other = store.ensure("dairy", &mut ids);

        assert_eq!(store.all().len(), 2);
        assert_ne!(store.find_by_name("Dairy").map(|c| c.id), Some(other));
    }

    #[test]
    fn select_or_create_matches_case_insensitively() {
        let (mut store, mut ids) = seeded(&["Dairy"]);
        let id = store.select_or_create("  dairy ", &mut ids).expect("valid name");

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.get(id).map(|c| c.name.as_str()), Some("Dairy"));
    }

    #[test]
    fn select_or_create_rejects_blank_names() {
        let (mut store, mut ids) = seeded(&[]);
        assert!(matches!(
            store.select_or_create("   ", &mut ids),
            Err(Error::Validation(_))
        ));
        assert!(store.all().is_empty());
    }

    #[test]
    fn rename_without_collision_keeps_id() {
        let (mut store, _ids) = seeded(&["Dairy"]);
        let id = store.find_by_name("Dairy").map(|c| c.id).unwrap();

        let outcome = store.rename(id, " Dairy and Eggs ").expect("rename");
        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                id,
                old_name: "Dairy".to_string(),
                new_name: "Dairy and Eggs".to_string(),
            }
        );
        assert_eq!(store.get(id).map(|c| c.name.as_str()), Some("Dairy and Eggs"));
    }

    #[test]
    fn rename_onto_existing_name_merges() {
        let (mut store, _ids) = seeded(&["Dairy", "Dairy & Eggs"]);
        let renamed = store.find_by_name("Dairy").map(|c| c.id).unwrap();
        let survivor = store.find_by_name("Dairy & Eggs").map(|c| c.id).unwrap();

        let outcome = store.rename(renamed, "Dairy & Eggs").expect("rename");
        assert_eq!(
            outcome,
            RenameOutcome::Merged {
                into: survivor,
                old_name: "Dairy".to_string(),
                new_name: "Dairy & Eggs".to_string(),
            }
        );
        assert_eq!(store.all().len(), 1);
        assert!(store.get(renamed).is_none());
    }

    #[test]
    fn rename_rejects_blank_and_unknown() {
        let (mut store, _ids) = seeded(&["Dairy"]);
        let id = store.find_by_name("Dairy").map(|c| c.id).unwrap();

        assert!(matches!(store.rename(id, "  "), Err(Error::Validation(_))));
        assert!(matches!(store.rename(9999, "Meat"), Err(Error::Validation(_))));
        assert_eq!(store.get(id).map(|c| c.name.as_str()), Some("Dairy"));
    }

    #[test]
    fn edit_session_tracks_one_category() {
        let (mut store, _ids) = seeded(&["Dairy", "Bakery"]);
        let dairy = store.find_by_name("Dairy").map(|c| c.id).unwrap();
        let bakery = store.find_by_name("Bakery").map(|c| c.id).unwrap();

        store.start_edit(dairy);
        store.set_edit_draft("Dairy & Eggs");
        assert_eq!(store.editing().map(|e| e.draft.as_str()), Some("Dairy & Eggs"));

        store.start_edit(bakery);
        assert_eq!(store.editing().map(|e| e.category_id), Some(bakery));
        assert_eq!(store.editing().map(|e| e.draft.as_str()), Some("Bakery"));

        store.cancel_edit();
        assert!(store.editing().is_none());
    }
}
