//! Platform content selections kept outside the schema record.
//!
//! Some enforcement backends hand out selection tokens that cannot be
//! serialized with the schema. They are held here, keyed by schema id,
//! and shared by reference with whoever needs them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{ContentSelection, SchemaId};

#[derive(Debug, Default)]
pub struct SelectionRepository {
    selections: Mutex<HashMap<SchemaId, ContentSelection>>,
}

impl SelectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SchemaId, ContentSelection>> {
        self.selections.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, schema_id: SchemaId, selection: ContentSelection) {
        self.lock().insert(schema_id, selection);
    }

    pub fn get(&self, schema_id: &SchemaId) -> Option<ContentSelection> {
        self.lock().get(schema_id).cloned()
    }

    pub fn remove(&self, schema_id: &SchemaId) -> Option<ContentSelection> {
        self.lock().remove(schema_id)
    }

    /// True when a non-empty selection is stored for the schema.
    pub fn has_selection(&self, schema_id: &SchemaId) -> bool {
        self.lock()
            .get(schema_id)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    pub fn app_count(&self, schema_id: &SchemaId) -> usize {
        self.lock().get(schema_id).map(|s| s.apps.len()).unwrap_or(0)
    }

    pub fn website_count(&self, schema_id: &SchemaId) -> usize {
        self.lock().get(schema_id).map(|s| s.websites.len()).unwrap_or(0)
    }

    pub fn category_count(&self, schema_id: &SchemaId) -> usize {
        self.lock().get(schema_id).map(|s| s.categories.len()).unwrap_or(0)
    }
}
