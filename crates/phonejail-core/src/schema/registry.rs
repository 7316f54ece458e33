//! In-memory schema registry backed by a persistent store.
//!
//! Every mutation is applied to a copy, persisted, and only then committed,
//! so the registry never holds state the store failed to record.

use std::sync::Arc;

use tracing::debug;

use super::{Schema, SchemaId, SchemaStatus};
use crate::error::{CoreError, Result, ValidationError};

/// Persistence contract for the ordered schema collection.
pub trait SchemaStore: Send + Sync {
    fn load_schemas(&self) -> Result<Vec<Schema>>;
    fn save_schemas(&self, schemas: &[Schema]) -> Result<()>;
}

pub struct SchemaRegistry {
    schemas: Vec<Schema>,
    store: Arc<dyn SchemaStore>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

impl SchemaRegistry {
    /// Load the persisted schemas.
    pub fn load(store: Arc<dyn SchemaStore>) -> Result<Self> {
        let schemas = store.load_schemas()?;
        debug!(count = schemas.len(), "loaded schemas");
        Ok(Self { schemas, store })
    }

    /// Replace the in-memory view with what the store holds.
    pub fn reload(&mut self) -> Result<()> {
        self.schemas = self.store.load_schemas()?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    pub fn get(&self, id: &SchemaId) -> Option<&Schema> {
        self.schemas.iter().find(|s| &s.id == id)
    }

    pub fn contains(&self, id: &SchemaId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn active_schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.iter().filter(|s| s.is_active())
    }

    pub fn inactive_schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas
            .iter()
            .filter(|s| s.status == SchemaStatus::Inactive)
    }

    pub fn active_count(&self) -> usize {
        self.active_schemas().count()
    }

    pub fn has_active(&self) -> bool {
        self.active_schemas().next().is_some()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Append a schema. Ids must be unique.
    pub fn insert(&mut self, schema: Schema) -> Result<SchemaId> {
        if self.contains(&schema.id) {
            return Err(ValidationError::InvalidValue {
                field: "id".into(),
                message: format!("schema {} already exists", schema.id),
            }
            .into());
        }
        let id = schema.id;
        let mut next = self.schemas.clone();
        next.push(schema);
        self.commit(next)?;
        Ok(id)
    }

    /// Set a schema's status. Returns whether anything changed.
    pub fn set_status(&mut self, id: &SchemaId, status: SchemaStatus) -> Result<bool> {
        let index = self.index_of(id)?;
        if self.schemas[index].status == status {
            return Ok(false);
        }
        let mut next = self.schemas.clone();
        next[index].status = status;
        next[index].touch();
        self.commit(next)?;
        Ok(true)
    }

    pub fn remove(&mut self, id: &SchemaId) -> Result<Schema> {
        let index = self.index_of(id)?;
        let mut next = self.schemas.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(removed)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn index_of(&self, id: &SchemaId) -> Result<usize> {
        self.schemas
            .iter()
            .position(|s| &s.id == id)
            .ok_or(CoreError::SchemaNotFound(*id))
    }

    fn commit(&mut self, next: Vec<Schema>) -> Result<()> {
        self.store.save_schemas(&next)?;
        self.schemas = next;
        Ok(())
    }
}
