//! Schema lifecycle: keeps registry status consistent with enforcement.
//!
//! The registry lock is only held for synchronous steps. Enforcement calls
//! run with no registry lock held. Transitions on the same schema are
//! serialized by a per-id async lock, so an activate issued while a delete
//! is waiting on the backend runs only after the delete has finished.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::access::AccessController;
use crate::enforcement::{EnforcementAdapter, EnforcementError};
use crate::error::{CoreError, Result};
use crate::schema::{
    ContentSelection, Schema, SchemaDraft, SchemaId, SchemaRegistry, SchemaStatus,
    SelectionRepository,
};

fn enforcement_error(schema_id: SchemaId, error: EnforcementError) -> CoreError {
    match error {
        EnforcementError::NotAuthorized => CoreError::NotAuthorizedForEnforcement { schema_id },
        EnforcementError::Failed(message) => CoreError::EnforcementFailure { schema_id, message },
    }
}

pub struct SchemaLifecycle {
    registry: Mutex<SchemaRegistry>,
    /// One transition lock per schema id.
    transitions: Mutex<HashMap<SchemaId, Arc<AsyncMutex<()>>>>,
    selections: Arc<SelectionRepository>,
    enforcement: Arc<dyn EnforcementAdapter>,
    gate: AccessController,
}

impl SchemaLifecycle {
    pub fn new(
        registry: SchemaRegistry,
        selections: Arc<SelectionRepository>,
        enforcement: Arc<dyn EnforcementAdapter>,
        gate: AccessController,
    ) -> Self {
        gate.set_has_active_schema(registry.has_active());
        Self {
            registry: Mutex::new(registry),
            transitions: Mutex::new(HashMap::new()),
            selections,
            enforcement,
            gate,
        }
    }

    fn registry(&self) -> MutexGuard<'_, SchemaRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for exclusive use of `id` against other transitions.
    async fn exclusive(&self, id: SchemaId) -> OwnedMutexGuard<()> {
        let lock = self
            .transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    fn forget_transitions(&self, id: &SchemaId) {
        self.transitions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    /// Tell the gate whether anything is active. Call with the registry
    /// guard still held so publications follow mutation order.
    fn publish(&self, registry: &SchemaRegistry) {
        self.gate.set_has_active_schema(registry.has_active());
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn schemas(&self) -> Vec<Schema> {
        self.registry().schemas().to_vec()
    }

    pub fn get(&self, id: &SchemaId) -> Option<Schema> {
        self.registry().get(id).cloned()
    }

    pub fn active_schemas(&self) -> Vec<Schema> {
        self.registry().active_schemas().cloned().collect()
    }

    pub fn inactive_schemas(&self) -> Vec<Schema> {
        self.registry().inactive_schemas().cloned().collect()
    }

    pub fn has_active(&self) -> bool {
        self.registry().has_active()
    }

    pub fn selections(&self) -> &Arc<SelectionRepository> {
        &self.selections
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Insert the schema a completed draft describes.
    ///
    /// `platform_selection` is kept in the selection repository and takes
    /// precedence over the draft's content when the schema is activated.
    pub fn create(
        &self,
        draft: &SchemaDraft,
        platform_selection: Option<ContentSelection>,
    ) -> Result<SchemaId> {
        let schema = draft.build()?;
        self.insert(schema, platform_selection)
    }

    /// Adopt a starter template under a fresh id.
    pub fn create_from_template(
        &self,
        template: &Schema,
        selection: ContentSelection,
    ) -> Result<SchemaId> {
        let mut schema = Schema::new(template.name.clone(), template.schema_type);
        schema.blocking_conditions = template.blocking_conditions.clone();
        schema.selected_content = selection.clone();
        self.insert(schema, Some(selection))
    }

    fn insert(&self, schema: Schema, selection: Option<ContentSelection>) -> Result<SchemaId> {
        let name = schema.name.clone();
        let id = {
            let mut registry = self.registry();
            let id = registry.insert(schema)?;
            self.publish(&registry);
            id
        };
        if let Some(selection) = selection.filter(|s| !s.is_empty()) {
            self.selections.set(id, selection);
        }
        info!(%id, %name, "schema created");
        Ok(id)
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub async fn activate(&self, id: SchemaId) -> Result<()> {
        let _exclusive = self.exclusive(id).await;
        let (content, conditions) = {
            let registry = self.registry();
            let schema = registry.get(&id).ok_or(CoreError::SchemaNotFound(id))?;
            if schema.is_active() {
                return Err(CoreError::AlreadyActive(id));
            }
            let content = self
                .selections
                .get(&id)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| schema.selected_content.clone());
            (content, schema.blocking_conditions.clone())
        };

        self.enforcement
            .activate(id, &content, &conditions)
            .await
            .map_err(|e| {
                warn!(%id, error = %e, "enforcement refused activation");
                enforcement_error(id, e)
            })?;

        let committed = {
            let mut registry = self.registry();
            if registry.contains(&id) {
                let result = registry.set_status(&id, SchemaStatus::Active);
                self.publish(&registry);
                Some(result)
            } else {
                None
            }
        };

        match committed {
            Some(Ok(_)) => {
                info!(%id, "schema activated");
                Ok(())
            }
            Some(Err(e)) => {
                warn!(%id, error = %e, "could not record activation; stopping enforcement");
                self.stop_enforcement_quietly(id).await;
                Err(e)
            }
            None => {
                warn!(%id, "schema deleted during activation; stopping enforcement");
                self.stop_enforcement_quietly(id).await;
                Err(CoreError::SchemaNotFound(id))
            }
        }
    }

    async fn stop_enforcement_quietly(&self, id: SchemaId) {
        if let Err(e) = self.enforcement.deactivate(id).await {
            warn!(%id, error = %e, "rollback deactivation failed");
        }
    }

    /// Stop enforcement and mark the schema inactive. Idempotent.
    pub async fn deactivate(&self, id: SchemaId) -> Result<()> {
        let _exclusive = self.exclusive(id).await;
        self.deactivate_exclusive(id).await
    }

    /// Caller holds the transition lock for `id`.
    async fn deactivate_exclusive(&self, id: SchemaId) -> Result<()> {
        if !self.registry().contains(&id) {
            return Err(CoreError::SchemaNotFound(id));
        }

        self.enforcement
            .deactivate(id)
            .await
            .map_err(|e| enforcement_error(id, e))?;

        let mut registry = self.registry();
        if registry.contains(&id) {
            let changed = registry.set_status(&id, SchemaStatus::Inactive)?;
            self.publish(&registry);
            if changed {
                info!(%id, "schema deactivated");
            }
        }
        Ok(())
    }

    /// Deactivate, then remove. A failed deactivation aborts the delete.
    pub async fn delete(&self, id: SchemaId) -> Result<Schema> {
        let _exclusive = self.exclusive(id).await;
        self.deactivate_exclusive(id).await?;
        let removed = {
            let mut registry = self.registry();
            let removed = registry.remove(&id)?;
            self.publish(&registry);
            removed
        };
        self.selections.remove(&id);
        // Waiters still hold the old lock and will find the schema gone.
        self.forget_transitions(&id);
        info!(%id, name = %removed.name, "schema deleted");
        Ok(removed)
    }

    /// Startup reconciliation: reload persisted state and republish it to
    /// the gate. Enforcement is assumed to have survived the restart, so
    /// the adapter is not called. Returns the ids persisted as active.
    pub fn reconcile(&self) -> Result<Vec<SchemaId>> {
        let mut registry = self.registry();
        registry.reload()?;
        self.publish(&registry);
        let active: Vec<SchemaId> = registry.active_schemas().map(|s| s.id).collect();
        info!(active = active.len(), total = registry.len(), "schemas reconciled");
        Ok(active)
    }

    /// The enforcement backend lost its authorization: deactivate every
    /// active schema. Failures are collected; the sweep always finishes.
    pub async fn handle_authorization_revoked(&self) -> Vec<(SchemaId, CoreError)> {
        let active: Vec<SchemaId> = self.registry().active_schemas().map(|s| s.id).collect();
        warn!(count = active.len(), "enforcement authorization revoked");

        let mut failures = Vec::new();
        for id in active {
            if let Err(e) = self.deactivate(id).await {
                warn!(%id, error = %e, "deactivation after revocation failed");
                failures.push((id, e));
            }
        }
        failures
    }
}
