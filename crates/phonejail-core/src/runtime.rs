//! Assembled PhoneJail core.
//!
//! Wires storage, the access gate, settings, the schema lifecycle and the
//! negotiator together and guards every mutation that strict mode locks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::access::{AccessController, AccessSnapshot};
use crate::completion::{CompletionService, OpenAiCompletion, RetryPolicy};
use crate::enforcement::EnforcementAdapter;
use crate::error::{CoreError, Result};
use crate::events::GateEvent;
use crate::lifecycle::SchemaLifecycle;
use crate::negotiation::{Codeword, Message, NegotiationOutcome, NegotiationState, Negotiator};
use crate::personality::Personality;
use crate::schema::{ContentSelection, Schema, SchemaDraft, SchemaId, SchemaRegistry, SelectionRepository};
use crate::storage::{Config, Database, Settings, SettingsService};

pub struct PhoneJail {
    gate: AccessController,
    settings: SettingsService,
    lifecycle: SchemaLifecycle,
    negotiator: Negotiator,
}

impl PhoneJail {
    /// Wire all components over `db` and run startup reconciliation.
    pub fn assemble(
        db: Arc<Database>,
        config: &Config,
        enforcement: Arc<dyn EnforcementAdapter>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        config.validate()?;
        let gate = AccessController::new();
        let settings = SettingsService::load(db.clone(), gate.clone())?;
        let registry = SchemaRegistry::load(db)?;
        let lifecycle = SchemaLifecycle::new(
            registry,
            Arc::new(SelectionRepository::new()),
            enforcement,
            gate.clone(),
        );
        let active = lifecycle.reconcile()?;

        let codeword = config
            .negotiation
            .codeword
            .clone()
            .map(Codeword::new)
            .unwrap_or_else(Codeword::generate);
        let negotiator = Negotiator::new(
            completion,
            gate.clone(),
            settings.personality(),
            codeword,
            RetryPolicy::from_config(&config.completion),
        );

        info!(
            active_schemas = active.len(),
            locked = gate.is_locked(),
            "phonejail core assembled"
        );
        Ok(Self {
            gate,
            settings,
            lifecycle,
            negotiator,
        })
    }

    /// Assemble from the default config file, database and keyring.
    pub fn open_default(enforcement: Arc<dyn EnforcementAdapter>) -> Result<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        let completion = Arc::new(OpenAiCompletion::from_config(&config.completion)?);
        Self::assemble(db, &config, enforcement, completion)
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.gate.is_locked() {
            debug!("mutation refused while locked");
            return Err(CoreError::AccessLocked);
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn access(&self) -> AccessSnapshot {
        self.gate.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.gate.subscribe()
    }

    pub fn schemas(&self) -> Vec<Schema> {
        self.lifecycle.schemas()
    }

    pub fn schema(&self, id: &SchemaId) -> Option<Schema> {
        self.lifecycle.get(id)
    }

    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    pub fn negotiation(&self) -> NegotiationState {
        self.negotiator.state()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.negotiator.transcript()
    }

    pub fn gate(&self) -> &AccessController {
        &self.gate
    }

    pub fn lifecycle(&self) -> &SchemaLifecycle {
        &self.lifecycle
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    // ── Guarded schema mutations ─────────────────────────────────────

    pub fn create_schema(
        &self,
        draft: &SchemaDraft,
        platform_selection: Option<ContentSelection>,
    ) -> Result<SchemaId> {
        self.ensure_unlocked()?;
        self.lifecycle.create(draft, platform_selection)
    }

    pub fn create_from_template(
        &self,
        template: &Schema,
        selection: ContentSelection,
    ) -> Result<SchemaId> {
        self.ensure_unlocked()?;
        self.lifecycle.create_from_template(template, selection)
    }

    pub async fn activate_schema(&self, id: SchemaId) -> Result<()> {
        self.ensure_unlocked()?;
        self.lifecycle.activate(id).await
    }

    pub async fn deactivate_schema(&self, id: SchemaId) -> Result<()> {
        self.ensure_unlocked()?;
        self.lifecycle.deactivate(id).await
    }

    pub async fn delete_schema(&self, id: SchemaId) -> Result<Schema> {
        self.ensure_unlocked()?;
        self.lifecycle.delete(id).await
    }

    /// Forward an authorization loss from the enforcement backend.
    /// Not guarded: the backend has already stopped blocking.
    pub async fn handle_authorization_revoked(&self) -> Vec<(SchemaId, CoreError)> {
        self.lifecycle.handle_authorization_revoked().await
    }

    // ── Guarded settings mutations ───────────────────────────────────

    /// Enabling strict mode is always allowed; disabling it is locked.
    pub fn set_strict_mode(&self, enabled: bool) -> Result<()> {
        if !enabled {
            self.ensure_unlocked()?;
        }
        self.settings.set_strict_mode(enabled)
    }

    pub fn toggle_strict_mode(&self) -> Result<bool> {
        let enabled = !self.settings.is_strict_mode_enabled();
        self.set_strict_mode(enabled)?;
        Ok(enabled)
    }

    pub fn set_personality(&self, personality: Personality) -> Result<()> {
        self.ensure_unlocked()?;
        self.settings.set_personality(personality)?;
        self.negotiator.set_personality(personality);
        Ok(())
    }

    pub fn set_default_unblock_duration(&self, duration: Duration) -> Result<()> {
        self.ensure_unlocked()?;
        self.settings.set_default_unblock_duration(duration)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) -> Result<()> {
        self.settings.set_notifications_enabled(enabled)
    }

    /// Restores defaults, which includes turning strict mode off.
    pub fn reset_settings(&self) -> Result<()> {
        self.ensure_unlocked()?;
        self.settings.reset_to_defaults()?;
        self.negotiator
            .set_personality(self.settings.personality());
        Ok(())
    }

    // ── Negotiation ──────────────────────────────────────────────────

    /// Open a negotiation for temporary access.
    pub fn request_access(&self) {
        self.negotiator.enter_access_control_mode();
    }

    pub fn cancel_access_request(&self) {
        self.negotiator.exit_access_control_mode();
    }

    pub async fn submit(&self, statement: &str) -> Result<NegotiationOutcome> {
        self.negotiator.submit_user_statement(statement).await
    }

    /// Stop background timers. Also happens when the value is dropped.
    pub fn shutdown(&self) {
        self.gate.shutdown();
    }
}
