//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use phonejail_core::{
    BlockingCondition, CompletionError, CompletionService, Config, ContentSelection, Database,
    EnforcementAdapter, EnforcementError, PhoneJail, SchemaId,
};

// ============================================================================
// Enforcement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementCall {
    Activate(SchemaId),
    Deactivate(SchemaId),
}

#[derive(Default)]
pub struct RecordingEnforcement {
    calls: Mutex<Vec<EnforcementCall>>,
}

impl RecordingEnforcement {
    pub fn calls(&self) -> Vec<EnforcementCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnforcementAdapter for RecordingEnforcement {
    async fn activate(
        &self,
        schema_id: SchemaId,
        _content: &ContentSelection,
        _conditions: &[BlockingCondition],
    ) -> Result<(), EnforcementError> {
        self.calls
            .lock()
            .unwrap()
            .push(EnforcementCall::Activate(schema_id));
        Ok(())
    }

    async fn deactivate(&self, schema_id: SchemaId) -> Result<(), EnforcementError> {
        self.calls
            .lock()
            .unwrap()
            .push(EnforcementCall::Deactivate(schema_id));
        Ok(())
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Replays queued replies, then repeats the fallback.
pub struct ScriptedCompletion {
    queue: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(fallback: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Result<String, CompletionError>) {
        self.queue.lock().unwrap().push_back(reply);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

// ============================================================================
// Assembly
// ============================================================================

pub const CODEWORD: &str = "OPEN-THE-GATE";

pub struct Harness {
    pub jail: PhoneJail,
    pub db: Arc<Database>,
    pub enforcement: Arc<RecordingEnforcement>,
    pub completion: Arc<ScriptedCompletion>,
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.negotiation.codeword = Some(CODEWORD.to_string());
    config.completion.retry_backoff_ms = 1;
    config
}

pub fn harness(fallback_reply: &str) -> Harness {
    harness_over(Arc::new(Database::open_memory().unwrap()), fallback_reply)
}

pub fn harness_over(db: Arc<Database>, fallback_reply: &str) -> Harness {
    let enforcement = Arc::new(RecordingEnforcement::default());
    let completion = Arc::new(ScriptedCompletion::new(fallback_reply));
    let jail = PhoneJail::assemble(
        db.clone(),
        &config(),
        enforcement.clone(),
        completion.clone(),
    )
    .unwrap();
    Harness {
        jail,
        db,
        enforcement,
        completion,
    }
}
