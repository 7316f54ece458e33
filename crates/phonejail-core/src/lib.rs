//! # PhoneJail Core Library
//!
//! This library provides the core logic for PhoneJail, a personal
//! accountability tool. Users bundle blocked apps, sites and categories into
//! schemas. With strict mode on and any schema active, every schema and
//! settings change is locked until the user talks the Jailkeeper into a
//! time-boxed unlock.
//!
//! ## Architecture
//!
//! - **Schemas**: data model, creation flow, starter templates and the
//!   persisted registry
//! - **Lifecycle**: activation and deactivation against an external
//!   enforcement backend
//! - **Access gate**: a pure lock computation plus a one-second countdown
//!   for temporary access
//! - **Negotiation**: a conversation whose completions are turned into
//!   grant decisions
//! - **Storage**: SQLite schema and settings storage, TOML configuration
//!
//! ## Key Components
//!
//! - [`PhoneJail`]: Assembled core with mutation guards
//! - [`AccessController`]: Gate driver and event source
//! - [`SchemaLifecycle`]: Schema state transitions
//! - [`Negotiator`]: Jailkeeper conversation
//! - [`EnforcementAdapter`] / [`CompletionService`]: Collaborator traits

pub mod access;
pub mod completion;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
pub mod negotiation;
pub mod personality;
pub mod runtime;
pub mod schema;
pub mod storage;

pub use access::{AccessController, AccessGate, AccessSnapshot, GateState};
pub use completion::{CompletionError, CompletionService, OpenAiCompletion, RetryPolicy};
pub use enforcement::{EnforcementAdapter, EnforcementError};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::GateEvent;
pub use lifecycle::SchemaLifecycle;
pub use negotiation::{
    Codeword, ConversationTheme, Message, NegotiationMode, NegotiationOutcome, Negotiator, Sender,
    TherapeuticProgress,
};
pub use personality::{Personality, PersonalityPolicy, PromptTone};
pub use runtime::PhoneJail;
pub use schema::{
    starter_schemas, BlockingCondition, ConditionContext, ContentSelection, Schema, SchemaDraft,
    SchemaId, SchemaStatus, SchemaType, ScheduleWindow, Weekday,
};
pub use storage::{Config, Database, Settings, SettingsService};
