//! Schema data model.
//!
//! A schema is a named bundle of blocked content plus the conditions under
//! which it blocks. Schemas are created by the creation flow ([`SchemaDraft`])
//! or from a starter template, and afterwards mutated only by the lifecycle
//! manager through the [`SchemaRegistry`].

mod condition;
mod draft;
pub mod registry;
mod selection;
mod templates;

pub use condition::{
    BlockingCondition, ConditionContext, ConditionKind, ConditionType, ScheduleWindow, Weekday,
};
pub use draft::{DraftStep, SchemaDraft};
pub use registry::{SchemaRegistry, SchemaStore};
pub use selection::SelectionRepository;
pub use templates::starter_schemas;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Stable schema identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(Uuid);

impl SchemaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SchemaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Starter template kind a schema was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaType {
    QuickBlock,
    HealthyWorkHabits,
    StressFreeWeekends,
    StressFreeMornings,
    StressFreeEvenings,
    ThirtyMinuteWatchlist,
    HighControl,
    SiriPowered,
    FocusMode,
    StudyMode,
    DigitalDetox,
    Custom,
}

impl SchemaType {
    pub const ALL: [SchemaType; 12] = [
        SchemaType::QuickBlock,
        SchemaType::HealthyWorkHabits,
        SchemaType::StressFreeWeekends,
        SchemaType::StressFreeMornings,
        SchemaType::StressFreeEvenings,
        SchemaType::ThirtyMinuteWatchlist,
        SchemaType::HighControl,
        SchemaType::SiriPowered,
        SchemaType::FocusMode,
        SchemaType::StudyMode,
        SchemaType::DigitalDetox,
        SchemaType::Custom,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            SchemaType::QuickBlock => "Quick Block",
            SchemaType::HealthyWorkHabits => "Healthy Work Habits",
            SchemaType::StressFreeWeekends => "Stress-free Weekends",
            SchemaType::StressFreeMornings => "Stress-free Mornings",
            SchemaType::StressFreeEvenings => "Stress-free Evenings",
            SchemaType::ThirtyMinuteWatchlist => "30 Minute Watchlist",
            SchemaType::HighControl => "High Control",
            SchemaType::SiriPowered => "Siri-Powered Schema",
            SchemaType::FocusMode => "Focus Mode",
            SchemaType::StudyMode => "Study Mode",
            SchemaType::DigitalDetox => "Digital Detox",
            SchemaType::Custom => "Custom",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SchemaType::QuickBlock => "Blocks content until switched off",
            SchemaType::HealthyWorkHabits => "Blocks content during working hours",
            SchemaType::StressFreeWeekends => "Blocks content on weekends",
            SchemaType::StressFreeMornings => "Blocks content every morning until 10am",
            SchemaType::StressFreeEvenings => "Blocks content every evening from 5pm",
            SchemaType::ThirtyMinuteWatchlist => "Blocks content after 30 minutes of daily use",
            SchemaType::HighControl => "Blocks content on a schedule and after a daily usage limit",
            SchemaType::SiriPowered => "No native conditions; driven entirely by Shortcuts",
            SchemaType::FocusMode => "Blocks distracting apps during focus periods",
            SchemaType::StudyMode => "Minimal distractions for study sessions",
            SchemaType::DigitalDetox => "A complete digital cleanse",
            SchemaType::Custom => "Your own blocking rules",
        }
    }
}

/// Lifecycle status of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaStatus {
    Inactive,
    Active,
    Paused,
    StrictMode,
    Scheduled,
}

impl SchemaStatus {
    /// Whether enforcement is considered in effect for this status.
    pub fn is_active(self) -> bool {
        matches!(self, SchemaStatus::Active | SchemaStatus::StrictMode)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SchemaStatus::Inactive => "Inactive",
            SchemaStatus::Active => "Active",
            SchemaStatus::Paused => "Paused",
            SchemaStatus::StrictMode => "Blocking Strictly",
            SchemaStatus::Scheduled => "Scheduled",
        }
    }
}

/// Opaque references to the content a schema blocks.
///
/// Entries are whatever tokens the enforcement backend understands
/// (bundle identifiers, domains, category tokens); this crate never
/// interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSelection {
    #[serde(default)]
    pub apps: BTreeSet<String>,
    #[serde(default)]
    pub websites: BTreeSet<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

impl ContentSelection {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.websites.is_empty() && self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.apps.len() + self.websites.len() + self.categories.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: SchemaId,
    pub name: String,
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    pub status: SchemaStatus,
    #[serde(default)]
    pub selected_content: ContentSelection,
    #[serde(default)]
    pub blocking_conditions: Vec<BlockingCondition>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Schema {
    /// A new, inactive schema with no content or conditions.
    pub fn new(name: impl Into<String>, schema_type: SchemaType) -> Self {
        let now = Utc::now();
        Self {
            id: SchemaId::new(),
            name: name.into(),
            schema_type,
            status: SchemaStatus::Inactive,
            selected_content: ContentSelection::default(),
            blocking_conditions: Vec::new(),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_custom(&self) -> bool {
        self.schema_type == SchemaType::Custom
    }

    pub fn has_time_conditions(&self) -> bool {
        self.blocking_conditions
            .iter()
            .any(|c| c.condition_type() == ConditionType::Schedule)
    }

    pub fn has_usage_limits(&self) -> bool {
        self.blocking_conditions
            .iter()
            .any(|c| c.condition_type() == ConditionType::DailyUsageLimit)
    }

    pub fn total_apps_and_websites(&self) -> usize {
        self.selected_content.apps.len() + self.selected_content.websites.len()
    }

    /// True when any condition's predicate holds. Conditions are OR-ed;
    /// a schema without conditions never blocks on its own.
    pub fn is_condition_blocking(&self, ctx: &ConditionContext) -> bool {
        self.blocking_conditions.iter().any(|c| c.is_blocking(ctx))
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
