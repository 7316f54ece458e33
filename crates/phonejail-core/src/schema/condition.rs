//! Blocking conditions.
//!
//! Each condition is a predicate over a [`ConditionContext`]. Only the fields
//! belonging to a condition's type exist on it: the type is the enum variant.

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub const WEEKDAYS: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub const WEEKEND: [Weekday; 2] = [Weekday::Saturday, Weekday::Sunday];

    /// The day before this one.
    pub fn pred(self) -> Weekday {
        match self {
            Weekday::Sunday => Weekday::Saturday,
            Weekday::Monday => Weekday::Sunday,
            Weekday::Tuesday => Weekday::Monday,
            Weekday::Wednesday => Weekday::Tuesday,
            Weekday::Thursday => Weekday::Wednesday,
            Weekday::Friday => Weekday::Thursday,
            Weekday::Saturday => Weekday::Friday,
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sun",
            Weekday::Monday => "Mon",
            Weekday::Tuesday => "Tue",
            Weekday::Wednesday => "Wed",
            Weekday::Thursday => "Thu",
            Weekday::Friday => "Fri",
            Weekday::Saturday => "Sat",
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }
}

/// Inputs a condition predicate is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionContext {
    /// Local wall-clock time.
    pub now: NaiveDateTime,
    /// Combined use of the schema's content so far today.
    pub usage_today: Duration,
}

impl ConditionContext {
    pub fn new(now: NaiveDateTime, usage_today: Duration) -> Self {
        Self { now, usage_today }
    }

    /// Context at the current local time.
    pub fn local_now(usage_today: Duration) -> Self {
        Self::new(Local::now().naive_local(), usage_today)
    }
}

/// Daily time window, optionally crossing midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Carried for the enforcement backend. Evaluation always treats the
    /// window as recurring; one-shot schedules are not modelled.
    #[serde(default = "default_true")]
    pub repeats: bool,
    pub active_days: BTreeSet<Weekday>,
}

fn default_true() -> bool {
    true
}

impl ScheduleWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, active_days: BTreeSet<Weekday>) -> Self {
        Self {
            start,
            end,
            repeats: true,
            active_days,
        }
    }

    /// Whether `now` falls inside the window. The window is start-inclusive
    /// and end-exclusive. When `start > end` the window wraps past midnight
    /// and the early-morning tail belongs to the previous day's window.
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let day = Weekday::from(now.weekday());
        let time = now.time();

        if self.start < self.end {
            return self.active_days.contains(&day) && time >= self.start && time < self.end;
        }
        if self.start > self.end {
            return (self.active_days.contains(&day) && time >= self.start)
                || (self.active_days.contains(&day.pred()) && time < self.end);
        }
        false
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.active_days.is_empty() {
            return Err(ValidationError::EmptyActiveDays);
        }
        if self.start == self.end {
            return Err(ValidationError::InvalidValue {
                field: "schedule".into(),
                message: "start and end must differ".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionType {
    Schedule,
    DailyUsageLimit,
    Custom,
}

impl ConditionType {
    pub fn display_name(self) -> &'static str {
        match self {
            ConditionType::Schedule => "Schedule",
            ConditionType::DailyUsageLimit => "Daily Usage Limit",
            ConditionType::Custom => "Custom Condition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionKind {
    Schedule(ScheduleWindow),
    DailyUsageLimit {
        usage_limit_secs: u64,
    },
    Custom {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingCondition {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: ConditionKind,
}

impl BlockingCondition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }

    pub fn schedule(window: ScheduleWindow) -> Self {
        Self::new(ConditionKind::Schedule(window))
    }

    pub fn daily_usage_limit(limit: Duration) -> Self {
        Self::new(ConditionKind::DailyUsageLimit {
            usage_limit_secs: limit.as_secs(),
        })
    }

    pub fn custom(title: Option<String>, description: Option<String>) -> Self {
        Self::new(ConditionKind::Custom { title, description })
    }

    pub fn condition_type(&self) -> ConditionType {
        match self.kind {
            ConditionKind::Schedule(_) => ConditionType::Schedule,
            ConditionKind::DailyUsageLimit { .. } => ConditionType::DailyUsageLimit,
            ConditionKind::Custom { .. } => ConditionType::Custom,
        }
    }

    /// Evaluate the predicate.
    ///
    /// Custom conditions carry no evaluable fields and always hold, so a
    /// schema with only custom conditions blocks for as long as it is active.
    pub fn is_blocking(&self, ctx: &ConditionContext) -> bool {
        match &self.kind {
            ConditionKind::Schedule(window) => window.contains(ctx.now),
            ConditionKind::DailyUsageLimit { usage_limit_secs } => {
                ctx.usage_today.as_secs() >= *usage_limit_secs
            }
            ConditionKind::Custom { .. } => true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.kind {
            ConditionKind::Schedule(window) => window.validate(),
            ConditionKind::DailyUsageLimit { usage_limit_secs } => {
                if *usage_limit_secs == 0 {
                    Err(ValidationError::ZeroUsageLimit)
                } else {
                    Ok(())
                }
            }
            ConditionKind::Custom { .. } => Ok(()),
        }
    }
}
