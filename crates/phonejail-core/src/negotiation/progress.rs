//! Coaching progress the guide conversation builds on.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Goals, insights and engagement collected across guide conversations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TherapeuticProgress {
    pub current_goals: Vec<String>,
    pub completed_goals: Vec<String>,
    pub insights: Vec<String>,
    pub trigger_patterns: Vec<String>,
    pub coping_strategies: Vec<String>,
    pub last_checkin: Option<DateTime<Utc>>,
    pub last_weekly_review: Option<DateTime<Utc>>,
    /// Consecutive days with a check-in.
    pub engagement_streak: u32,
}

fn push_unique(list: &mut Vec<String>, entry: &str) -> bool {
    let entry = entry.trim();
    if entry.is_empty() || list.iter().any(|e| e == entry) {
        return false;
    }
    list.push(entry.to_string());
    true
}

impl TherapeuticProgress {
    /// Add an open goal. Blank and duplicate goals are ignored.
    pub fn add_goal(&mut self, goal: &str) -> bool {
        push_unique(&mut self.current_goals, goal)
    }

    /// Move an open goal to the completed list. Returns `false` when no
    /// open goal matches exactly.
    pub fn complete_goal(&mut self, goal: &str) -> bool {
        let goal = goal.trim();
        let Some(index) = self.current_goals.iter().position(|g| g == goal) else {
            return false;
        };
        let done = self.current_goals.remove(index);
        self.completed_goals.push(done);
        true
    }

    pub fn add_insight(&mut self, insight: &str) -> bool {
        push_unique(&mut self.insights, insight)
    }

    pub fn add_trigger_pattern(&mut self, trigger: &str) -> bool {
        push_unique(&mut self.trigger_patterns, trigger)
    }

    pub fn add_coping_strategy(&mut self, strategy: &str) -> bool {
        push_unique(&mut self.coping_strategies, strategy)
    }

    /// Record a daily check-in at `now`.
    ///
    /// A second check-in on the same day leaves the streak alone; a gap of
    /// more than one day starts it over at 1.
    pub fn record_checkin(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        self.engagement_streak = match self.last_checkin.map(|t| t.date_naive()) {
            Some(last) if last == today => self.engagement_streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.engagement_streak + 1,
            _ => 1,
        };
        self.last_checkin = Some(now);
    }

    pub fn record_weekly_review(&mut self, now: DateTime<Utc>) {
        self.last_weekly_review = Some(now);
    }

    pub fn last_checkin_date(&self) -> Option<NaiveDate> {
        self.last_checkin.map(|t| t.date_naive())
    }
}
