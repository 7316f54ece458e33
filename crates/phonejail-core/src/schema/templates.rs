//! Starter schemas offered before the user builds their own.

use chrono::NaiveTime;
use std::collections::BTreeSet;
use std::time::Duration;

use super::{BlockingCondition, Schema, SchemaType, ScheduleWindow, Weekday};

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn days(list: &[Weekday]) -> BTreeSet<Weekday> {
    list.iter().copied().collect()
}

fn with_conditions(
    name: &str,
    schema_type: SchemaType,
    conditions: Vec<BlockingCondition>,
) -> Schema {
    let mut schema = Schema::new(name, schema_type);
    schema.blocking_conditions = conditions;
    schema
}

/// The built-in templates, each a fresh inactive schema with no content
/// selected. Content is chosen by the user when a template is adopted.
pub fn starter_schemas() -> Vec<Schema> {
    let work_window = || {
        BlockingCondition::schedule(ScheduleWindow::new(
            time(9, 0),
            time(17, 0),
            days(&Weekday::WEEKDAYS),
        ))
    };

    vec![
        with_conditions(
            "Quick Block",
            SchemaType::QuickBlock,
            vec![BlockingCondition::custom(None, None)],
        ),
        with_conditions(
            "Healthy Work Habits",
            SchemaType::HealthyWorkHabits,
            vec![work_window()],
        ),
        with_conditions(
            "Stress-free Weekends",
            SchemaType::StressFreeWeekends,
            vec![BlockingCondition::schedule(ScheduleWindow::new(
                time(0, 0),
                time(23, 59),
                days(&Weekday::WEEKEND),
            ))],
        ),
        with_conditions(
            "Stress-free Mornings",
            SchemaType::StressFreeMornings,
            vec![BlockingCondition::schedule(ScheduleWindow::new(
                time(6, 0),
                time(10, 0),
                days(&Weekday::ALL),
            ))],
        ),
        with_conditions(
            "Stress-free Evenings",
            SchemaType::StressFreeEvenings,
            vec![BlockingCondition::schedule(ScheduleWindow::new(
                time(17, 0),
                time(23, 59),
                days(&Weekday::ALL),
            ))],
        ),
        with_conditions(
            "30 Minute Watchlist",
            SchemaType::ThirtyMinuteWatchlist,
            vec![BlockingCondition::daily_usage_limit(Duration::from_secs(30 * 60))],
        ),
        with_conditions(
            "High Control",
            SchemaType::HighControl,
            vec![
                work_window(),
                BlockingCondition::daily_usage_limit(Duration::from_secs(60 * 60)),
            ],
        ),
        with_conditions(
            "Siri-Powered Schema",
            SchemaType::SiriPowered,
            vec![BlockingCondition::custom(None, None)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaStatus;

    #[test]
    fn templates_are_inactive_and_valid() {
        let templates = starter_schemas();
        assert_eq!(templates.len(), 8);
        for schema in &templates {
            assert_eq!(schema.status, SchemaStatus::Inactive);
            assert!(!schema.blocking_conditions.is_empty(), "{}", schema.name);
            for condition in &schema.blocking_conditions {
                condition.validate().unwrap();
            }
            assert_eq!(schema.name, schema.schema_type.display_name());
        }
    }

    #[test]
    fn high_control_combines_schedule_and_limit() {
        let high_control = starter_schemas()
            .into_iter()
            .find(|s| s.schema_type == SchemaType::HighControl)
            .unwrap();
        assert!(high_control.has_time_conditions());
        assert!(high_control.has_usage_limits());
    }
}
