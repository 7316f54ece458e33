//! Property tests for the pure access gate.
//!
//! Random command sequences are replayed against the gate and a plain
//! model of the lock rule.

use std::time::Duration;

use phonejail_core::{AccessGate, GateEvent, GateState};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Strict(bool),
    Active(bool),
    Grant(u64),
    Tick,
    Extend(u64),
    Revoke,
    Recompute,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => any::<bool>().prop_map(Op::Strict),
        1 => any::<bool>().prop_map(Op::Active),
        1 => (0u64..30).prop_map(Op::Grant),
        // Ticks dominate so grants actually run out.
        6 => Just(Op::Tick),
        1 => (0u64..10).prop_map(Op::Extend),
        1 => Just(Op::Revoke),
        1 => Just(Op::Recompute),
    ]
}

#[derive(Debug, Default)]
struct Model {
    strict: bool,
    active: bool,
    granted: bool,
    remaining: u64,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Strict(enabled) => self.strict = enabled,
            Op::Active(active) => self.active = active,
            Op::Grant(secs) if secs > 0 => {
                self.granted = true;
                self.remaining = secs;
            }
            Op::Grant(_) | Op::Recompute => {}
            Op::Tick if self.granted => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.granted = false;
                }
            }
            Op::Tick => {}
            Op::Extend(secs) if self.granted => self.remaining += secs,
            Op::Extend(_) => {}
            Op::Revoke => {
                self.granted = false;
                self.remaining = 0;
            }
        }
    }

    fn locked(&self) -> bool {
        self.strict && self.active && !self.granted
    }
}

fn apply(gate: &mut AccessGate, op: &Op) -> Vec<GateEvent> {
    match *op {
        Op::Strict(enabled) => gate.set_strict_mode(enabled).into_iter().collect(),
        Op::Active(active) => gate.set_has_active_schema(active).into_iter().collect(),
        Op::Grant(secs) => gate.grant_temporary_access(Duration::from_secs(secs)),
        Op::Tick => gate.tick(),
        Op::Extend(secs) => gate.extend_access(Duration::from_secs(secs)).into_iter().collect(),
        Op::Revoke => gate.revoke_access(),
        Op::Recompute => gate.recompute().into_iter().collect(),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_gate_matches_lock_rule(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut gate = AccessGate::new();
        let mut model = Model::default();

        for op in &ops {
            apply(&mut gate, op);
            model.apply(op);

            prop_assert_eq!(gate.is_locked(), model.locked(), "after {:?}", op);
            prop_assert_eq!(gate.is_granted(), model.granted);
            prop_assert_eq!(gate.remaining_secs(), model.remaining);

            let expected = if model.locked() {
                GateState::Locked
            } else if model.granted {
                GateState::TemporarilyUnlocked
            } else {
                GateState::Unlocked
            };
            prop_assert_eq!(gate.state(), expected);
        }
    }

    #[test]
    fn prop_lock_events_only_report_flips(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut gate = AccessGate::new();
        let mut last_locked = false;

        for op in &ops {
            for event in apply(&mut gate, op) {
                if let GateEvent::LockChanged { locked, .. } = event {
                    prop_assert_ne!(locked, last_locked);
                    last_locked = locked;
                }
            }
            prop_assert_eq!(gate.is_locked(), last_locked);
        }
    }

    #[test]
    fn prop_grant_runs_exactly_its_duration(secs in 1u64..2_000) {
        let mut gate = AccessGate::new();
        gate.set_strict_mode(true);
        gate.set_has_active_schema(true);

        gate.grant_temporary_access(Duration::from_secs(secs));
        prop_assert_eq!(gate.remaining_secs(), secs);

        for _ in 1..secs {
            gate.tick();
            prop_assert!(!gate.is_locked());
        }
        let events = gate.tick();
        prop_assert!(gate.is_locked());
        let expired = events.iter().any(|e| matches!(e, GateEvent::AccessExpired { .. }));
        prop_assert!(expired);
    }

    #[test]
    fn prop_sub_second_precision_is_dropped(millis in 0u64..10_000) {
        let mut gate = AccessGate::new();
        let events = gate.grant_temporary_access(Duration::from_millis(millis));
        prop_assert_eq!(gate.remaining_secs(), millis / 1_000);
        prop_assert_eq!(events.is_empty(), millis < 1_000);
    }

    #[test]
    fn prop_remaining_formats_as_minutes_and_seconds(secs in 1u64..100_000) {
        let mut gate = AccessGate::new();
        gate.grant_temporary_access(Duration::from_secs(secs));
        let formatted = gate.snapshot().remaining_formatted();
        let (minutes, seconds) = formatted.split_once(':').unwrap();
        prop_assert_eq!(seconds.len(), 2);
        prop_assert_eq!(
            minutes.parse::<u64>().unwrap() * 60 + seconds.parse::<u64>().unwrap(),
            secs
        );
    }
}

// ============================================================================
// Fixed cases
// ============================================================================

#[test]
fn test_grant_replaces_running_grant() {
    let mut gate = AccessGate::new();
    gate.set_strict_mode(true);
    gate.set_has_active_schema(true);
    gate.grant_temporary_access(Duration::from_secs(600));
    gate.tick();

    let events = gate.grant_temporary_access(Duration::from_secs(300));
    assert_eq!(gate.remaining_secs(), 300);
    // Already unlocked, so no lock flip is reported.
    assert_eq!(events.len(), 1);
}

#[test]
fn test_deactivating_last_schema_during_grant_keeps_countdown() {
    let mut gate = AccessGate::new();
    gate.set_strict_mode(true);
    gate.set_has_active_schema(true);
    gate.grant_temporary_access(Duration::from_secs(2));
    gate.set_has_active_schema(false);

    gate.tick();
    gate.tick();
    assert_eq!(gate.state(), GateState::Unlocked);
    assert!(!gate.is_granted());
}
