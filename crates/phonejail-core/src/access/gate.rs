//! Access-gate state machine.
//!
//! The gate is a pure, tick-driven state machine. It owns no timer: the
//! caller is responsible for calling `tick()` once per second while
//! temporary access is granted (see [`AccessController`](super::AccessController)).
//!
//! ## Lock rule
//!
//! ```text
//! locked = strict_mode && has_active_schema && !temporary_access_granted
//! ```
//!
//! Inputs that have not been wired yet count as `false`, so an unconfigured
//! gate reports `Unlocked`.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::GateEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateState {
    Unlocked,
    Locked,
    TemporarilyUnlocked,
}

/// Read-only view of the gate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSnapshot {
    pub state: GateState,
    pub strict_mode_enabled: bool,
    pub has_active_schema: bool,
    pub temporary_access_granted: bool,
    pub access_time_remaining_secs: u64,
}

impl AccessSnapshot {
    pub fn is_locked(&self) -> bool {
        self.state == GateState::Locked
    }

    /// Remaining temporary access as `m:ss`.
    pub fn remaining_formatted(&self) -> String {
        let secs = self.access_time_remaining_secs;
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    pub fn should_show_access_banner(&self) -> bool {
        self.temporary_access_granted && self.access_time_remaining_secs > 0
    }

    pub fn status_message(&self) -> String {
        match self.state {
            GateState::TemporarilyUnlocked => format!(
                "Temporary access granted \u{2022} {} remaining",
                self.remaining_formatted()
            ),
            GateState::Locked => "Schema access is locked due to strict mode".to_string(),
            GateState::Unlocked => "Schema access is available".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessGate {
    /// `None` until settings are wired.
    strict_mode: Option<bool>,
    /// `None` until the registry is wired.
    has_active_schema: Option<bool>,
    temporary_access_granted: bool,
    remaining_secs: u64,
    locked: bool,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_granted(&self) -> bool {
        self.temporary_access_granted
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn state(&self) -> GateState {
        if self.locked {
            GateState::Locked
        } else if self.temporary_access_granted {
            GateState::TemporarilyUnlocked
        } else {
            GateState::Unlocked
        }
    }

    pub fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            state: self.state(),
            strict_mode_enabled: self.strict_mode.unwrap_or(false),
            has_active_schema: self.has_active_schema.unwrap_or(false),
            temporary_access_granted: self.temporary_access_granted,
            access_time_remaining_secs: self.remaining_secs,
        }
    }

    fn should_lock(&self) -> bool {
        self.strict_mode.unwrap_or(false)
            && self.has_active_schema.unwrap_or(false)
            && !self.temporary_access_granted
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bring the lock flag in line with the current inputs.
    /// Returns an event only when the flag actually flips.
    pub fn recompute(&mut self) -> Option<GateEvent> {
        let should_lock = self.should_lock();
        if should_lock == self.locked {
            return None;
        }
        self.locked = should_lock;
        Some(GateEvent::LockChanged {
            locked: should_lock,
            at: Utc::now(),
        })
    }

    pub fn set_strict_mode(&mut self, enabled: bool) -> Option<GateEvent> {
        self.strict_mode = Some(enabled);
        self.recompute()
    }

    pub fn set_has_active_schema(&mut self, has_active: bool) -> Option<GateEvent> {
        self.has_active_schema = Some(has_active);
        self.recompute()
    }

    /// Unlock for `duration`, replacing any running grant.
    ///
    /// Sub-second precision is dropped. A grant shorter than one second is
    /// ignored and produces no events.
    pub fn grant_temporary_access(&mut self, duration: Duration) -> Vec<GateEvent> {
        let secs = duration.as_secs();
        if secs == 0 {
            return Vec::new();
        }
        self.temporary_access_granted = true;
        self.remaining_secs = secs;

        let mut events = vec![GateEvent::AccessGranted {
            duration_secs: secs,
            at: Utc::now(),
        }];
        events.extend(self.recompute());
        events
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> Vec<GateEvent> {
        if !self.temporary_access_granted {
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return vec![GateEvent::AccessTicked {
                remaining_secs: self.remaining_secs,
                at: Utc::now(),
            }];
        }

        self.clear_temporary_access();
        let mut events = vec![GateEvent::AccessExpired { at: Utc::now() }];
        events.extend(self.recompute());
        events
    }

    /// Add time to a running grant. No-op when nothing is granted.
    pub fn extend_access(&mut self, additional: Duration) -> Option<GateEvent> {
        let added = additional.as_secs();
        if !self.temporary_access_granted || added == 0 {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_add(added);
        Some(GateEvent::AccessExtended {
            added_secs: added,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn revoke_access(&mut self) -> Vec<GateEvent> {
        let mut events = Vec::new();
        if self.temporary_access_granted {
            self.clear_temporary_access();
            events.push(GateEvent::AccessRevoked { at: Utc::now() });
        }
        events.extend(self.recompute());
        events
    }

    fn clear_temporary_access(&mut self) {
        self.temporary_access_granted = false;
        self.remaining_secs = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked_gate() -> AccessGate {
        let mut gate = AccessGate::new();
        gate.set_strict_mode(true);
        gate.set_has_active_schema(true);
        gate
    }

    #[test]
    fn unwired_gate_is_unlocked() {
        let mut gate = AccessGate::new();
        assert_eq!(gate.state(), GateState::Unlocked);
        assert!(gate.set_strict_mode(true).is_none());
        assert!(!gate.is_locked());
    }

    #[test]
    fn locks_when_strict_and_active() {
        let mut gate = AccessGate::new();
        gate.set_has_active_schema(true);
        let event = gate.set_strict_mode(true);
        assert!(matches!(event, Some(GateEvent::LockChanged { locked: true, .. })));
        assert_eq!(gate.state(), GateState::Locked);
        assert!(gate.recompute().is_none());
    }

    #[test]
    fn grant_unlocks_immediately() {
        let mut gate = locked_gate();
        let events = gate.grant_temporary_access(Duration::from_secs(600));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], GateEvent::AccessGranted { duration_secs: 600, .. }));
        assert!(matches!(events[1], GateEvent::LockChanged { locked: false, .. }));
        assert_eq!(gate.state(), GateState::TemporarilyUnlocked);
        assert_eq!(gate.remaining_secs(), 600);
    }

    #[test]
    fn zero_grant_is_ignored() {
        let mut gate = locked_gate();
        assert!(gate.grant_temporary_access(Duration::from_millis(900)).is_empty());
        assert!(gate.is_locked());
        assert!(!gate.is_granted());
    }

    #[test]
    fn countdown_relocks_at_zero() {
        let mut gate = locked_gate();
        gate.grant_temporary_access(Duration::from_secs(3));
        let events = gate.tick();
        assert!(matches!(
            events.as_slice(),
            [GateEvent::AccessTicked { remaining_secs: 2, .. }]
        ));
        gate.tick();
        let events = gate.tick();
        assert!(matches!(events[0], GateEvent::AccessExpired { .. }));
        assert!(matches!(events[1], GateEvent::LockChanged { locked: true, .. }));
        assert!(gate.is_locked());
        assert_eq!(gate.remaining_secs(), 0);
        assert!(gate.tick().is_empty());
    }

    #[test]
    fn extend_only_while_granted() {
        let mut gate = locked_gate();
        assert!(gate.extend_access(Duration::from_secs(60)).is_none());

        gate.grant_temporary_access(Duration::from_secs(10));
        gate.tick();
        gate.extend_access(Duration::from_secs(60));
        assert_eq!(gate.remaining_secs(), 69);
    }

    #[test]
    fn revoke_relocks() {
        let mut gate = locked_gate();
        gate.grant_temporary_access(Duration::from_secs(10));
        let events = gate.revoke_access();
        assert!(matches!(events[0], GateEvent::AccessRevoked { .. }));
        assert!(gate.is_locked());
        assert!(gate.revoke_access().is_empty());
    }

    #[test]
    fn snapshot_text() {
        let mut gate = locked_gate();
        assert_eq!(
            gate.snapshot().status_message(),
            "Schema access is locked due to strict mode"
        );
        gate.grant_temporary_access(Duration::from_secs(605));
        let snapshot = gate.snapshot();
        assert_eq!(snapshot.remaining_formatted(), "10:05");
        assert!(snapshot.should_show_access_banner());
        assert!(snapshot.status_message().ends_with("10:05 remaining"));

        gate.set_strict_mode(false);
        gate.revoke_access();
        let snapshot = gate.snapshot();
        assert!(!snapshot.should_show_access_banner());
        assert_eq!(snapshot.status_message(), "Schema access is available");
    }
}
