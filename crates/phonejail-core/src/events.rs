use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every access-gate state change produces an event.
/// Subscribers receive them over the controller's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GateEvent {
    /// The lock flag flipped.
    LockChanged {
        locked: bool,
        at: DateTime<Utc>,
    },
    AccessGranted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// One countdown second elapsed.
    AccessTicked {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    AccessExtended {
        added_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Temporary access ran out on its own.
    AccessExpired {
        at: DateTime<Utc>,
    },
    AccessRevoked {
        at: DateTime<Utc>,
    },
}

impl GateEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            GateEvent::LockChanged { at, .. }
            | GateEvent::AccessGranted { at, .. }
            | GateEvent::AccessTicked { at, .. }
            | GateEvent::AccessExtended { at, .. }
            | GateEvent::AccessExpired { at }
            | GateEvent::AccessRevoked { at } => *at,
        }
    }
}
