//! Async driver for the access gate.
//!
//! Owns the gate behind a mutex, publishes every [`GateEvent`] on a
//! broadcast channel, and runs the one-second countdown while temporary
//! access is granted. At most one countdown task exists per controller.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

use super::gate::{AccessGate, AccessSnapshot};
use crate::error::{CoreError, Result};
use crate::events::GateEvent;

const EVENT_CAPACITY: usize = 64;
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct GateCell {
    gate: AccessGate,
    /// Bumped whenever a countdown is started or cancelled.
    generation: u64,
}

#[derive(Debug)]
struct Shared {
    cell: Mutex<GateCell>,
    countdown: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<GateEvent>,
}

impl Shared {
    fn cell(&self) -> MutexGuard<'_, GateCell> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn replace_countdown(&self, next: Option<JoinHandle<()>>) {
        let mut slot = self.countdown.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = std::mem::replace(&mut *slot, next) {
            previous.abort();
        }
    }

    fn publish(&self, events: impl IntoIterator<Item = GateEvent>) {
        for event in events {
            match &event {
                GateEvent::LockChanged { locked, .. } => info!(locked, "access lock changed"),
                GateEvent::AccessGranted { duration_secs, .. } => {
                    info!(duration_secs, "temporary access granted")
                }
                GateEvent::AccessExtended { remaining_secs, .. } => {
                    info!(remaining_secs, "temporary access extended")
                }
                GateEvent::AccessExpired { .. } => info!("temporary access expired"),
                GateEvent::AccessRevoked { .. } => info!("temporary access revoked"),
                GateEvent::AccessTicked { .. } => {}
            }
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let slot = self.countdown.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

/// Cloneable handle to one gate. The countdown task only holds a weak
/// reference, so dropping the last handle stops it.
#[derive(Debug, Clone)]
pub struct AccessController {
    shared: Arc<Shared>,
}

impl Default for AccessController {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessController {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                cell: Mutex::new(GateCell::default()),
                countdown: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> AccessSnapshot {
        self.shared.cell().gate.snapshot()
    }

    pub fn is_locked(&self) -> bool {
        self.shared.cell().gate.is_locked()
    }

    pub fn set_strict_mode(&self, enabled: bool) {
        let event = self.shared.cell().gate.set_strict_mode(enabled);
        self.shared.publish(event);
    }

    pub fn set_has_active_schema(&self, has_active: bool) {
        let event = self.shared.cell().gate.set_has_active_schema(has_active);
        self.shared.publish(event);
    }

    pub fn recompute(&self) {
        let event = self.shared.cell().gate.recompute();
        self.shared.publish(event);
    }

    /// Unlock for `duration` and (re)start the countdown.
    ///
    /// Must be called from within a tokio runtime. Durations under one
    /// second are ignored.
    pub fn grant_temporary_access(&self, duration: Duration) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Runtime(format!("no runtime for countdown: {e}")))?;

        let events = {
            let mut cell = self.shared.cell();
            let events = cell.gate.grant_temporary_access(duration);
            if events.is_empty() {
                debug!(?duration, "ignoring sub-second grant");
                return Ok(());
            }
            cell.generation += 1;
            let task = handle.spawn(run_countdown(Arc::downgrade(&self.shared), cell.generation));
            // Swapped while the cell is held so concurrent grants cannot
            // leave an older task in the slot.
            self.shared.replace_countdown(Some(task));
            events
        };
        self.shared.publish(events);
        Ok(())
    }

    pub fn extend_access(&self, additional: Duration) {
        let event = self.shared.cell().gate.extend_access(additional);
        self.shared.publish(event);
    }

    pub fn revoke_access(&self) {
        let events = {
            let mut cell = self.shared.cell();
            cell.generation += 1;
            self.shared.replace_countdown(None);
            cell.gate.revoke_access()
        };
        self.shared.publish(events);
    }

    /// Stop the countdown without touching the gate state.
    pub fn shutdown(&self) {
        let mut cell = self.shared.cell();
        cell.generation += 1;
        self.shared.replace_countdown(None);
    }
}

async fn run_countdown(shared: Weak<Shared>, generation: u64) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let (events, finished) = {
            let mut cell = shared.cell();
            if cell.generation != generation {
                debug!(generation, "stale countdown stopped");
                return;
            }
            let events = cell.gate.tick();
            (events, !cell.gate.is_granted())
        };
        shared.publish(events);
        if finished {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::GateState;

    fn locked() -> AccessController {
        let controller = AccessController::new();
        controller.set_strict_mode(true);
        controller.set_has_active_schema(true);
        controller
    }

    #[test]
    fn grant_outside_runtime_fails() {
        let controller = locked();
        let err = controller
            .grant_temporary_access(Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, CoreError::Runtime(_)));
        assert!(controller.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_relocks() {
        let controller = locked();
        controller
            .grant_temporary_access(Duration::from_secs(5))
            .unwrap();
        assert_eq!(controller.snapshot().state, GateState::TemporarilyUnlocked);

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(controller.snapshot().access_time_remaining_secs, 1);
        assert!(!controller.is_locked());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(controller.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn regrant_replaces_countdown() {
        let controller = locked();
        controller
            .grant_temporary_access(Duration::from_secs(5))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        controller
            .grant_temporary_access(Duration::from_secs(5))
            .unwrap();

        // One countdown only: remaining drops by one per second.
        tokio::time::sleep(Duration::from_millis(3_200)).await;
        assert_eq!(controller.snapshot().access_time_remaining_secs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn revoke_stops_countdown() {
        let controller = locked();
        let mut events = controller.subscribe();
        controller
            .grant_temporary_access(Duration::from_secs(5))
            .unwrap();
        controller.revoke_access();
        assert!(controller.is_locked());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen
            .iter()
            .all(|e| !matches!(e, GateEvent::AccessTicked { .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, GateEvent::AccessRevoked { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_controller_ends_task() {
        let controller = locked();
        controller
            .grant_temporary_access(Duration::from_secs(5))
            .unwrap();
        let weak = Arc::downgrade(&controller.shared);
        drop(controller);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(weak.upgrade().is_none());
    }
}
