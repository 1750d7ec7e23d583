//! Shared trigger and engine state.
//!
//! `EngineState` is the whole mutable bundle (trackers, trigger state,
//! last lifecycle outcome) behind one mutex. The lock is held only for a
//! snapshot read or an atomic transition, never across I/O.

use pmlag_core::{InstrumentId, LifecycleOutcome};
use pmlag_feed::{TrackerConfig, TrackerSet};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide trigger state. One instance for all instruments.
///
/// `active` is true exactly while one lifecycle task is outstanding.
/// `cooldown_until_ms` only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TriggerState {
    active: bool,
    last_fired_at_ms: Option<i64>,
    cooldown_until_ms: i64,
}

impl TriggerState {
    /// State with an initial cooldown ending `warmup` after `start_ms`.
    pub fn new(start_ms: i64, warmup: Duration) -> Self {
        Self {
            active: false,
            last_fired_at_ms: None,
            cooldown_until_ms: start_ms + warmup.as_millis() as i64,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_fired_at_ms(&self) -> Option<i64> {
        self.last_fired_at_ms
    }

    pub fn cooldown_until_ms(&self) -> i64 {
        self.cooldown_until_ms
    }

    pub fn in_cooldown(&self, now_ms: i64) -> bool {
        now_ms < self.cooldown_until_ms
    }

    /// Remaining cooldown, zero when elapsed.
    pub fn cooldown_remaining(&self, now_ms: i64) -> Duration {
        Duration::from_millis((self.cooldown_until_ms - now_ms).max(0) as u64)
    }

    /// Mark a fire: set active and push the cooldown out.
    pub(crate) fn fire(&mut self, now_ms: i64, cooldown: Duration) {
        self.active = true;
        self.last_fired_at_ms = Some(now_ms);
        self.extend_cooldown(now_ms + cooldown.as_millis() as i64);
    }

    /// Advance the cooldown; earlier deadlines are ignored.
    pub fn extend_cooldown(&mut self, until_ms: i64) {
        self.cooldown_until_ms = self.cooldown_until_ms.max(until_ms);
    }

    /// Release the single-flight slot when the lifecycle task ends.
    pub fn complete(&mut self) {
        self.active = false;
    }
}

/// Everything the dispatch path mutates and the presenter reads.
#[derive(Debug)]
pub struct EngineState {
    pub trackers: TrackerSet,
    pub trigger: TriggerState,
    pub leader: InstrumentId,
    pub lagger: InstrumentId,
    pub last_outcome: Option<LifecycleOutcome>,
    pub fires: u64,
}

impl EngineState {
    pub fn new(
        leader: InstrumentId,
        lagger: InstrumentId,
        tracker_config: &TrackerConfig,
        trigger: TriggerState,
    ) -> Self {
        Self {
            trackers: TrackerSet::new([leader.clone(), lagger.clone()], tracker_config),
            trigger,
            leader,
            lagger,
            last_outcome: None,
            fires: 0,
        }
    }

    /// Record a finished lifecycle and free the single-flight slot.
    pub fn finish_lifecycle(&mut self, outcome: LifecycleOutcome) {
        self.last_outcome = Some(outcome);
        self.trigger.complete();
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(parking_lot::Mutex::new(self))
    }
}

/// Handle to the state bundle shared by dispatch, lifecycle tasks and the
/// presenter.
pub type SharedState = Arc<parking_lot::Mutex<EngineState>>;

#[cfg(test)]
mod tests {
    use super::*;
    use pmlag_core::OutcomeStatus;

    #[test]
    fn test_warmup_sets_initial_cooldown() {
        let state = TriggerState::new(1_000, Duration::from_secs(5));
        assert!(state.in_cooldown(5_999));
        assert!(!state.in_cooldown(6_000));
        assert_eq!(state.cooldown_remaining(2_000), Duration::from_secs(4));
    }

    #[test]
    fn test_cooldown_never_moves_backward() {
        let mut state = TriggerState::new(0, Duration::from_secs(100));
        state.extend_cooldown(10_000);
        assert_eq!(state.cooldown_until_ms(), 100_000);
        state.extend_cooldown(200_000);
        assert_eq!(state.cooldown_until_ms(), 200_000);
    }

    #[test]
    fn test_finish_lifecycle_clears_active() {
        let mut engine = EngineState::new(
            InstrumentId::new("a"),
            InstrumentId::new("b"),
            &TrackerConfig::default(),
            TriggerState::default(),
        );
        engine.trigger.fire(0, Duration::from_secs(180));
        assert!(engine.trigger.is_active());

        engine.finish_lifecycle(LifecycleOutcome::new(OutcomeStatus::Cancelled));
        assert!(!engine.trigger.is_active());
        assert_eq!(
            engine.last_outcome.as_ref().map(|o| o.status.clone()),
            Some(OutcomeStatus::Cancelled)
        );
    }

    #[test]
    fn test_same_leader_and_lagger_share_one_tracker() {
        let engine = EngineState::new(
            InstrumentId::new("a"),
            InstrumentId::new("a"),
            &TrackerConfig::default(),
            TriggerState::default(),
        );
        assert_eq!(engine.trackers.len(), 1);
    }
}
