//! Trigger evaluation.
//!
//! Runs synchronously on the dispatch path after each applied batch, under
//! the state lock. Firing marks the trigger active and advances the
//! cooldown in the same critical section, so a second evaluation on the
//! same data can never fire again.

use crate::config::{TriggerConfig, TriggerMode};
use crate::signal::{SkipReason, TriggerDecision, TriggerSignal};
use crate::state::{EngineState, TriggerState};
use pmlag_core::{InstrumentId, Price};
use pmlag_feed::TrackerSet;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Leader/lagger momentum trigger.
#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    config: TriggerConfig,
    leader: InstrumentId,
    lagger: InstrumentId,
}

impl TriggerEvaluator {
    pub fn new(config: TriggerConfig, leader: InstrumentId, lagger: InstrumentId) -> Self {
        Self {
            config,
            leader,
            lagger,
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn leader(&self) -> &InstrumentId {
        &self.leader
    }

    pub fn lagger(&self) -> &InstrumentId {
        &self.lagger
    }

    /// Evaluate against the shared bundle and count fires.
    pub fn check_engine(&self, engine: &mut EngineState, now_ms: i64) -> TriggerDecision {
        let decision = self.check(&engine.trackers, &mut engine.trigger, now_ms);
        if decision.is_fired() {
            engine.fires += 1;
        }
        decision
    }

    /// Evaluate once.
    ///
    /// Fires when no lifecycle is active, the cooldown has elapsed, both
    /// leader prices are known and the move clears the threshold. A
    /// missing lagger reference skips without consuming the cooldown.
    pub fn check(
        &self,
        trackers: &TrackerSet,
        state: &mut TriggerState,
        now_ms: i64,
    ) -> TriggerDecision {
        if state.is_active() {
            return TriggerDecision::Skipped(SkipReason::Active);
        }
        if state.in_cooldown(now_ms) {
            return TriggerDecision::Skipped(SkipReason::CoolingDown);
        }

        let horizon = self.config.horizon();
        let (current, lagged) = match trackers.get(&self.leader) {
            Some(tracker) => tracker.current_and_lagged_at(horizon, now_ms),
            None => (None, None),
        };
        let (Some(current), Some(lagged)) = (current, lagged) else {
            return TriggerDecision::Skipped(SkipReason::NoLeaderData);
        };

        let delta = current.inner() - lagged.inner();
        if !self.exceeds_threshold(current, lagged) {
            return TriggerDecision::Skipped(SkipReason::BelowThreshold);
        }

        if let Some(max_move) = self.config.max_leader_move {
            if delta > max_move {
                debug!(%delta, %max_move, "Leader move too large, skipping");
                return TriggerDecision::Skipped(SkipReason::MoveTooLarge);
            }
        }

        let reference = trackers
            .get(&self.lagger)
            .and_then(|tracker| tracker.current_and_lagged_at(horizon, now_ms).1);
        let Some(reference_price) = reference else {
            debug!(lagger = %self.lagger.short(), "Lagger reference unavailable, skipping");
            return TriggerDecision::Skipped(SkipReason::NoReference);
        };

        state.fire(now_ms, self.config.cooldown());

        info!(
            leader = %self.leader.short(),
            lagger = %self.lagger.short(),
            %current,
            %lagged,
            %delta,
            reference = %reference_price,
            cooldown_until_ms = state.cooldown_until_ms(),
            "Trigger fired"
        );

        TriggerDecision::Fired(TriggerSignal {
            leader: self.leader.clone(),
            lagger: self.lagger.clone(),
            leader_current: current,
            leader_lagged: lagged,
            delta,
            reference_price,
            fired_at_ms: now_ms,
        })
    }

    fn exceeds_threshold(&self, current: Price, lagged: Price) -> bool {
        match self.config.mode {
            TriggerMode::Absolute => current.inner() - lagged.inner() > self.config.threshold,
            TriggerMode::Percentage => match current.pct_from(lagged) {
                Some(pct) if lagged.inner() > Decimal::ZERO => {
                    pct > self.config.percentage_threshold
                }
                _ => false,
            },
        }
    }
}
