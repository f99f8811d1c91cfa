//! Emergency stop controller (C8): scoped freeze and resume of live
//! transfers.
//!
//! Triggering freezes every in-scope non-terminal transfer and cancels its
//! timer; resuming unfreezes, pushes each pending deadline out by the
//! freeze duration plus a grace period, and re-arms the timers. A frozen
//! transfer accepts no state change except `open_dispute`.

use std::sync::Arc;

use tracing::{info, warn};

use consign_bus::EventBus;
use consign_core::config::EngineConfig;
use consign_core::error::ConsignError;
use consign_core::event::EngineEvent;
use consign_core::principal::Principal;
use consign_core::stop::{EmergencyStop, StopScope, StopStatus};
use consign_core::transfer::{Transfer, TransferState};
use consign_core::types::{StopId, Timestamp, TransferId};
use consign_sched::{Clock, Scheduler, TimerKey};
use consign_store::{Batch, Store};

use crate::machine;
use crate::policy;

pub struct StopController {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    sched: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    cfg: EngineConfig,
}

impl StopController {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        sched: Arc<Scheduler>,
        clock: Arc<dyn Clock>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            store,
            bus,
            sched,
            clock,
            cfg,
        }
    }

    /// Freeze every in-scope non-terminal transfer. Transfers already
    /// frozen by an earlier stop keep their original stop attribution and
    /// are not listed as affected here.
    pub fn trigger(
        &self,
        principal: &Principal,
        reason: String,
        scope: StopScope,
    ) -> Result<EmergencyStop, ConsignError> {
        policy::check_stop_trigger(principal)?;
        if reason.trim().is_empty() {
            return Err(ConsignError::EmptyField { field: "reason" });
        }
        let now = self.clock.now();
        let mut stop = EmergencyStop::new(
            StopId::generate(),
            principal.id.clone(),
            reason,
            scope.clone(),
            now,
        );

        let targets: Vec<Transfer> = match &scope {
            StopScope::All => self.store.live_transfers()?,
            StopScope::Transfers(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    let tx = self
                        .store
                        .transfer(id)?
                        .ok_or_else(|| ConsignError::TransferNotFound(id.clone()))?;
                    out.push(tx);
                }
                out
            }
        };

        let mut batch = Batch::new();
        for stored in targets {
            if stored.state.is_terminal() || stored.frozen {
                continue;
            }
            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;
            machine::apply_freeze(&mut tx, &stop.id, now)?;
            self.sched.cancel(&TimerKey::TransferDeadline(tx.id.clone()));
            stop.affected.push(tx.id.clone());
            batch.put_transfer(tx, expected);
        }
        batch.put_stop(stop.clone(), 0);
        self.store.commit(batch)?;

        self.bus.publish(&EngineEvent::StopTriggered {
            stop_id: stop.id.clone(),
            at: now,
        });
        info!(stop = %stop.id, triggered_by = %principal.id,
              affected = stop.affected.len(), "emergency stop active");
        Ok(stop)
    }

    /// Unfreeze (part of) an active stop. With `scope = None` the whole
    /// stop resumes and closes; a partial scope leaves the stop active for
    /// the still-frozen remainder.
    pub fn resume(
        &self,
        principal: &Principal,
        stop_id: &StopId,
        scope: Option<Vec<TransferId>>,
    ) -> Result<EmergencyStop, ConsignError> {
        policy::check_stop_resume(principal)?;
        let now = self.clock.now();
        let stop_stored = self
            .store
            .stop(stop_id)?
            .ok_or_else(|| ConsignError::StopNotFound(stop_id.clone()))?;
        if !stop_stored.is_active() {
            return Err(ConsignError::StopNotActive(stop_id.clone()));
        }
        let stop_expected = stop_stored.version;
        let mut stop = stop_stored;
        stop.version = stop_expected + 1;

        let in_scope = |id: &TransferId| match &scope {
            None => true,
            Some(ids) => ids.contains(id),
        };

        let mut batch = Batch::new();
        let mut rearm: Vec<(Timestamp, TransferId)> = Vec::new();
        let mut still_frozen = 0usize;
        for id in &stop.affected {
            let Some(stored) = self.store.transfer(id)? else {
                warn!(transfer = %id, "affected transfer vanished");
                continue;
            };
            // Only this stop's freezes are ours to lift.
            if !stored.frozen || stored.emergency_stop_id.as_ref() != Some(&stop.id) {
                continue;
            }
            if !in_scope(id) {
                still_frozen += 1;
                continue;
            }
            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;
            machine::apply_unfreeze(&mut tx, now, self.cfg.resume_grace_secs)?;
            if matches!(
                tx.state,
                TransferState::Initiated | TransferState::SenderConfirmed
            ) {
                rearm.push((tx.timeout_at, tx.id.clone()));
            }
            batch.put_transfer(tx, expected);
        }

        let fully_resumed = still_frozen == 0;
        if fully_resumed {
            stop.status = StopStatus::Resumed;
            stop.resumed_at = Some(now);
        }
        batch.put_stop(stop.clone(), stop_expected);
        self.store.commit(batch)?;

        for (deadline, id) in rearm {
            if let Err(e) = self.sched.register(deadline, TimerKey::TransferDeadline(id)) {
                warn!(error = %e, "could not re-arm timer after resume");
            }
        }
        if fully_resumed {
            self.bus.publish(&EngineEvent::StopResumed {
                stop_id: stop.id.clone(),
                at: now,
            });
        }
        info!(stop = %stop.id, fully_resumed, "emergency stop resumed");
        Ok(stop)
    }

    /// Active stops, for status queries and create-time admission.
    pub fn active(&self) -> Result<Vec<EmergencyStop>, ConsignError> {
        self.store.active_stops()
    }

    pub fn get(&self, stop_id: &StopId) -> Result<EmergencyStop, ConsignError> {
        self.store
            .stop(stop_id)?
            .ok_or_else(|| ConsignError::StopNotFound(stop_id.clone()))
    }
}
