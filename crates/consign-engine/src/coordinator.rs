//! Consensus coordinator (C10): the façade every external request goes
//! through. Policy checks run here once, work is routed to the engine or
//! the stop controller, and read queries go to the query layers. Typed
//! errors pass through untouched; the transport maps their kinds.

use std::sync::Arc;

use tracing::warn;

use consign_core::compensation::Compensation;
use consign_core::dispute::{Decision, Dispute, DisputeType, RequiredAction};
use consign_core::error::{ConsignError, ErrorKind};
use consign_core::principal::Principal;
use consign_core::stop::{EmergencyStop, StopScope};
use consign_core::transfer::{Attestation, Transfer};
use consign_core::trust::{ParticipantTrust, TrustDelta};
use consign_core::types::{
    DisputeId, EvidenceId, ParticipantId, StopId, Timestamp, TransferId, Value,
};
use consign_dispute::DisputeQuery;
use consign_sched::TimerKey;
use consign_store::Store;
use consign_trust::TrustQuery;

use crate::engine::{EvidenceInput, NewTransfer, TransferEngine};
use crate::policy;
use crate::stop::StopController;

/// Largest accepted batch request.
pub const MAX_BATCH: usize = 100;

/// One failed item of a batch request.
#[derive(Clone, Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of a batch request: successes and failures reported per item,
/// never all-or-nothing.
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub created: Vec<TransferId>,
    pub failures: Vec<BatchFailure>,
}

pub struct Coordinator {
    engine: TransferEngine,
    stops: StopController,
}

impl Coordinator {
    pub fn new(engine: TransferEngine, stops: StopController) -> Self {
        Self { engine, stops }
    }

    fn store(&self) -> &Arc<dyn Store> {
        self.engine.store()
    }

    // ── Transfers ────────────────────────────────────────────────────────────

    pub fn create_transfer(
        &self,
        principal: &Principal,
        req: NewTransfer,
    ) -> Result<Transfer, ConsignError> {
        self.engine.create(principal, req)
    }

    /// Batch creation, gated on the batch-operations benefit. Items fail
    /// independently; a caller deadline budget (seconds from now) marks the
    /// unprocessed remainder as timed out rather than silently dropping it.
    pub fn create_batch(
        &self,
        principal: &Principal,
        requests: Vec<NewTransfer>,
        deadline_secs: Option<i64>,
    ) -> Result<BatchReport, ConsignError> {
        let sender_trust = self.store().trust(&principal.id)?;
        policy::check_batch_allowed(sender_trust.as_ref())?;
        if requests.len() > MAX_BATCH {
            return Err(ConsignError::BatchTooLarge { max: MAX_BATCH });
        }

        let deadline: Option<Timestamp> = deadline_secs.map(|d| self.engine.clock().now() + d);
        let mut report = BatchReport::default();
        for (index, req) in requests.into_iter().enumerate() {
            if let Some(d) = deadline {
                if self.engine.clock().now() > d {
                    warn!(index, "batch deadline elapsed; remainder not processed");
                    report.failures.push(BatchFailure {
                        index,
                        kind: ErrorKind::Timeout,
                        reason: ConsignError::DeadlineElapsed.to_string(),
                    });
                    continue;
                }
            }
            match self.engine.create(principal, req) {
                Ok(tx) => report.created.push(tx.id),
                Err(e) => report.failures.push(BatchFailure {
                    index,
                    kind: e.kind(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    pub fn confirm_sent(
        &self,
        principal: &Principal,
        id: &TransferId,
        attestation: Attestation,
    ) -> Result<(), ConsignError> {
        self.engine.confirm_sent(principal, id, attestation)
    }

    pub fn confirm_received(
        &self,
        principal: &Principal,
        id: &TransferId,
        attestation: Attestation,
    ) -> Result<(), ConsignError> {
        self.engine.confirm_received(principal, id, attestation)
    }

    pub fn get_transfer(&self, id: &TransferId) -> Result<Transfer, ConsignError> {
        self.store()
            .transfer(id)?
            .ok_or_else(|| ConsignError::TransferNotFound(id.clone()))
    }

    pub fn transfers_for_participant(
        &self,
        p: &ParticipantId,
    ) -> Result<Vec<Transfer>, ConsignError> {
        let mut transfers = self.store().transfers_for_participant(p)?;
        transfers.sort_by_key(|t| std::cmp::Reverse(t.created));
        Ok(transfers)
    }

    // ── Disputes ─────────────────────────────────────────────────────────────

    pub fn open_dispute(
        &self,
        principal: &Principal,
        transfer_id: &TransferId,
        dispute_type: DisputeType,
        reason: String,
        evidence: Vec<EvidenceInput>,
    ) -> Result<Dispute, ConsignError> {
        self.engine
            .open_dispute(principal, transfer_id, dispute_type, reason, evidence)
    }

    pub fn add_evidence(
        &self,
        principal: &Principal,
        dispute_id: &DisputeId,
        input: EvidenceInput,
    ) -> Result<EvidenceId, ConsignError> {
        self.engine.add_evidence(principal, dispute_id, input)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn resolve_dispute(
        &self,
        arbitrator: &Principal,
        dispute_id: &DisputeId,
        decision: Decision,
        required_action: RequiredAction,
        compensation_amount: Value,
        notes: String,
    ) -> Result<Dispute, ConsignError> {
        self.engine.resolve_dispute(
            arbitrator,
            dispute_id,
            decision,
            required_action,
            compensation_amount,
            notes,
        )
    }

    pub fn get_dispute(&self, id: &DisputeId) -> Result<Dispute, ConsignError> {
        DisputeQuery::new(&**self.store()).get(id)
    }

    pub fn disputes_for_transfer(&self, id: &TransferId) -> Result<Vec<Dispute>, ConsignError> {
        DisputeQuery::new(&**self.store()).for_transfer(id)
    }

    // ── Compensation ─────────────────────────────────────────────────────────

    pub fn approve_compensation(
        &self,
        principal: &Principal,
        parent_id: &TransferId,
    ) -> Result<TransferId, ConsignError> {
        self.engine.approve_compensation(principal, parent_id)
    }

    pub fn reject_compensation(
        &self,
        principal: &Principal,
        parent_id: &TransferId,
        reason: String,
    ) -> Result<(), ConsignError> {
        self.engine.reject_compensation(principal, parent_id, reason)
    }

    /// The compensation record tracking a transfer's remedy, if any.
    pub fn compensation_for_transfer(
        &self,
        parent_id: &TransferId,
    ) -> Result<Compensation, ConsignError> {
        self.store()
            .compensation_for_parent(parent_id)?
            .ok_or_else(|| ConsignError::CompensationNotFound(parent_id.clone()))
    }

    // ── Trust ────────────────────────────────────────────────────────────────

    pub fn get_trust(&self, p: &ParticipantId) -> Result<ParticipantTrust, ConsignError> {
        TrustQuery::new(&**self.store()).get(p)
    }

    pub fn trust_history(
        &self,
        p: &ParticipantId,
        limit: usize,
    ) -> Result<Vec<TrustDelta>, ConsignError> {
        TrustQuery::new(&**self.store()).history(p, limit)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantTrust>, ConsignError> {
        TrustQuery::new(&**self.store()).leaderboard(limit)
    }

    // ── Emergency stop ───────────────────────────────────────────────────────

    pub fn trigger_stop(
        &self,
        principal: &Principal,
        reason: String,
        scope: StopScope,
    ) -> Result<EmergencyStop, ConsignError> {
        self.stops.trigger(principal, reason, scope)
    }

    pub fn resume_stop(
        &self,
        principal: &Principal,
        stop_id: &StopId,
        scope: Option<Vec<TransferId>>,
    ) -> Result<EmergencyStop, ConsignError> {
        self.stops.resume(principal, stop_id, scope)
    }

    pub fn emergency_status(&self) -> Result<Vec<EmergencyStop>, ConsignError> {
        self.stops.active()
    }

    pub fn get_stop(&self, id: &StopId) -> Result<EmergencyStop, ConsignError> {
        self.stops.get(id)
    }

    // ── Timers / recovery ────────────────────────────────────────────────────

    pub fn handle_timer(&self, key: &TimerKey) -> Result<(), ConsignError> {
        self.engine.handle_timer(key)
    }

    pub fn rehydrate(&self) -> Result<usize, ConsignError> {
        self.engine.rehydrate()
    }
}
