//! The transfer engine: every state change flows through here.
//!
//! Each operation is a versioned read-modify-write: load the entity, apply
//! a pure transition from [`crate::machine`] to a bumped copy, stage the
//! result (plus any trust deltas riding the same unit of work) into a
//! [`Batch`], and commit. A version race surfaces as `Conflict` and is
//! retried a bounded number of times with a fresh read; whoever lost simply
//! re-evaluates against the new state. Events publish only after the
//! commit, so subscribers never observe a state that did not become
//! durable.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use consign_bus::EventBus;
use consign_core::compensation::{Compensation, CompensationKind, CompensationStatus};
use consign_core::config::EngineConfig;
use consign_core::dispute::{
    Decision, Dispute, DisputeStatus, DisputeType, EvidenceEntry, EvidenceKind, RequiredAction,
    Resolution,
};
use consign_core::error::ConsignError;
use consign_core::event::EngineEvent;
use consign_core::principal::Principal;
use consign_core::transfer::{Attestation, ItemType, Transfer, TransferState, MAX_NOTE_BYTES};
use consign_core::trust::TrustCause;
use consign_core::types::{
    CompensationId, ContentRef, DisputeId, EvidenceId, ParticipantId, Timestamp, TransferId, Value,
};
use consign_dispute::rules;
use consign_sched::{Clock, Scheduler, TimerKey};
use consign_store::{Batch, Store};
use consign_trust::TrustBook;

use crate::machine;
use crate::policy;

// ── Requests ─────────────────────────────────────────────────────────────────

/// Input for `create`; the sender is the authenticated principal.
#[derive(Clone, Debug)]
pub struct NewTransfer {
    pub receiver: ParticipantId,
    pub item_id: String,
    pub item_type: ItemType,
    pub quantity: f64,
    pub value: Value,
    pub metadata: BTreeMap<String, String>,
}

/// One evidence submission, before the engine assigns id and attribution.
#[derive(Clone, Debug)]
pub struct EvidenceInput {
    pub kind: EvidenceKind,
    pub description: String,
    pub file_refs: Vec<ContentRef>,
}

// ── TransferEngine ───────────────────────────────────────────────────────────

pub struct TransferEngine {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    sched: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
    cfg: EngineConfig,
}

impl TransferEngine {
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

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Retry harness ────────────────────────────────────────────────────────

    /// Run `op`, re-running it with a fresh read on every version conflict,
    /// up to the configured bound.
    fn with_retry<T>(
        &self,
        mut op: impl FnMut() -> Result<T, ConsignError>,
    ) -> Result<T, ConsignError> {
        let mut attempts = 0u32;
        loop {
            match op() {
                Err(e) if e.is_conflict() => {
                    attempts += 1;
                    if attempts > self.cfg.conflict_retry_max {
                        return Err(ConsignError::RetriesExhausted { attempts });
                    }
                    debug!(attempts, "version race; retrying");
                }
                other => return other,
            }
        }
    }

    fn publish_all(&self, events: &[EngineEvent]) {
        for event in events {
            self.bus.publish(event);
        }
    }

    /// Timer arming is advisory once the write is durable: the startup
    /// rehydration scan replays anything a dying scheduler dropped.
    fn arm(&self, deadline: Timestamp, key: TimerKey) {
        if let Err(e) = self.sched.register(deadline, key) {
            warn!(error = %e, "could not arm timer; relying on rehydration");
        }
    }

    fn check_admission(&self) -> Result<(), ConsignError> {
        for stop in self.store.active_stops()? {
            if stop.is_global() {
                return Err(ConsignError::GlobalStop(stop.id));
            }
        }
        Ok(())
    }

    // ── Create ───────────────────────────────────────────────────────────────

    pub fn create(
        &self,
        principal: &Principal,
        req: NewTransfer,
    ) -> Result<Transfer, ConsignError> {
        let sender = principal.id.clone();
        if sender == req.receiver {
            return Err(ConsignError::SelfTransfer);
        }
        if !(req.quantity > 0.0) {
            return Err(ConsignError::NonPositiveQuantity { got: req.quantity });
        }
        if req.item_id.is_empty() {
            return Err(ConsignError::EmptyField { field: "item_id" });
        }
        self.check_admission()?;

        // The trust stages can race with concurrent validations, so the
        // whole unit of work sits inside the retry harness.
        self.with_retry(|| {
            let req = req.clone();
            let now = self.clock.now();
            let sender_trust = self.store.trust(&sender)?;
            let receiver_trust = self.store.trust(&req.receiver)?;
            let auto = policy::auto_approval_eligible(
                &self.cfg,
                sender_trust.as_ref(),
                receiver_trust.as_ref(),
                req.value,
            );
            let deadline = policy::initial_deadline(&self.cfg, sender_trust.as_ref(), now);

            let mut tx = Transfer::new(
                TransferId::generate(),
                sender.clone(),
                req.receiver,
                req.item_id,
                req.item_type,
                req.quantity,
                req.value,
                req.metadata,
                now,
                deadline,
            );

            let mut batch = Batch::new();
            let mut events = Vec::new();
            if auto {
                tx.state = TransferState::Validated;
                tx.auto_approved = true;
                tx.terminal_at = Some(now);
                let mut book = TrustBook::new(self.cfg.trust_history_cap);
                book.record(&*self.store, &tx.sender, TrustCause::TransferValidated, tx.value, now)?;
                book.record(
                    &*self.store,
                    &tx.receiver,
                    TrustCause::TransferValidated,
                    tx.value,
                    now,
                )?;
                events.push(EngineEvent::TransferValidated {
                    transfer_id: tx.id.clone(),
                    sender: tx.sender.clone(),
                    receiver: tx.receiver.clone(),
                    value: tx.value,
                    auto_approved: true,
                    at: now,
                });
                events.extend(book.stage(&mut batch));
            }
            batch.put_transfer(tx.clone(), 0);
            self.store.commit(batch)?;

            if !auto {
                self.arm(deadline, TimerKey::TransferDeadline(tx.id.clone()));
            }
            self.publish_all(&events);
            info!(transfer = %tx.id, sender = %tx.sender, receiver = %tx.receiver,
                  auto_approved = auto, "transfer created");
            Ok(tx)
        })
    }

    // ── Attestations ─────────────────────────────────────────────────────────

    fn check_attestation(attestation: &Attestation) -> Result<(), ConsignError> {
        if let Some(note) = &attestation.note {
            if note.len() > MAX_NOTE_BYTES {
                return Err(ConsignError::NoteTooLong {
                    max: MAX_NOTE_BYTES,
                });
            }
        }
        Ok(())
    }

    pub fn confirm_sent(
        &self,
        principal: &Principal,
        id: &TransferId,
        attestation: Attestation,
    ) -> Result<(), ConsignError> {
        Self::check_attestation(&attestation)?;
        self.with_retry(|| {
            let now = self.clock.now();
            let stored = self
                .store
                .transfer(id)?
                .ok_or_else(|| ConsignError::TransferNotFound(id.clone()))?;
            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;

            let receive_deadline = now + self.cfg.t_receive_secs;
            machine::apply_sender_confirm(
                &mut tx,
                &principal.id,
                attestation.clone(),
                now,
                receive_deadline,
            )?;

            let mut batch = Batch::new();
            batch.put_transfer(tx, expected);
            self.store.commit(batch)?;

            self.arm(receive_deadline, TimerKey::TransferDeadline(id.clone()));
            info!(transfer = %id, "sender confirmed dispatch");
            Ok(())
        })
    }

    pub fn confirm_received(
        &self,
        principal: &Principal,
        id: &TransferId,
        attestation: Attestation,
    ) -> Result<(), ConsignError> {
        Self::check_attestation(&attestation)?;
        self.with_retry(|| {
            let now = self.clock.now();
            let stored = self
                .store
                .transfer(id)?
                .ok_or_else(|| ConsignError::TransferNotFound(id.clone()))?;
            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;

            machine::apply_receiver_confirm(&mut tx, &principal.id, attestation.clone(), now)?;

            let mut batch = Batch::new();
            let mut book = TrustBook::new(self.cfg.trust_history_cap);
            book.record(&*self.store, &tx.sender, TrustCause::TransferValidated, tx.value, now)?;
            book.record(
                &*self.store,
                &tx.receiver,
                TrustCause::TransferValidated,
                tx.value,
                now,
            )?;
            let mut events = vec![EngineEvent::TransferValidated {
                transfer_id: tx.id.clone(),
                sender: tx.sender.clone(),
                receiver: tx.receiver.clone(),
                value: tx.value,
                auto_approved: false,
                at: now,
            }];

            // A validated follow-up closes out its parent in the same unit
            // of work.
            if let Some(parent_id) = tx.parent_id.clone() {
                self.stage_compensation_completion(
                    &mut batch,
                    &mut book,
                    &mut events,
                    &parent_id,
                    now,
                )?;
            }

            events.extend(book.stage(&mut batch));
            batch.put_transfer(tx, expected);
            self.store.commit(batch)?;

            self.sched.cancel(&TimerKey::TransferDeadline(id.clone()));
            self.publish_all(&events);
            info!(transfer = %id, "receiver confirmed; transfer validated");
            Ok(())
        })
    }

    /// COMPENSATING parent → RESOLVED, compensation record → Completed,
    /// dispute's `action_completed` set, partial trust recovery applied.
    fn stage_compensation_completion(
        &self,
        batch: &mut Batch,
        book: &mut TrustBook,
        events: &mut Vec<EngineEvent>,
        parent_id: &TransferId,
        now: Timestamp,
    ) -> Result<(), ConsignError> {
        let Some(parent_stored) = self.store.transfer(parent_id)? else {
            warn!(parent = %parent_id, "follow-up validated but parent is missing");
            return Ok(());
        };
        if parent_stored.state != TransferState::Compensating {
            // Already closed (e.g. remedy rejected after the follow-up was
            // created, or a replayed confirmation). Nothing to do.
            return Ok(());
        }
        let parent_expected = parent_stored.version;
        let mut parent = parent_stored;
        parent.version = parent_expected + 1;
        machine::apply_compensation_closed(&mut parent, now)?;

        if let Some(comp_stored) = self.store.compensation_for_parent(parent_id)? {
            let comp_expected = comp_stored.version;
            let mut comp = comp_stored;
            comp.version = comp_expected + 1;
            comp.status = CompensationStatus::Completed;
            events.push(EngineEvent::CompensationCompleted {
                compensation_id: comp.id.clone(),
                parent_id: parent_id.clone(),
                at_fault: parent.sender.clone(),
                at: now,
            });
            book.record(
                &*self.store,
                &parent.sender,
                TrustCause::CompensationCompleted,
                0,
                now,
            )?;
            batch.put_compensation(comp, comp_expected);
        }

        if let Some(dispute_id) = parent.dispute_id.clone() {
            if let Some(dispute_stored) = self.store.dispute(&dispute_id)? {
                let dispute_expected = dispute_stored.version;
                let mut dispute = dispute_stored;
                dispute.version = dispute_expected + 1;
                if let Some(resolution) = dispute.resolution.as_mut() {
                    resolution.action_completed = true;
                }
                batch.put_dispute(dispute, dispute_expected);
            }
        }

        batch.put_transfer(parent, parent_expected);
        Ok(())
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
        if reason.trim().is_empty() {
            return Err(ConsignError::EmptyDisputeReason);
        }
        self.with_retry(|| {
            let now = self.clock.now();
            let stored = self
                .store
                .transfer(transfer_id)?
                .ok_or_else(|| ConsignError::TransferNotFound(transfer_id.clone()))?;
            let respondent = rules::respondent_for(&stored, &principal.id)?;
            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;

            let dispute_id = DisputeId::generate();
            machine::apply_open_dispute(&mut tx, dispute_id.clone(), now, self.cfg.w_dispute_secs)?;

            let evidence_deadline = now + self.cfg.t_evidence_secs;
            let mut dispute = Dispute::new(
                dispute_id.clone(),
                transfer_id.clone(),
                principal.id.clone(),
                respondent,
                dispute_type,
                reason.clone(),
                now,
                evidence_deadline,
            );
            for input in &evidence {
                dispute.evidence.push(EvidenceEntry {
                    id: EvidenceId::generate(now),
                    submitted_by: principal.id.clone(),
                    timestamp: now,
                    kind: input.kind,
                    description: input.description.clone(),
                    file_refs: input.file_refs.clone(),
                });
            }

            let mut batch = Batch::new();
            let mut book = TrustBook::new(self.cfg.trust_history_cap);
            book.record(&*self.store, &principal.id, TrustCause::DisputeOpened, 0, now)?;
            let mut events = vec![EngineEvent::DisputeOpened {
                dispute_id: dispute_id.clone(),
                transfer_id: transfer_id.clone(),
                initiator: principal.id.clone(),
                at: now,
            }];
            events.extend(book.stage(&mut batch));
            batch.put_dispute(dispute.clone(), 0);
            batch.put_transfer(tx, expected);
            self.store.commit(batch)?;

            self.sched
                .cancel(&TimerKey::TransferDeadline(transfer_id.clone()));
            self.arm(evidence_deadline, TimerKey::EvidenceDeadline(dispute_id));
            self.publish_all(&events);
            info!(transfer = %transfer_id, dispute = %dispute.id,
                  dispute_type = dispute_type.as_str(), "dispute opened");
            Ok(dispute)
        })
    }

    pub fn add_evidence(
        &self,
        principal: &Principal,
        dispute_id: &DisputeId,
        input: EvidenceInput,
    ) -> Result<EvidenceId, ConsignError> {
        if input.description.is_empty() {
            return Err(ConsignError::EmptyField {
                field: "description",
            });
        }
        self.with_retry(|| {
            let now = self.clock.now();
            let stored = self
                .store
                .dispute(dispute_id)?
                .ok_or_else(|| ConsignError::DisputeNotFound(dispute_id.clone()))?;
            if stored.status.is_closed() {
                return Err(ConsignError::DisputeClosed(dispute_id.clone()));
            }
            rules::check_evidence_submitter(&stored, principal)?;

            let expected = stored.version;
            let mut dispute = stored;
            dispute.version = expected + 1;
            let evidence_id = EvidenceId::generate(now);
            dispute.evidence.push(EvidenceEntry {
                id: evidence_id.clone(),
                submitted_by: principal.id.clone(),
                timestamp: now,
                kind: input.kind,
                description: input.description.clone(),
                file_refs: input.file_refs.clone(),
            });
            // The first arbitrator touch moves the case under review.
            if dispute.status == DisputeStatus::Open && principal.role.can_arbitrate() {
                dispute.status = DisputeStatus::Investigating;
            }

            let mut batch = Batch::new();
            batch.put_dispute(dispute, expected);
            self.store.commit(batch)?;
            debug!(dispute = %dispute_id, evidence = %evidence_id, "evidence appended");
            Ok(evidence_id)
        })
    }

    // ── Resolution ───────────────────────────────────────────────────────────

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
        if required_action != RequiredAction::None && decision != Decision::InFavorReceiver {
            return Err(ConsignError::ActionRequiresReceiverFavor);
        }
        self.with_retry(|| {
            let now = self.clock.now();
            let dispute_stored = self
                .store
                .dispute(dispute_id)?
                .ok_or_else(|| ConsignError::DisputeNotFound(dispute_id.clone()))?;
            if dispute_stored.resolution.is_some() {
                return Err(ConsignError::ResolutionAlreadyRecorded(dispute_id.clone()));
            }
            let tx_stored = self
                .store
                .transfer(&dispute_stored.transfer_id)?
                .ok_or_else(|| ConsignError::TransferNotFound(dispute_stored.transfer_id.clone()))?;
            policy::check_arbitrator(arbitrator, &tx_stored)?;
            if required_action != RequiredAction::None {
                rules::check_action(dispute_stored.dispute_type, required_action)?;
            }

            let dispute_expected = dispute_stored.version;
            let mut dispute = dispute_stored;
            dispute.version = dispute_expected + 1;
            let tx_expected = tx_stored.version;
            let mut tx = tx_stored;
            tx.version = tx_expected + 1;

            let target = machine::apply_resolution(&mut tx, decision, required_action, now)?;

            let mut batch = Batch::new();
            let mut book = TrustBook::new(self.cfg.trust_history_cap);
            let mut events = vec![EngineEvent::DisputeResolved {
                dispute_id: dispute_id.clone(),
                transfer_id: tx.id.clone(),
                decision,
                at: now,
            }];
            let mut follow_up_timer: Option<(Timestamp, TransferId)> = None;

            match decision {
                Decision::InFavorSender => {
                    book.record(&*self.store, &tx.receiver, TrustCause::DisputeLost, 0, now)?;
                }
                Decision::InFavorReceiver => {
                    book.record(&*self.store, &tx.sender, TrustCause::DisputeLost, 0, now)?;
                }
                Decision::Split => {
                    book.record(&*self.store, &tx.sender, TrustCause::DisputeSplit, 0, now)?;
                    book.record(&*self.store, &tx.receiver, TrustCause::DisputeSplit, 0, now)?;
                }
                Decision::NoFault => {
                    book.record(
                        &*self.store,
                        &dispute.initiator,
                        TrustCause::DisputeNoFault,
                        0,
                        now,
                    )?;
                }
                Decision::Escalate => {}
            }

            if decision == Decision::Escalate {
                // No resolution record: the external authority's decision
                // re-enters later and gets the single write.
                dispute.status = DisputeStatus::Escalated;
            } else {
                dispute.status = DisputeStatus::Resolved;
                dispute.resolution = Some(Resolution {
                    decision,
                    required_action,
                    compensation_amount,
                    resolved_by: arbitrator.id.clone(),
                    resolved_at: now,
                    notes: notes.clone(),
                    follow_up_id: None,
                    action_completed: false,
                });

                if target == TransferState::Compensating {
                    let kind = CompensationKind::from_action(required_action)
                        .expect("compensating implies a concrete action");
                    let mut comp = Compensation::new(
                        CompensationId::generate(),
                        tx.id.clone(),
                        dispute.id.clone(),
                        kind,
                        compensation_amount,
                        now,
                    );
                    if comp.status == CompensationStatus::Approved {
                        // No approval gate: create the follow-up right away.
                        let follow_up = self.build_follow_up(&tx, kind, now);
                        comp.follow_up_id = Some(follow_up.id.clone());
                        comp.status = CompensationStatus::InProgress;
                        if let Some(resolution) = dispute.resolution.as_mut() {
                            resolution.follow_up_id = Some(follow_up.id.clone());
                        }
                        follow_up_timer = Some((follow_up.timeout_at, follow_up.id.clone()));
                        batch.put_transfer(follow_up, 0);
                    }
                    batch.put_compensation(comp, 0);
                }
            }

            events.extend(book.stage(&mut batch));
            batch.put_dispute(dispute.clone(), dispute_expected);
            batch.put_transfer(tx.clone(), tx_expected);
            self.store.commit(batch)?;

            self.sched
                .cancel(&TimerKey::EvidenceDeadline(dispute_id.clone()));
            if let Some((deadline, follow_up_id)) = follow_up_timer {
                self.arm(deadline, TimerKey::TransferDeadline(follow_up_id));
            }
            self.publish_all(&events);
            info!(dispute = %dispute_id, transfer = %tx.id,
                  decision = decision.as_str(), outcome = target.as_str(), "dispute decided");
            Ok(dispute)
        })
    }

    /// The remedial transfer: reversed direction for returns, halved
    /// quantity for partial resends, parent linked. It runs the normal
    /// two-check machine.
    fn build_follow_up(
        &self,
        parent: &Transfer,
        kind: CompensationKind,
        now: Timestamp,
    ) -> Transfer {
        let (sender, receiver) = if kind.reverses_direction() {
            (parent.receiver.clone(), parent.sender.clone())
        } else {
            (parent.sender.clone(), parent.receiver.clone())
        };
        let quantity = if kind == CompensationKind::ResendPartial {
            parent.quantity / 2.0
        } else {
            parent.quantity
        };
        let mut metadata = parent.metadata.clone();
        metadata.insert("remedy".into(), kind.as_str().into());

        let mut follow_up = Transfer::new(
            TransferId::generate(),
            sender,
            receiver,
            parent.item_id.clone(),
            parent.item_type,
            quantity,
            parent.value,
            metadata,
            now,
            now + self.cfg.t_initial_secs,
        );
        follow_up.parent_id = Some(parent.id.clone());
        follow_up
    }

    // ── Compensation approval ────────────────────────────────────────────────

    pub fn approve_compensation(
        &self,
        principal: &Principal,
        parent_id: &TransferId,
    ) -> Result<TransferId, ConsignError> {
        self.with_retry(|| {
            let now = self.clock.now();
            let parent = self
                .store
                .transfer(parent_id)?
                .ok_or_else(|| ConsignError::TransferNotFound(parent_id.clone()))?;
            policy::check_compensation_approver(principal, &parent)?;

            let comp_stored = self
                .store
                .compensation_for_parent(parent_id)?
                .ok_or_else(|| ConsignError::CompensationNotFound(parent_id.clone()))?;
            if comp_stored.status != CompensationStatus::PendingApproval {
                return Err(ConsignError::CompensationNotPending(parent_id.clone()));
            }
            let comp_expected = comp_stored.version;
            let mut comp = comp_stored;
            comp.version = comp_expected + 1;
            comp.status = CompensationStatus::InProgress;
            comp.approver = Some(principal.id.clone());

            let follow_up = self.build_follow_up(&parent, comp.kind, now);
            comp.follow_up_id = Some(follow_up.id.clone());

            let mut batch = Batch::new();
            if let Some(dispute_stored) = self.store.dispute(&comp.dispute_id)? {
                let dispute_expected = dispute_stored.version;
                let mut dispute = dispute_stored;
                dispute.version = dispute_expected + 1;
                if let Some(resolution) = dispute.resolution.as_mut() {
                    resolution.follow_up_id = Some(follow_up.id.clone());
                }
                batch.put_dispute(dispute, dispute_expected);
            }
            let follow_up_id = follow_up.id.clone();
            let follow_up_deadline = follow_up.timeout_at;
            batch.put_compensation(comp, comp_expected);
            batch.put_transfer(follow_up, 0);
            self.store.commit(batch)?;

            self.arm(
                follow_up_deadline,
                TimerKey::TransferDeadline(follow_up_id.clone()),
            );
            info!(parent = %parent_id, follow_up = %follow_up_id, approver = %principal.id,
                  "compensation approved");
            Ok(follow_up_id)
        })
    }

    pub fn reject_compensation(
        &self,
        principal: &Principal,
        parent_id: &TransferId,
        reason: String,
    ) -> Result<(), ConsignError> {
        self.with_retry(|| {
            let now = self.clock.now();
            let parent_stored = self
                .store
                .transfer(parent_id)?
                .ok_or_else(|| ConsignError::TransferNotFound(parent_id.clone()))?;
            policy::check_compensation_approver(principal, &parent_stored)?;

            let comp_stored = self
                .store
                .compensation_for_parent(parent_id)?
                .ok_or_else(|| ConsignError::CompensationNotFound(parent_id.clone()))?;
            if comp_stored.status != CompensationStatus::PendingApproval {
                return Err(ConsignError::CompensationNotPending(parent_id.clone()));
            }
            let comp_expected = comp_stored.version;
            let mut comp = comp_stored;
            comp.version = comp_expected + 1;
            comp.status = CompensationStatus::Rejected;
            comp.approver = Some(principal.id.clone());

            let parent_expected = parent_stored.version;
            let mut parent = parent_stored;
            parent.version = parent_expected + 1;
            machine::apply_compensation_closed(&mut parent, now)?;

            let mut batch = Batch::new();
            batch.put_compensation(comp, comp_expected);
            batch.put_transfer(parent, parent_expected);
            self.store.commit(batch)?;
            info!(parent = %parent_id, approver = %principal.id, reason = %reason,
                  "compensation rejected; parent resolved without remedy");
            Ok(())
        })
    }

    // ── Timer handling ───────────────────────────────────────────────────────

    /// Entry point for fired timers. Idempotent: a replayed firing
    /// re-reads state and no-ops when the deadline no longer applies.
    pub fn handle_timer(&self, key: &TimerKey) -> Result<(), ConsignError> {
        match key {
            TimerKey::TransferDeadline(id) => self.handle_transfer_deadline(id),
            TimerKey::EvidenceDeadline(id) => self.handle_evidence_deadline(id),
        }
    }

    fn handle_transfer_deadline(&self, id: &TransferId) -> Result<(), ConsignError> {
        self.with_retry(|| {
            let now = self.clock.now();
            let Some(stored) = self.store.transfer(id)? else {
                return Ok(());
            };
            if !matches!(
                stored.state,
                TransferState::Initiated | TransferState::SenderConfirmed
            ) {
                return Ok(()); // confirmation or dispute won the race
            }
            if stored.frozen {
                // Deferred: resume re-arms with the extended deadline.
                return Ok(());
            }
            if stored.timeout_at > now {
                // Deadline moved (reduced-hold re-read or resume grace).
                self.arm(stored.timeout_at, TimerKey::TransferDeadline(id.clone()));
                return Ok(());
            }

            let expected = stored.version;
            let mut tx = stored;
            tx.version = expected + 1;
            let attributed = machine::apply_timeout(&mut tx, now)?;

            let mut batch = Batch::new();
            let mut book = TrustBook::new(self.cfg.trust_history_cap);
            book.record(&*self.store, &attributed, TrustCause::TransferTimeout, 0, now)?;
            let mut events = vec![EngineEvent::TransferTimeout {
                transfer_id: id.clone(),
                attributed_to: attributed.clone(),
                at: now,
            }];
            events.extend(book.stage(&mut batch));
            batch.put_transfer(tx, expected);
            self.store.commit(batch)?;

            self.publish_all(&events);
            info!(transfer = %id, attributed = %attributed, "confirmation deadline elapsed");
            Ok(())
        })
    }

    fn handle_evidence_deadline(&self, id: &DisputeId) -> Result<(), ConsignError> {
        self.with_retry(|| {
            let now = self.clock.now();
            let Some(stored) = self.store.dispute(id)? else {
                return Ok(());
            };
            if !matches!(
                stored.status,
                DisputeStatus::Open | DisputeStatus::Investigating
            ) {
                return Ok(());
            }
            if stored.evidence_deadline > now {
                self.arm(stored.evidence_deadline, TimerKey::EvidenceDeadline(id.clone()));
                return Ok(());
            }
            if stored.initiator_supplied_evidence() {
                return Ok(());
            }

            let dispute_expected = stored.version;
            let mut dispute = stored;
            dispute.version = dispute_expected + 1;
            dispute.status = DisputeStatus::Escalated;

            let mut batch = Batch::new();
            if let Some(tx_stored) = self.store.transfer(&dispute.transfer_id)? {
                if tx_stored.state == TransferState::Disputed {
                    let tx_expected = tx_stored.version;
                    let mut tx = tx_stored;
                    tx.version = tx_expected + 1;
                    machine::apply_resolution(&mut tx, Decision::Escalate, RequiredAction::None, now)?;
                    batch.put_transfer(tx, tx_expected);
                }
            }
            batch.put_dispute(dispute, dispute_expected);
            self.store.commit(batch)?;
            warn!(dispute = %id, "initiator supplied no evidence in time; escalated");
            Ok(())
        })
    }

    // ── Recovery ─────────────────────────────────────────────────────────────

    /// Re-arm timers from persisted deadlines after a restart. Deadlines
    /// already in the past fire on the scheduler's first drain.
    pub fn rehydrate(&self) -> Result<usize, ConsignError> {
        let mut armed = 0usize;
        for tx in self.store.live_transfers()? {
            if !tx.frozen
                && matches!(
                    tx.state,
                    TransferState::Initiated | TransferState::SenderConfirmed
                )
            {
                self.sched
                    .register(tx.timeout_at, TimerKey::TransferDeadline(tx.id.clone()))?;
                armed += 1;
            }
        }
        for dispute in self.store.open_disputes()? {
            self.sched.register(
                dispute.evidence_deadline,
                TimerKey::EvidenceDeadline(dispute.id.clone()),
            )?;
            armed += 1;
        }
        info!(armed, "scheduler rehydrated from persisted deadlines");
        Ok(armed)
    }
}
