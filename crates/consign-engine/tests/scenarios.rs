//! End-to-end scenarios against the in-memory store and a manual clock.
//!
//! Each test drives the coordinator exactly like a transport would and
//! asserts on stored state, trust arithmetic, and published events.

use std::collections::BTreeMap;
use std::sync::Arc;

use consign_bus::{EventBus, QueuePolicy, Subscription};
use consign_core::config::EngineConfig;
use consign_core::dispute::{Decision, DisputeStatus, DisputeType, EvidenceKind, RequiredAction};
use consign_core::error::ConsignError;
use consign_core::event::{topic, EngineEvent};
use consign_core::principal::{Principal, Role};
use consign_core::stop::StopScope;
use consign_core::transfer::{Attestation, ItemType, TransferState};
use consign_core::trust::{ParticipantTrust, Tier};
use consign_core::types::ParticipantId;
use consign_engine::{Coordinator, EvidenceInput, NewTransfer, StopController, TransferEngine};
use consign_sched::{Clock, ManualClock, Scheduler, TimerKey};
use consign_store::{Batch, MemStore, Store};

const T0: i64 = 1_700_000_000;
const HOUR: i64 = 3_600;

struct Harness {
    store: Arc<dyn Store>,
    clock: Arc<ManualClock>,
    events: Subscription,
    coord: Coordinator,
}

fn harness() -> Harness {
    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let bus = Arc::new(EventBus::new());
    let (sched, _fired) = Scheduler::new();
    let events = bus.subscribe("scenario", topic::ALL, QueuePolicy::Unbounded);
    let cfg = EngineConfig::default();

    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let engine = TransferEngine::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&sched),
        Arc::clone(&clock_dyn),
        cfg.clone(),
    );
    let stops = StopController::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        sched,
        clock_dyn,
        cfg,
    );
    Harness {
        store,
        clock,
        events,
        coord: Coordinator::new(engine, stops),
    }
}

fn alice() -> Principal {
    Principal::new("alice", Role::Participant)
}

fn bob() -> Principal {
    Principal::new("bob", Role::Participant)
}

fn arbitrator() -> Principal {
    Principal::new("carol", Role::Admin)
}

fn request(receiver: &str, value: u64) -> NewTransfer {
    NewTransfer {
        receiver: ParticipantId::new(receiver),
        item_id: "sku-1042".into(),
        item_type: ItemType::Product,
        quantity: 10.0,
        value,
        metadata: BTreeMap::new(),
    }
}

fn photo(description: &str) -> EvidenceInput {
    EvidenceInput {
        kind: EvidenceKind::Photo,
        description: description.into(),
        file_refs: vec![],
    }
}

fn seed_trust(store: &Arc<dyn Store>, id: &str, tier: Tier, score: f64, total: u64) {
    let mut record = ParticipantTrust::new(ParticipantId::new(id), T0);
    record.score = score;
    record.tier = tier;
    record.total_transfers = total;
    let mut batch = Batch::new();
    batch.put_trust(record, 0);
    store.commit(batch).unwrap();
}

fn score_of(h: &Harness, id: &str) -> f64 {
    h.coord.get_trust(&ParticipantId::new(id)).unwrap().score
}

fn drain_events(h: &Harness) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Some(e) = h.events.try_recv() {
        out.push(e);
    }
    out
}

// ── S1: happy path ───────────────────────────────────────────────────────────

#[test]
fn happy_path_two_check_validation() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 1_000)).unwrap();
    assert_eq!(tx.state, TransferState::Initiated);
    assert_eq!(tx.timeout_at, T0 + 24 * HOUR);

    h.clock.advance(HOUR);
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    let mid = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(mid.state, TransferState::SenderConfirmed);
    assert_eq!(mid.sender_confirmed_at, Some(T0 + HOUR));
    assert_eq!(mid.timeout_at, T0 + HOUR + 48 * HOUR);

    h.clock.advance(HOUR);
    h.coord
        .confirm_received(&bob(), &tx.id, Attestation::default())
        .unwrap();
    let done = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(done.state, TransferState::Validated);
    assert!(!done.auto_approved);
    assert_eq!(done.terminal_at, Some(T0 + 2 * HOUR));

    // Both parties earn the medium value-bucket reward.
    assert_eq!(score_of(&h, "alice"), 51.0);
    assert_eq!(score_of(&h, "bob"), 51.0);

    let events = drain_events(&h);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::TransferValidated { auto_approved: false, .. }
    )));
}

// ── S2: sender timeout ───────────────────────────────────────────────────────

#[test]
fn sender_timeout_penalizes_sender() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 500)).unwrap();

    h.clock.set(T0 + 24 * HOUR + 1);
    h.coord
        .handle_timer(&TimerKey::TransferDeadline(tx.id.clone()))
        .unwrap();

    let after = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(after.state, TransferState::TimedOut);
    assert_eq!(score_of(&h, "alice"), 45.0);
    assert!(h.coord.get_trust(&ParticipantId::new("bob")).is_err());

    let events = drain_events(&h);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::TransferTimeout { attributed_to, .. } if attributed_to.as_str() == "alice"
    )));
}

#[test]
fn receiver_timeout_penalizes_receiver() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 500)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();

    h.clock.set(T0 + 48 * HOUR + 1);
    h.coord
        .handle_timer(&TimerKey::TransferDeadline(tx.id.clone()))
        .unwrap();
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::TimedOut
    );
    assert_eq!(score_of(&h, "bob"), 45.0);
}

// ── P5: timer idempotence ────────────────────────────────────────────────────

#[test]
fn replayed_timer_firing_is_a_no_op() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 500)).unwrap();
    h.clock.set(T0 + 24 * HOUR + 1);

    let key = TimerKey::TransferDeadline(tx.id.clone());
    h.coord.handle_timer(&key).unwrap();
    h.coord.handle_timer(&key).unwrap();

    let trust = h.coord.get_trust(&ParticipantId::new("alice")).unwrap();
    assert_eq!(trust.history.len(), 1, "one penalty despite two firings");
    assert_eq!(trust.score, 45.0);
}

// ── S3: dispute, arbitration, compensation ───────────────────────────────────

#[test]
fn dispute_resolution_with_replacement_round_trip() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 1_000)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    h.coord
        .confirm_received(&bob(), &tx.id, Attestation::default())
        .unwrap();

    // Within the grace window the receiver contests the delivery.
    h.clock.advance(10 * HOUR);
    let dispute = h
        .coord
        .open_dispute(
            &bob(),
            &tx.id,
            DisputeType::Damaged,
            "crate arrived crushed".into(),
            vec![photo("forklift damage on two sides")],
        )
        .unwrap();
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::Disputed
    );
    assert_eq!(dispute.initiator.as_str(), "bob");
    assert_eq!(dispute.respondent.as_str(), "alice");

    let resolved = h
        .coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::InFavorReceiver,
            RequiredAction::Replace,
            0,
            "photos are conclusive".into(),
        )
        .unwrap();
    assert_eq!(resolved.status, DisputeStatus::Resolved);
    let follow_up_id = resolved
        .resolution
        .as_ref()
        .unwrap()
        .follow_up_id
        .clone()
        .expect("zero-amount remedy creates the follow-up immediately");

    let parent = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(parent.state, TransferState::Compensating);

    // The follow-up runs the ordinary two-check machine, same direction.
    let follow_up = h.coord.get_transfer(&follow_up_id).unwrap();
    assert_eq!(follow_up.sender.as_str(), "alice");
    assert_eq!(follow_up.receiver.as_str(), "bob");
    assert_eq!(follow_up.parent_id, Some(tx.id.clone()));
    h.coord
        .confirm_sent(&alice(), &follow_up_id, Attestation::default())
        .unwrap();
    h.coord
        .confirm_received(&bob(), &follow_up_id, Attestation::default())
        .unwrap();

    let parent = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(parent.state, TransferState::Resolved);
    let dispute = h.coord.get_dispute(&dispute.id).unwrap();
    assert!(dispute.resolution.as_ref().unwrap().action_completed);

    // Alice: +1 validation, -10 lost dispute, +1 follow-up validation,
    // +2 completed remedy. Bob: +1, -1 opener cost, +1.
    assert_eq!(score_of(&h, "alice"), 44.0);
    assert_eq!(score_of(&h, "bob"), 51.0);

    let events = drain_events(&h);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::DisputeOpened { .. })));
    assert!(events.iter().any(|e| matches!(e, EngineEvent::DisputeResolved { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::CompensationCompleted { .. })));
}

#[test]
fn dispute_window_closes_after_grace() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    h.coord
        .confirm_received(&bob(), &tx.id, Attestation::default())
        .unwrap();

    h.clock.advance(72 * HOUR + 1);
    let err = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::Damaged, "late complaint".into(), vec![])
        .unwrap_err();
    assert!(matches!(err, ConsignError::DisputeWindowClosed(_)));
}

// ── P4: resolution write-once ────────────────────────────────────────────────

#[test]
fn resolution_is_write_once() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::NotSent, "nothing shipped".into(), vec![])
        .unwrap();

    h.coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::NoFault,
            RequiredAction::None,
            0,
            "courtesy closure".into(),
        )
        .unwrap();

    let err = h
        .coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::Split,
            RequiredAction::None,
            0,
            "second thoughts".into(),
        )
        .unwrap_err();
    assert!(matches!(err, ConsignError::ResolutionAlreadyRecorded(_)));
}

#[test]
fn arbitrator_evidence_moves_dispute_under_review() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::Damaged, "dented".into(), vec![])
        .unwrap();

    // Party evidence leaves the dispute open; the arbitrator's first
    // submission moves it to investigating.
    h.coord
        .add_evidence(&alice(), &dispute.id, photo("pre-shipment condition"))
        .unwrap();
    assert_eq!(
        h.coord.get_dispute(&dispute.id).unwrap().status,
        DisputeStatus::Open
    );
    h.coord
        .add_evidence(&arbitrator(), &dispute.id, photo("carrier inspection report"))
        .unwrap();
    assert_eq!(
        h.coord.get_dispute(&dispute.id).unwrap().status,
        DisputeStatus::Investigating
    );

    // Outsiders may not touch the evidence trail.
    let outsider = Principal::new("mallory", Role::Participant);
    let err = h
        .coord
        .add_evidence(&outsider, &dispute.id, photo("unrelated"))
        .unwrap_err();
    assert!(matches!(err, ConsignError::EvidenceNotPermitted { .. }));
}

#[test]
fn resolved_dispute_accepts_no_more_evidence() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::Damaged, "dented".into(), vec![])
        .unwrap();
    h.coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::InFavorSender,
            RequiredAction::None,
            0,
            "no damage shown".into(),
        )
        .unwrap();

    let err = h
        .coord
        .add_evidence(&bob(), &dispute.id, photo("late photo"))
        .unwrap_err();
    assert!(matches!(err, ConsignError::DisputeClosed(_)));
    // The transfer returned to validated on the sender-favored decision.
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::Validated
    );
    // The receiver lost the dispute: +(-1) opener, -10 loss.
    assert_eq!(score_of(&h, "bob"), 39.0);
}

// ── Compensation approval gate ───────────────────────────────────────────────

#[test]
fn monetary_compensation_waits_for_neutral_approval() {
    let h = harness();
    let manager = Principal::new("dana", Role::Manager);

    let tx = h.coord.create_transfer(&alice(), request("bob", 20_000)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    h.coord
        .confirm_received(&bob(), &tx.id, Attestation::default())
        .unwrap();
    let dispute = h
        .coord
        .open_dispute(
            &bob(),
            &tx.id,
            DisputeType::QuantityMismatch,
            "three pallets short".into(),
            vec![photo("dock tally sheet")],
        )
        .unwrap();

    let resolved = h
        .coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::InFavorReceiver,
            RequiredAction::ResendPartial,
            2_500,
            "shortfall confirmed".into(),
        )
        .unwrap();
    assert!(resolved.resolution.as_ref().unwrap().follow_up_id.is_none());

    // A party cannot approve; the neutral manager can.
    let err = h.coord.approve_compensation(&alice(), &tx.id);
    assert!(err.is_err());
    let follow_up_id = h.coord.approve_compensation(&manager, &tx.id).unwrap();

    let follow_up = h.coord.get_transfer(&follow_up_id).unwrap();
    assert_eq!(follow_up.quantity, 5.0, "partial resend halves the quantity");
    assert_eq!(follow_up.sender.as_str(), "alice");
}

#[test]
fn rejected_compensation_resolves_parent_without_remedy() {
    let h = harness();
    let manager = Principal::new("dana", Role::Manager);

    let tx = h.coord.create_transfer(&alice(), request("bob", 20_000)).unwrap();
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::NotSent, "never dispatched".into(), vec![])
        .unwrap();
    h.coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::InFavorReceiver,
            RequiredAction::Resend,
            1_000,
            "resend with surcharge".into(),
        )
        .unwrap();

    h.coord
        .reject_compensation(&manager, &tx.id, "budget hold".into())
        .unwrap();
    let parent = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(parent.state, TransferState::Resolved);
    let dispute = h.coord.get_dispute(&dispute.id).unwrap();
    assert!(!dispute.resolution.as_ref().unwrap().action_completed);
}

// ── Return remedies reverse direction ────────────────────────────────────────

#[test]
fn return_remedy_reverses_direction() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 300)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    h.coord
        .confirm_received(&bob(), &tx.id, Attestation::default())
        .unwrap();
    let dispute = h
        .coord
        .open_dispute(
            &bob(),
            &tx.id,
            DisputeType::WrongItem,
            "received fasteners, ordered bearings".into(),
            vec![photo("box contents")],
        )
        .unwrap();
    let resolved = h
        .coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::InFavorReceiver,
            RequiredAction::Return,
            0,
            "send it back".into(),
        )
        .unwrap();

    let follow_up_id = resolved.resolution.unwrap().follow_up_id.unwrap();
    let follow_up = h.coord.get_transfer(&follow_up_id).unwrap();
    assert_eq!(follow_up.sender.as_str(), "bob");
    assert_eq!(follow_up.receiver.as_str(), "alice");
}

// ── Auto-escalation on missing evidence ──────────────────────────────────────

#[test]
fn evidence_deadline_escalates_and_external_decision_reenters() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::NotReceived, "no delivery".into(), vec![])
        .unwrap();

    h.clock.advance(48 * HOUR + 1);
    h.coord
        .handle_timer(&TimerKey::EvidenceDeadline(dispute.id.clone()))
        .unwrap();

    assert_eq!(
        h.coord.get_dispute(&dispute.id).unwrap().status,
        DisputeStatus::Escalated
    );
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::Escalated
    );

    // The external authority's decision re-enters as a normal resolution.
    h.coord
        .resolve_dispute(
            &arbitrator(),
            &dispute.id,
            Decision::Split,
            RequiredAction::None,
            0,
            "insufficient records on both sides".into(),
        )
        .unwrap();
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::Resolved
    );
}

#[test]
fn supplied_evidence_prevents_auto_escalation() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let dispute = h
        .coord
        .open_dispute(
            &bob(),
            &tx.id,
            DisputeType::NotReceived,
            "no delivery".into(),
            vec![photo("empty dock, timestamped")],
        )
        .unwrap();

    h.clock.advance(48 * HOUR + 1);
    h.coord
        .handle_timer(&TimerKey::EvidenceDeadline(dispute.id.clone()))
        .unwrap();
    assert_eq!(
        h.coord.get_dispute(&dispute.id).unwrap().status,
        DisputeStatus::Open
    );
}

// ── S4: emergency stop and resume ────────────────────────────────────────────

#[test]
fn scoped_stop_freezes_only_in_scope_transfers() {
    let h = harness();
    let admin = Principal::new("root", Role::Admin);
    let t4 = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    let t5 = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();

    // Freeze begins 10h in, covering only T4.
    h.clock.set(T0 + 10 * HOUR);
    let stop = h
        .coord
        .trigger_stop(
            &admin,
            "customs investigation".into(),
            StopScope::Transfers(vec![t4.id.clone()]),
        )
        .unwrap();
    assert_eq!(stop.affected, vec![t4.id.clone()]);

    let err = h
        .coord
        .confirm_sent(&alice(), &t4.id, Attestation::default())
        .unwrap_err();
    assert!(matches!(err, ConsignError::TransferFrozen { .. }));
    h.coord
        .confirm_sent(&alice(), &t5.id, Attestation::default())
        .unwrap();

    // Resume 2h later: 24h deadline + 2h frozen + 2h grace = T0 + 28h.
    h.clock.set(T0 + 12 * HOUR);
    let resumed = h.coord.resume_stop(&admin, &stop.id, None).unwrap();
    assert!(resumed.resumed_at.is_some());

    let t4_after = h.coord.get_transfer(&t4.id).unwrap();
    assert!(!t4_after.frozen);
    assert_eq!(t4_after.timeout_at, T0 + 28 * HOUR);
    h.coord
        .confirm_sent(&alice(), &t4.id, Attestation::default())
        .unwrap();
}

// ── P6: frozen transfers still accept disputes ───────────────────────────────

#[test]
fn frozen_transfer_accepts_only_disputes() {
    let h = harness();
    let admin = Principal::new("root", Role::Admin);
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    h.coord
        .trigger_stop(&admin, "fraud sweep".into(), StopScope::All)
        .unwrap();

    assert!(h
        .coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .is_err());
    let dispute = h
        .coord
        .open_dispute(&bob(), &tx.id, DisputeType::NotSent, "suspicious listing".into(), vec![])
        .unwrap();
    let after = h.coord.get_transfer(&tx.id).unwrap();
    assert_eq!(after.state, TransferState::Disputed);
    assert!(after.frozen, "dispute does not lift the freeze");
    assert_eq!(after.dispute_id, Some(dispute.id));
}

#[test]
fn global_stop_blocks_creation() {
    let h = harness();
    let admin = Principal::new("root", Role::Admin);
    h.coord
        .trigger_stop(&admin, "incident response".into(), StopScope::All)
        .unwrap();
    let err = h
        .coord
        .create_transfer(&alice(), request("bob", 100))
        .unwrap_err();
    assert!(matches!(err, ConsignError::GlobalStop(_)));
}

// ── S5: auto-approval between platinum parties ───────────────────────────────

#[test]
fn low_value_platinum_transfer_auto_validates() {
    let h = harness();
    seed_trust(&h.store, "alice", Tier::Platinum, 96.0, 150);
    seed_trust(&h.store, "bob", Tier::Platinum, 97.0, 200);

    let tx = h.coord.create_transfer(&alice(), request("bob", 50)).unwrap();
    assert_eq!(tx.state, TransferState::Validated);
    assert!(tx.auto_approved);

    // Small value bucket, applied exactly once per party.
    let alice_trust = h.coord.get_trust(&ParticipantId::new("alice")).unwrap();
    assert_eq!(alice_trust.score, 96.5);
    assert_eq!(alice_trust.history.len(), 1);
    assert_eq!(score_of(&h, "bob"), 97.5);

    let events = drain_events(&h);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::TransferValidated { auto_approved: true, .. }
    )));
}

#[test]
fn auto_approval_needs_both_parties_at_tier() {
    let h = harness();
    seed_trust(&h.store, "alice", Tier::Platinum, 96.0, 150);
    seed_trust(&h.store, "bob", Tier::Silver, 75.0, 40);

    let tx = h.coord.create_transfer(&alice(), request("bob", 50)).unwrap();
    assert_eq!(tx.state, TransferState::Initiated);
    assert!(!tx.auto_approved);
}

// ── S6: batch with partial failure ───────────────────────────────────────────

#[test]
fn batch_reports_per_item_failures() {
    let h = harness();
    seed_trust(&h.store, "alice", Tier::Gold, 90.0, 50);

    let mut requests = vec![
        request("bob", 100),
        request("carl", 100),
        request("alice", 100), // self-transfer, rejected
        request("dave", 100),
        request("erin", 100),
    ];
    requests[2].receiver = ParticipantId::new("alice");

    let report = h.coord.create_batch(&alice(), requests, None).unwrap();
    assert_eq!(report.created.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(
        report.failures[0].kind,
        consign_core::error::ErrorKind::Validation
    );
}

#[test]
fn batch_requires_the_gold_benefit() {
    let h = harness();
    seed_trust(&h.store, "alice", Tier::Silver, 75.0, 40);
    let err = h
        .coord
        .create_batch(&alice(), vec![request("bob", 100)], None)
        .unwrap_err();
    assert!(matches!(err, ConsignError::BenefitRequired { .. }));
}

// ── Gold senders get reduced hold times ──────────────────────────────────────

#[test]
fn reduced_hold_shortens_the_sender_deadline() {
    let h = harness();
    seed_trust(&h.store, "alice", Tier::Gold, 90.0, 50);
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    assert_eq!(tx.timeout_at, T0 + 12 * HOUR);
}

// ── P2: losers of a confirmation race see InvalidState after re-read ─────────

#[test]
fn duplicate_confirmation_fails_invalid_state() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    h.coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap();
    let err = h
        .coord
        .confirm_sent(&alice(), &tx.id, Attestation::default())
        .unwrap_err();
    assert!(matches!(err, ConsignError::InvalidTransition { .. }));
}

// ── Timed-out transfers can be appealed ──────────────────────────────────────

#[test]
fn timeout_can_be_appealed_into_dispute() {
    let h = harness();
    let tx = h.coord.create_transfer(&alice(), request("bob", 100)).unwrap();
    h.clock.set(T0 + 24 * HOUR + 1);
    h.coord
        .handle_timer(&TimerKey::TransferDeadline(tx.id.clone()))
        .unwrap();

    let dispute = h
        .coord
        .open_dispute(
            &alice(),
            &tx.id,
            DisputeType::Timeout,
            "receiver was unreachable, goods did ship".into(),
            vec![photo("carrier pickup scan")],
        )
        .unwrap();
    assert_eq!(
        h.coord.get_transfer(&tx.id).unwrap().state,
        TransferState::Disputed
    );
    assert_eq!(dispute.initiator.as_str(), "alice");
}
