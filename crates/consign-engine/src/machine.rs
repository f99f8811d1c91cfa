//! Pure transition functions for the transfer state machine.
//!
//! Every function here takes current state in, checks the guard, and
//! mutates the given copy or fails with a typed error. No I/O, no
//! suspension: the engine wraps these in a versioned read-modify-write
//! against the store. Guards are total; any (state, operation) pair
//! outside the diagram fails with `InvalidTransition`.

use consign_core::dispute::{Decision, RequiredAction};
use consign_core::error::ConsignError;
use consign_core::transfer::{Attestation, Transfer, TransferState};
use consign_core::types::{DisputeId, DurationSecs, ParticipantId, StopId, Timestamp};

fn invalid(tx: &Transfer, operation: &'static str) -> ConsignError {
    ConsignError::InvalidTransition {
        transfer: tx.id.clone(),
        state: tx.state.as_str(),
        operation,
    }
}

fn ensure_not_frozen(tx: &Transfer) -> Result<(), ConsignError> {
    if tx.frozen {
        return Err(ConsignError::TransferFrozen {
            transfer: tx.id.clone(),
            stop: tx
                .emergency_stop_id
                .clone()
                .unwrap_or_else(|| StopId("unknown".into())),
        });
    }
    Ok(())
}

// ── Attestations ─────────────────────────────────────────────────────────────

/// INITIATED → SENDER_CONFIRMED. Re-arms the deadline to `receive_deadline`.
pub fn apply_sender_confirm(
    tx: &mut Transfer,
    principal: &ParticipantId,
    attestation: Attestation,
    now: Timestamp,
    receive_deadline: Timestamp,
) -> Result<(), ConsignError> {
    if tx.state != TransferState::Initiated {
        return Err(invalid(tx, "confirm_sent"));
    }
    ensure_not_frozen(tx)?;
    if tx.sender != *principal {
        return Err(ConsignError::NotSender(tx.id.clone()));
    }
    tx.state = TransferState::SenderConfirmed;
    tx.sender_confirmed_at = Some(now);
    tx.sender_evidence = Some(attestation);
    tx.timeout_at = receive_deadline;
    Ok(())
}

/// SENDER_CONFIRMED → VALIDATED. The receiver's attestation completes the
/// two-check consensus.
pub fn apply_receiver_confirm(
    tx: &mut Transfer,
    principal: &ParticipantId,
    attestation: Attestation,
    now: Timestamp,
) -> Result<(), ConsignError> {
    if tx.state != TransferState::SenderConfirmed {
        return Err(invalid(tx, "confirm_received"));
    }
    ensure_not_frozen(tx)?;
    if tx.receiver != *principal {
        return Err(ConsignError::NotReceiver(tx.id.clone()));
    }
    tx.state = TransferState::Validated;
    tx.receiver_confirmed_at = Some(now);
    tx.receiver_evidence = Some(attestation);
    tx.terminal_at = Some(now);
    Ok(())
}

// ── Disputes ─────────────────────────────────────────────────────────────────

/// Whether a dispute may be opened right now. Frozen transfers still admit
/// disputes so evidence stays timely; a validated transfer only admits one
/// inside the grace window.
pub fn check_dispute_admissible(
    tx: &Transfer,
    now: Timestamp,
    w_dispute: DurationSecs,
) -> Result<(), ConsignError> {
    match tx.state {
        TransferState::Initiated | TransferState::SenderConfirmed | TransferState::TimedOut => {
            Ok(())
        }
        TransferState::Validated => {
            let validated_at = tx.receiver_confirmed_at.or(tx.terminal_at).unwrap_or(tx.created);
            if now <= validated_at + w_dispute {
                Ok(())
            } else {
                Err(ConsignError::DisputeWindowClosed(tx.id.clone()))
            }
        }
        TransferState::Disputed => Err(ConsignError::DisputeAlreadyOpen(tx.id.clone())),
        _ => Err(invalid(tx, "open_dispute")),
    }
}

/// {INITIATED, SENDER_CONFIRMED, TIMEOUT, VALIDATED-in-window} → DISPUTED.
pub fn apply_open_dispute(
    tx: &mut Transfer,
    dispute_id: DisputeId,
    now: Timestamp,
    w_dispute: DurationSecs,
) -> Result<(), ConsignError> {
    check_dispute_admissible(tx, now, w_dispute)?;
    tx.state = TransferState::Disputed;
    tx.dispute_id = Some(dispute_id);
    // Leaving VALIDATED: the transfer is live again until re-resolved.
    tx.terminal_at = None;
    Ok(())
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

/// A confirmation deadline elapsed. Returns the party whose confirmation
/// was missing; the trust engine penalizes them.
pub fn apply_timeout(tx: &mut Transfer, _now: Timestamp) -> Result<ParticipantId, ConsignError> {
    ensure_not_frozen(tx)?;
    let attributed = match tx.state {
        TransferState::Initiated => tx.sender.clone(),
        TransferState::SenderConfirmed => tx.receiver.clone(),
        _ => return Err(invalid(tx, "timeout")),
    };
    tx.state = TransferState::TimedOut;
    Ok(attributed)
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Where the transfer lands after an arbitration decision.
pub fn resolution_target(
    decision: Decision,
    required_action: RequiredAction,
) -> TransferState {
    match decision {
        Decision::InFavorSender => TransferState::Validated,
        Decision::InFavorReceiver => {
            if required_action == RequiredAction::None {
                TransferState::Cancelled
            } else {
                TransferState::Compensating
            }
        }
        Decision::Split | Decision::NoFault => TransferState::Resolved,
        Decision::Escalate => TransferState::Escalated,
    }
}

/// DISPUTED (or ESCALATED, for a re-entered external decision) → outcome
/// state per the decision.
pub fn apply_resolution(
    tx: &mut Transfer,
    decision: Decision,
    required_action: RequiredAction,
    now: Timestamp,
) -> Result<TransferState, ConsignError> {
    if !matches!(tx.state, TransferState::Disputed | TransferState::Escalated) {
        return Err(invalid(tx, "resolve"));
    }
    let target = resolution_target(decision, required_action);
    tx.state = target;
    if target.is_terminal() {
        tx.terminal_at = Some(now);
    }
    Ok(target)
}

/// COMPENSATING → RESOLVED once the follow-up transfer validated (or the
/// remedy was rejected by the approver).
pub fn apply_compensation_closed(tx: &mut Transfer, now: Timestamp) -> Result<(), ConsignError> {
    if tx.state != TransferState::Compensating {
        return Err(invalid(tx, "complete_compensation"));
    }
    tx.state = TransferState::Resolved;
    tx.terminal_at = Some(now);
    Ok(())
}

// ── Freeze / resume ──────────────────────────────────────────────────────────

/// Mark a live transfer quiesced. Idempotent for an already-frozen
/// transfer; terminal transfers are not touched.
pub fn apply_freeze(tx: &mut Transfer, stop_id: &StopId, now: Timestamp) -> Result<(), ConsignError> {
    if tx.state.is_terminal() {
        return Err(invalid(tx, "freeze"));
    }
    if tx.frozen {
        return Ok(());
    }
    tx.frozen = true;
    tx.emergency_stop_id = Some(stop_id.clone());
    tx.frozen_at = Some(now);
    Ok(())
}

/// Lift the freeze and push pending confirmation deadlines out by the
/// freeze duration plus the resume grace.
pub fn apply_unfreeze(
    tx: &mut Transfer,
    now: Timestamp,
    grace: DurationSecs,
) -> Result<(), ConsignError> {
    if !tx.frozen {
        return Ok(());
    }
    let frozen_for = now - tx.frozen_at.unwrap_or(now);
    tx.frozen = false;
    tx.emergency_stop_id = None;
    tx.frozen_at = None;
    if matches!(
        tx.state,
        TransferState::Initiated | TransferState::SenderConfirmed
    ) {
        tx.timeout_at += frozen_for + grace;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_core::transfer::ItemType;
    use consign_core::types::TransferId;
    use std::collections::BTreeMap;

    fn alice() -> ParticipantId {
        ParticipantId::new("alice")
    }

    fn bob() -> ParticipantId {
        ParticipantId::new("bob")
    }

    fn transfer_in(state: TransferState) -> Transfer {
        let mut t = Transfer::new(
            TransferId("t1".into()),
            alice(),
            bob(),
            "item".into(),
            ItemType::Product,
            1.0,
            1_000,
            BTreeMap::new(),
            0,
            86_400,
        );
        t.state = state;
        if state == TransferState::Validated {
            t.receiver_confirmed_at = Some(100);
            t.terminal_at = Some(100);
        }
        t
    }

    const ALL_STATES: [TransferState; 9] = [
        TransferState::Initiated,
        TransferState::SenderConfirmed,
        TransferState::Validated,
        TransferState::Disputed,
        TransferState::TimedOut,
        TransferState::Cancelled,
        TransferState::Resolved,
        TransferState::Escalated,
        TransferState::Compensating,
    ];

    #[test]
    fn sender_confirm_only_from_initiated() {
        for state in ALL_STATES {
            let mut t = transfer_in(state);
            let result =
                apply_sender_confirm(&mut t, &alice(), Attestation::default(), 10, 10 + 48 * 3600);
            if state == TransferState::Initiated {
                result.unwrap();
                assert_eq!(t.state, TransferState::SenderConfirmed);
                assert_eq!(t.sender_confirmed_at, Some(10));
                assert_eq!(t.timeout_at, 10 + 48 * 3600);
            } else {
                assert!(matches!(
                    result.unwrap_err(),
                    ConsignError::InvalidTransition { .. }
                ));
            }
        }
    }

    #[test]
    fn receiver_confirm_only_from_sender_confirmed() {
        for state in ALL_STATES {
            let mut t = transfer_in(state);
            let result = apply_receiver_confirm(&mut t, &bob(), Attestation::default(), 20);
            if state == TransferState::SenderConfirmed {
                result.unwrap();
                assert_eq!(t.state, TransferState::Validated);
                assert_eq!(t.terminal_at, Some(20));
            } else {
                result.unwrap_err();
            }
        }
    }

    #[test]
    fn wrong_principal_is_forbidden_not_invalid() {
        let mut t = transfer_in(TransferState::Initiated);
        let err = apply_sender_confirm(&mut t, &bob(), Attestation::default(), 10, 20).unwrap_err();
        assert!(matches!(err, ConsignError::NotSender(_)));

        let mut t = transfer_in(TransferState::SenderConfirmed);
        let err = apply_receiver_confirm(&mut t, &alice(), Attestation::default(), 10).unwrap_err();
        assert!(matches!(err, ConsignError::NotReceiver(_)));
    }

    #[test]
    fn frozen_transfer_rejects_confirmations() {
        let mut t = transfer_in(TransferState::Initiated);
        apply_freeze(&mut t, &StopId("s1".into()), 5).unwrap();
        let err = apply_sender_confirm(&mut t, &alice(), Attestation::default(), 10, 20).unwrap_err();
        assert!(matches!(err, ConsignError::TransferFrozen { .. }));
    }

    #[test]
    fn dispute_admissibility_per_state() {
        let w = 72 * 3600;
        for state in ALL_STATES {
            let t = transfer_in(state);
            let inside = check_dispute_admissible(&t, 110, w);
            match state {
                TransferState::Initiated
                | TransferState::SenderConfirmed
                | TransferState::TimedOut
                | TransferState::Validated => inside.unwrap(),
                TransferState::Disputed => {
                    assert!(matches!(inside.unwrap_err(), ConsignError::DisputeAlreadyOpen(_)))
                }
                _ => {
                    assert!(matches!(
                        inside.unwrap_err(),
                        ConsignError::InvalidTransition { .. }
                    ))
                }
            }
        }
    }

    #[test]
    fn validation_is_final_outside_the_grace_window() {
        let w = 72 * 3600;
        let t = transfer_in(TransferState::Validated); // validated at t=100
        check_dispute_admissible(&t, 100 + w, w).unwrap();
        let err = check_dispute_admissible(&t, 100 + w + 1, w).unwrap_err();
        assert!(matches!(err, ConsignError::DisputeWindowClosed(_)));
    }

    #[test]
    fn dispute_on_frozen_transfer_is_allowed() {
        let mut t = transfer_in(TransferState::Initiated);
        apply_freeze(&mut t, &StopId("s1".into()), 5).unwrap();
        apply_open_dispute(&mut t, DisputeId("d1".into()), 10, 72 * 3600).unwrap();
        assert_eq!(t.state, TransferState::Disputed);
        assert!(t.frozen, "dispute must not unfreeze");
    }

    #[test]
    fn timeout_attribution() {
        let mut t = transfer_in(TransferState::Initiated);
        assert_eq!(apply_timeout(&mut t, 90_000).unwrap(), alice());
        assert_eq!(t.state, TransferState::TimedOut);

        let mut t = transfer_in(TransferState::SenderConfirmed);
        assert_eq!(apply_timeout(&mut t, 90_000).unwrap(), bob());

        let mut t = transfer_in(TransferState::Validated);
        assert!(apply_timeout(&mut t, 90_000).is_err());
    }

    #[test]
    fn resolution_targets() {
        assert_eq!(
            resolution_target(Decision::InFavorSender, RequiredAction::None),
            TransferState::Validated
        );
        assert_eq!(
            resolution_target(Decision::InFavorReceiver, RequiredAction::None),
            TransferState::Cancelled
        );
        assert_eq!(
            resolution_target(Decision::InFavorReceiver, RequiredAction::Replace),
            TransferState::Compensating
        );
        assert_eq!(
            resolution_target(Decision::Split, RequiredAction::None),
            TransferState::Resolved
        );
        assert_eq!(
            resolution_target(Decision::NoFault, RequiredAction::None),
            TransferState::Resolved
        );
        assert_eq!(
            resolution_target(Decision::Escalate, RequiredAction::None),
            TransferState::Escalated
        );
    }

    #[test]
    fn resolution_requires_disputed_or_escalated() {
        for state in ALL_STATES {
            let mut t = transfer_in(state);
            let result = apply_resolution(&mut t, Decision::Split, RequiredAction::None, 50);
            if matches!(state, TransferState::Disputed | TransferState::Escalated) {
                assert_eq!(result.unwrap(), TransferState::Resolved);
                assert_eq!(t.terminal_at, Some(50));
            } else {
                result.unwrap_err();
            }
        }
    }

    #[test]
    fn unfreeze_extends_pending_deadlines() {
        // Freeze at t0+10h, resume at t0+12h with 2h grace: the original
        // 24h deadline becomes 28h.
        let h = 3_600;
        let mut t = transfer_in(TransferState::Initiated);
        t.timeout_at = 24 * h;
        apply_freeze(&mut t, &StopId("s1".into()), 10 * h).unwrap();
        apply_unfreeze(&mut t, 12 * h, 2 * h).unwrap();
        assert_eq!(t.timeout_at, 28 * h);
        assert!(!t.frozen);
        assert!(t.emergency_stop_id.is_none());
    }

    #[test]
    fn freeze_is_idempotent_and_skips_terminal() {
        let mut t = transfer_in(TransferState::Disputed);
        apply_freeze(&mut t, &StopId("s1".into()), 5).unwrap();
        apply_freeze(&mut t, &StopId("s2".into()), 9).unwrap();
        assert_eq!(t.emergency_stop_id, Some(StopId("s1".into())));
        assert_eq!(t.frozen_at, Some(5));

        let mut done = transfer_in(TransferState::Validated);
        assert!(apply_freeze(&mut done, &StopId("s1".into()), 5).is_err());
    }
}
