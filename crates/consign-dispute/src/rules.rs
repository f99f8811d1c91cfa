//! Dispute classification and admission rules.
//!
//! Pure functions: what remedies a dispute type admits, who may append
//! evidence, and how the respondent derives from the transfer. The engine
//! consults these before every dispute mutation.

use consign_core::dispute::{Dispute, DisputeType, RequiredAction};
use consign_core::error::ConsignError;
use consign_core::principal::Principal;
use consign_core::transfer::Transfer;
use consign_core::types::ParticipantId;

/// The menu of remedial actions an arbitrator may order for each dispute
/// type. `None` (waive the remedy) is listed where the arbitrator can
/// decide the complaint needs no follow-up.
pub fn allowed_actions(dispute_type: DisputeType) -> &'static [RequiredAction] {
    match dispute_type {
        DisputeType::NotReceived => &[RequiredAction::Resend, RequiredAction::None],
        DisputeType::WrongItem => &[RequiredAction::Return, RequiredAction::Replace],
        DisputeType::Damaged => &[RequiredAction::Replace, RequiredAction::Return],
        DisputeType::QuantityMismatch => &[RequiredAction::ResendPartial],
        DisputeType::QualityIssue => &[
            RequiredAction::Replace,
            RequiredAction::Return,
            RequiredAction::None,
        ],
        DisputeType::NotSent => &[RequiredAction::Resend, RequiredAction::None],
        DisputeType::Timeout => &[RequiredAction::Resend, RequiredAction::None],
    }
}

pub fn check_action(
    dispute_type: DisputeType,
    action: RequiredAction,
) -> Result<(), ConsignError> {
    if allowed_actions(dispute_type).contains(&action) {
        return Ok(());
    }
    Err(ConsignError::ActionNotAllowedForType {
        dispute_type: dispute_type.as_str().to_string(),
        action: action.as_str().to_string(),
    })
}

/// The respondent is the counterparty of the initiator.
pub fn respondent_for(
    transfer: &Transfer,
    initiator: &ParticipantId,
) -> Result<ParticipantId, ConsignError> {
    if !transfer.is_party(initiator) {
        return Err(ConsignError::NotAParty {
            principal: initiator.clone(),
            transfer: transfer.id.clone(),
        });
    }
    Ok(transfer.other_party(initiator))
}

/// Only dispute parties and admin arbitrators may append evidence.
pub fn check_evidence_submitter(
    dispute: &Dispute,
    principal: &Principal,
) -> Result<(), ConsignError> {
    if dispute.is_party(&principal.id) || principal.role.can_arbitrate() {
        return Ok(());
    }
    Err(ConsignError::EvidenceNotPermitted {
        principal: principal.id.clone(),
        dispute: dispute.id.clone(),
    })
}
