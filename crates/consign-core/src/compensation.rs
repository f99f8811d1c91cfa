use serde::{Deserialize, Serialize};

use crate::dispute::RequiredAction;
use crate::types::{CompensationId, DisputeId, ParticipantId, Timestamp, TransferId, Value, Version};

/// Remedial transfer kind, mirroring the dispute's required action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationKind {
    Return,
    Resend,
    Replace,
    ResendPartial,
}

impl CompensationKind {
    /// Returns ship goods back from the original receiver to the sender;
    /// every other remedy retains the original direction.
    pub fn reverses_direction(&self) -> bool {
        matches!(self, CompensationKind::Return)
    }

    pub fn from_action(action: RequiredAction) -> Option<Self> {
        match action {
            RequiredAction::None => None,
            RequiredAction::Return => Some(CompensationKind::Return),
            RequiredAction::Resend => Some(CompensationKind::Resend),
            RequiredAction::Replace => Some(CompensationKind::Replace),
            RequiredAction::ResendPartial => Some(CompensationKind::ResendPartial),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationKind::Return => "return",
            CompensationKind::Resend => "resend",
            CompensationKind::Replace => "replace",
            CompensationKind::ResendPartial => "resend_partial",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationStatus {
    /// Compensation carries money; a neutral manager/admin must approve
    /// before the follow-up transfer is created.
    PendingApproval,
    Approved,
    Rejected,
    /// Follow-up transfer created and moving through the state machine.
    InProgress,
    /// Follow-up transfer validated; the parent is resolved.
    Completed,
}

/// Tracking record for one remedial obligation produced by a dispute
/// resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Compensation {
    pub id: CompensationId,
    pub parent_id: TransferId,
    pub dispute_id: DisputeId,
    pub kind: CompensationKind,
    pub status: CompensationStatus,
    /// Monetary component; zero means no approval gate.
    pub amount: Value,
    pub created_at: Timestamp,
    pub follow_up_id: Option<TransferId>,
    pub approver: Option<ParticipantId>,
    pub version: Version,
}

impl Compensation {
    pub fn new(
        id: CompensationId,
        parent_id: TransferId,
        dispute_id: DisputeId,
        kind: CompensationKind,
        amount: Value,
        created_at: Timestamp,
    ) -> Self {
        let status = if amount > 0 {
            CompensationStatus::PendingApproval
        } else {
            CompensationStatus::Approved
        };
        Self {
            id,
            parent_id,
            dispute_id,
            kind,
            status,
            amount,
            created_at,
            follow_up_id: None,
            approver: None,
            version: 1,
        }
    }
}
