//! Dispute records: complaint, evidence trail, arbitrated resolution.
//!
//! Evidence is append-only and attributed. The resolution is write-once;
//! the engine enforces both before any mutation reaches the store.

use serde::{Deserialize, Serialize};

use crate::types::{
    ContentRef, DisputeId, EvidenceId, ParticipantId, Timestamp, TransferId, Value, Version,
};

// ── DisputeType ──────────────────────────────────────────────────────────────

/// What the initiator claims went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeType {
    NotReceived,
    WrongItem,
    Damaged,
    QuantityMismatch,
    QualityIssue,
    NotSent,
    Timeout,
}

impl DisputeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeType::NotReceived => "not_received",
            DisputeType::WrongItem => "wrong_item",
            DisputeType::Damaged => "damaged",
            DisputeType::QuantityMismatch => "quantity_mismatch",
            DisputeType::QualityIssue => "quality_issue",
            DisputeType::NotSent => "not_sent",
            DisputeType::Timeout => "timeout",
        }
    }
}

// ── DisputeStatus ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Raised; evidence accumulating.
    Open,
    /// An arbitrator has been assigned and is reviewing evidence.
    Investigating,
    /// Decision recorded.
    Resolved,
    /// Handed to an external authority (or auto-escalated on missing
    /// evidence).
    Escalated,
}

impl DisputeStatus {
    /// Closed disputes accept no further evidence or resolution.
    pub fn is_closed(&self) -> bool {
        matches!(self, DisputeStatus::Resolved)
    }
}

// ── Evidence ─────────────────────────────────────────────────────────────────

/// Closed set of evidence kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Photo,
    Document,
    Tracking,
    Testimony,
    SystemLog,
}

/// One attributed evidence entry. Entries are never edited or removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub id: EvidenceId,
    pub submitted_by: ParticipantId,
    pub timestamp: Timestamp,
    pub kind: EvidenceKind,
    pub description: String,
    pub file_refs: Vec<ContentRef>,
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Arbitrator verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    InFavorSender,
    InFavorReceiver,
    Split,
    NoFault,
    Escalate,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::InFavorSender => "in_favor_sender",
            Decision::InFavorReceiver => "in_favor_receiver",
            Decision::Split => "split",
            Decision::NoFault => "no_fault",
            Decision::Escalate => "escalate",
        }
    }
}

/// Remedial action the losing side must perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    None,
    Return,
    Resend,
    Replace,
    ResendPartial,
}

impl RequiredAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredAction::None => "none",
            RequiredAction::Return => "return",
            RequiredAction::Resend => "resend",
            RequiredAction::Replace => "replace",
            RequiredAction::ResendPartial => "resend_partial",
        }
    }
}

/// The write-once arbitration outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub decision: Decision,
    pub required_action: RequiredAction,
    /// Monetary compensation attached to the remedy; gates manual approval
    /// when greater than zero.
    pub compensation_amount: Value,
    pub resolved_by: ParticipantId,
    pub resolved_at: Timestamp,
    pub notes: String,
    /// Follow-up transfer created to satisfy `required_action`.
    #[serde(default)]
    pub follow_up_id: Option<TransferId>,
    /// Set once the follow-up transfer validated (or the remedy was waived).
    #[serde(default)]
    pub action_completed: bool,
}

// ── Dispute ──────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub transfer_id: TransferId,
    pub initiator: ParticipantId,
    pub respondent: ParticipantId,
    pub dispute_type: DisputeType,
    pub status: DisputeStatus,
    pub reason: String,
    pub opened_at: Timestamp,
    /// Initiator must supply evidence before this instant or the dispute
    /// auto-escalates.
    pub evidence_deadline: Timestamp,
    pub evidence: Vec<EvidenceEntry>,
    pub resolution: Option<Resolution>,
    pub version: Version,
}

impl Dispute {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: DisputeId,
        transfer_id: TransferId,
        initiator: ParticipantId,
        respondent: ParticipantId,
        dispute_type: DisputeType,
        reason: String,
        opened_at: Timestamp,
        evidence_deadline: Timestamp,
    ) -> Self {
        Self {
            id,
            transfer_id,
            initiator,
            respondent,
            dispute_type,
            status: DisputeStatus::Open,
            reason,
            opened_at,
            evidence_deadline,
            evidence: Vec::new(),
            resolution: None,
            version: 1,
        }
    }

    pub fn is_party(&self, p: &ParticipantId) -> bool {
        self.initiator == *p || self.respondent == *p
    }

    /// Whether the initiator has met the initial evidence requirement.
    pub fn initiator_supplied_evidence(&self) -> bool {
        self.evidence.iter().any(|e| e.submitted_by == self.initiator)
    }
}
