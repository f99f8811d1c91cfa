//! The custody transfer entity and its state machine vocabulary.
//!
//! A transfer records one movement of goods from `sender` to `receiver` and
//! is validated by two independent attestations. The state enum is closed;
//! every transition goes through a guard in the engine crate, never by
//! direct field assignment from callers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    ContentRef, DisputeId, ParticipantId, StopId, Timestamp, TransferId, Value, Version,
};

// ── ItemType ─────────────────────────────────────────────────────────────────

/// Kind of catalog entry being moved. The catalogs themselves are external;
/// the engine sees only the discriminant and an opaque `item_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Product,
    Batch,
    Material,
}

// ── TransferState ────────────────────────────────────────────────────────────

/// Lifecycle position of a transfer.
///
/// Main path: Initiated → SenderConfirmed → Validated.
/// Dispute branch: {Initiated, SenderConfirmed, TimedOut, recently Validated}
/// → Disputed → {Validated, Cancelled, Compensating, Resolved, Escalated};
/// Compensating → Resolved once the follow-up transfer validates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Created by the sender; awaiting dispatch confirmation.
    Initiated,
    /// Sender attested dispatch; awaiting receipt confirmation.
    SenderConfirmed,
    /// Both parties attested. Terminal once the dispute window closes.
    Validated,
    /// A party raised a dispute; an arbitrator decision is pending.
    Disputed,
    /// A confirmation deadline elapsed. May still be appealed into Disputed.
    TimedOut,
    /// Resolved against the transfer with no remedial action.
    Cancelled,
    /// Closed by arbitration (split/no-fault, or after compensation ran).
    Resolved,
    /// Handed to an external authority; awaits a re-entered decision.
    Escalated,
    /// Awaiting a remedial follow-up transfer to complete.
    Compensating,
}

impl TransferState {
    /// Terminal states are immutable except for attaching child
    /// compensation pointers.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Validated | TransferState::Cancelled | TransferState::Resolved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Initiated => "initiated",
            TransferState::SenderConfirmed => "sender_confirmed",
            TransferState::Validated => "validated",
            TransferState::Disputed => "disputed",
            TransferState::TimedOut => "timed_out",
            TransferState::Cancelled => "cancelled",
            TransferState::Resolved => "resolved",
            TransferState::Escalated => "escalated",
            TransferState::Compensating => "compensating",
        }
    }
}

// ── Attestation ──────────────────────────────────────────────────────────────

/// One party's recorded confirmation: a bounded note plus content-addressed
/// references to externally stored attachments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Free-text description; the receiver records the goods' condition here.
    pub note: Option<String>,
    /// Attachment references (photos, delivery scans). Blobs live elsewhere.
    pub attachments: Vec<ContentRef>,
}

/// Maximum attestation note length in bytes.
pub const MAX_NOTE_BYTES: usize = 1_024;

// ── Transfer ─────────────────────────────────────────────────────────────────

/// A custody transfer as stored in the state database.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub sender: ParticipantId,
    pub receiver: ParticipantId,
    /// Opaque catalog reference.
    pub item_id: String,
    pub item_type: ItemType,
    /// Positive quantity in the item's natural unit.
    pub quantity: f64,
    /// Declared value in minor currency units.
    pub value: Value,
    /// Free-form descriptive mapping, not interpreted by the engine.
    pub metadata: BTreeMap<String, String>,

    pub state: TransferState,
    pub created: Timestamp,
    pub sender_confirmed_at: Option<Timestamp>,
    pub receiver_confirmed_at: Option<Timestamp>,
    /// Set when the transfer enters a terminal state.
    pub terminal_at: Option<Timestamp>,
    /// Current confirmation deadline; re-armed as the machine advances.
    pub timeout_at: Timestamp,

    pub sender_evidence: Option<Attestation>,
    pub receiver_evidence: Option<Attestation>,

    /// Active (or last) dispute on this transfer.
    #[serde(default)]
    pub dispute_id: Option<DisputeId>,
    /// Set when this transfer is itself a compensation follow-up.
    #[serde(default)]
    pub parent_id: Option<TransferId>,
    /// True when validation was granted without per-party attestations.
    #[serde(default)]
    pub auto_approved: bool,

    /// Quiesced by an emergency stop; no state changes except disputes.
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub emergency_stop_id: Option<StopId>,
    /// When the current freeze began; used to extend deadlines on resume.
    #[serde(default)]
    pub frozen_at: Option<Timestamp>,

    pub version: Version,
}

impl Transfer {
    /// Fresh transfer in `Initiated` with the given confirmation deadline.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TransferId,
        sender: ParticipantId,
        receiver: ParticipantId,
        item_id: String,
        item_type: ItemType,
        quantity: f64,
        value: Value,
        metadata: BTreeMap<String, String>,
        created: Timestamp,
        timeout_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender,
            receiver,
            item_id,
            item_type,
            quantity,
            value,
            metadata,
            state: TransferState::Initiated,
            created,
            sender_confirmed_at: None,
            receiver_confirmed_at: None,
            terminal_at: None,
            timeout_at,
            sender_evidence: None,
            receiver_evidence: None,
            dispute_id: None,
            parent_id: None,
            auto_approved: false,
            frozen: false,
            emergency_stop_id: None,
            frozen_at: None,
            version: 1,
        }
    }

    pub fn is_party(&self, p: &ParticipantId) -> bool {
        self.sender == *p || self.receiver == *p
    }

    /// The counterparty of `p`. Caller must have checked `is_party` first.
    pub fn other_party(&self, p: &ParticipantId) -> ParticipantId {
        if self.sender == *p {
            self.receiver.clone()
        } else {
            self.sender.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transfer {
        Transfer::new(
            TransferId("t1".into()),
            ParticipantId::new("alice"),
            ParticipantId::new("bob"),
            "item-9".into(),
            ItemType::Product,
            3.0,
            500,
            BTreeMap::new(),
            1_000,
            1_000 + 86_400,
        )
    }

    #[test]
    fn new_transfer_starts_initiated_at_version_one() {
        let t = sample();
        assert_eq!(t.state, TransferState::Initiated);
        assert_eq!(t.version, 1);
        assert!(!t.frozen);
    }

    #[test]
    fn terminal_states() {
        assert!(TransferState::Validated.is_terminal());
        assert!(TransferState::Cancelled.is_terminal());
        assert!(TransferState::Resolved.is_terminal());
        assert!(!TransferState::TimedOut.is_terminal());
        assert!(!TransferState::Escalated.is_terminal());
        assert!(!TransferState::Compensating.is_terminal());
    }

    #[test]
    fn other_party_flips() {
        let t = sample();
        assert_eq!(t.other_party(&ParticipantId::new("alice")).as_str(), "bob");
        assert_eq!(t.other_party(&ParticipantId::new("bob")).as_str(), "alice");
    }
}
