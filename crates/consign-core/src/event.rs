//! Engine events published on the in-process bus after each durable commit.

use serde::{Deserialize, Serialize};

use crate::dispute::Decision;
use crate::trust::Tier;
use crate::types::{
    CompensationId, DisputeId, ParticipantId, StopId, Timestamp, TransferId, Value,
};

/// Topic names, one per event variant.
pub mod topic {
    pub const TRANSFER_VALIDATED: &str = "transfer.validated";
    pub const TRANSFER_TIMEOUT: &str = "transfer.timeout";
    pub const DISPUTE_OPENED: &str = "dispute.opened";
    pub const DISPUTE_RESOLVED: &str = "dispute.resolved";
    pub const COMPENSATION_COMPLETED: &str = "compensation.completed";
    pub const TRUST_UPDATED: &str = "trust.updated";
    pub const STOP_TRIGGERED: &str = "stop.triggered";
    pub const STOP_RESUMED: &str = "stop.resumed";

    /// Every topic, for subscribers that want the full stream.
    pub const ALL: &[&str] = &[
        TRANSFER_VALIDATED,
        TRANSFER_TIMEOUT,
        DISPUTE_OPENED,
        DISPUTE_RESOLVED,
        COMPENSATION_COMPLETED,
        TRUST_UPDATED,
        STOP_TRIGGERED,
        STOP_RESUMED,
    ];
}

/// A state change the engine committed. Delivery is at-least-once within
/// the process; handlers must be idempotent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    TransferValidated {
        transfer_id: TransferId,
        sender: ParticipantId,
        receiver: ParticipantId,
        value: Value,
        auto_approved: bool,
        at: Timestamp,
    },
    TransferTimeout {
        transfer_id: TransferId,
        /// The party whose confirmation was missing.
        attributed_to: ParticipantId,
        at: Timestamp,
    },
    DisputeOpened {
        dispute_id: DisputeId,
        transfer_id: TransferId,
        initiator: ParticipantId,
        at: Timestamp,
    },
    DisputeResolved {
        dispute_id: DisputeId,
        transfer_id: TransferId,
        decision: Decision,
        at: Timestamp,
    },
    CompensationCompleted {
        compensation_id: CompensationId,
        parent_id: TransferId,
        /// The party that performed the remedy.
        at_fault: ParticipantId,
        at: Timestamp,
    },
    TrustUpdated {
        participant_id: ParticipantId,
        score: f64,
        tier: Tier,
        at: Timestamp,
    },
    StopTriggered {
        stop_id: StopId,
        at: Timestamp,
    },
    StopResumed {
        stop_id: StopId,
        at: Timestamp,
    },
}

impl EngineEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            EngineEvent::TransferValidated { .. } => topic::TRANSFER_VALIDATED,
            EngineEvent::TransferTimeout { .. } => topic::TRANSFER_TIMEOUT,
            EngineEvent::DisputeOpened { .. } => topic::DISPUTE_OPENED,
            EngineEvent::DisputeResolved { .. } => topic::DISPUTE_RESOLVED,
            EngineEvent::CompensationCompleted { .. } => topic::COMPENSATION_COMPLETED,
            EngineEvent::TrustUpdated { .. } => topic::TRUST_UPDATED,
            EngineEvent::StopTriggered { .. } => topic::STOP_TRIGGERED,
            EngineEvent::StopResumed { .. } => topic::STOP_RESUMED,
        }
    }
}
