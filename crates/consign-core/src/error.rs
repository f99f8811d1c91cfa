use thiserror::Error;

use crate::types::{DisputeId, ParticipantId, StopId, TransferId};

/// Coarse error classification used at the service boundary. Each
/// [`ConsignError`] variant maps to exactly one kind; the RPC layer maps
/// kinds to wire error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Forbidden,
    NotFound,
    InvalidState,
    Conflict,
    Stopped,
    Timeout,
    Internal,
}

#[derive(Debug, Error)]
pub enum ConsignError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("sender and receiver must be distinct participants")]
    SelfTransfer,

    #[error("quantity must be greater than zero; got {got}")]
    NonPositiveQuantity { got: f64 },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("dispute reason must not be empty")]
    EmptyDisputeReason,

    #[error("batch exceeds maximum size of {max} transfers")]
    BatchTooLarge { max: usize },

    #[error("attestation note exceeds maximum length of {max} bytes")]
    NoteTooLong { max: usize },

    #[error("a remedial action may only accompany an in-favor-receiver decision")]
    ActionRequiresReceiverFavor,

    // ── Forbidden ────────────────────────────────────────────────────────────
    #[error("{principal} is not a party to transfer {transfer}")]
    NotAParty {
        principal: ParticipantId,
        transfer: TransferId,
    },

    #[error("only the sender may confirm dispatch of transfer {0}")]
    NotSender(TransferId),

    #[error("only the receiver may confirm receipt of transfer {0}")]
    NotReceiver(TransferId),

    #[error("arbitrator {0} is a party to the disputed transfer")]
    ArbitratorIsParty(ParticipantId),

    #[error("operation requires the {required} role")]
    RoleRequired { required: &'static str },

    #[error("operation requires the {benefit} benefit")]
    BenefitRequired { benefit: &'static str },

    #[error("{principal} may not submit evidence on dispute {dispute}")]
    EvidenceNotPermitted {
        principal: ParticipantId,
        dispute: DisputeId,
    },

    #[error("compensation approver must not be a party to the transfer")]
    ApproverIsParty,

    // ── NotFound ─────────────────────────────────────────────────────────────
    #[error("transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    #[error("no trust record for participant: {0}")]
    TrustNotFound(ParticipantId),

    #[error("emergency stop not found: {0}")]
    StopNotFound(StopId),

    #[error("no pending compensation for transfer: {0}")]
    CompensationNotFound(TransferId),

    // ── InvalidState ─────────────────────────────────────────────────────────
    #[error("transfer {transfer} does not admit {operation} in state {state}")]
    InvalidTransition {
        transfer: TransferId,
        state: &'static str,
        operation: &'static str,
    },

    #[error("dispute window closed for transfer {0}; validation is final")]
    DisputeWindowClosed(TransferId),

    #[error("transfer {0} already has an active dispute")]
    DisputeAlreadyOpen(TransferId),

    #[error("dispute {0} is already resolved; resolution is write-once")]
    ResolutionAlreadyRecorded(DisputeId),

    #[error("dispute {0} is closed and accepts no further evidence")]
    DisputeClosed(DisputeId),

    #[error("action {action} is not a permitted remedy for dispute type {dispute_type}")]
    ActionNotAllowedForType {
        dispute_type: String,
        action: String,
    },

    #[error("compensation for transfer {0} is not awaiting approval")]
    CompensationNotPending(TransferId),

    #[error("emergency stop {0} is not active")]
    StopNotActive(StopId),

    // ── Conflict ─────────────────────────────────────────────────────────────
    #[error("version conflict on {entity}: expected {expected}, found {found}")]
    VersionConflict {
        entity: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("operation lost {attempts} consecutive version races; giving up")]
    RetriesExhausted { attempts: u32 },

    // ── Stopped ──────────────────────────────────────────────────────────────
    #[error("transfer {transfer} is frozen by emergency stop {stop}")]
    TransferFrozen {
        transfer: TransferId,
        stop: StopId,
    },

    #[error("a global emergency stop is active: {0}")]
    GlobalStop(StopId),

    // ── Timeout ──────────────────────────────────────────────────────────────
    #[error("caller deadline elapsed inside the engine")]
    DeadlineElapsed,

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("scheduler is shutting down")]
    SchedulerStopped,
}

impl ConsignError {
    /// Classify this error into the boundary taxonomy.
    pub fn kind(&self) -> ErrorKind {
        use ConsignError::*;
        match self {
            SelfTransfer
            | NonPositiveQuantity { .. }
            | EmptyField { .. }
            | EmptyDisputeReason
            | BatchTooLarge { .. }
            | NoteTooLong { .. }
            | ActionRequiresReceiverFavor => ErrorKind::Validation,

            NotAParty { .. }
            | NotSender(_)
            | NotReceiver(_)
            | ArbitratorIsParty(_)
            | RoleRequired { .. }
            | BenefitRequired { .. }
            | EvidenceNotPermitted { .. }
            | ApproverIsParty => ErrorKind::Forbidden,

            TransferNotFound(_)
            | DisputeNotFound(_)
            | TrustNotFound(_)
            | StopNotFound(_)
            | CompensationNotFound(_) => ErrorKind::NotFound,

            InvalidTransition { .. }
            | DisputeWindowClosed(_)
            | DisputeAlreadyOpen(_)
            | ResolutionAlreadyRecorded(_)
            | DisputeClosed(_)
            | ActionNotAllowedForType { .. }
            | CompensationNotPending(_)
            | StopNotActive(_) => ErrorKind::InvalidState,

            VersionConflict { .. } | RetriesExhausted { .. } => ErrorKind::Conflict,

            TransferFrozen { .. } | GlobalStop(_) => ErrorKind::Stopped,

            DeadlineElapsed => ErrorKind::Timeout,

            Storage(_) | Serialization(_) | SchedulerStopped => ErrorKind::Internal,
        }
    }

    /// True for optimistic-concurrency losses that the engine retries locally.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ConsignError::VersionConflict { .. })
    }
}
