use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    RpcAttestation, RpcBatchReport, RpcCompensation, RpcDispute, RpcEvidenceInput,
    RpcNewTransfer, RpcStop, RpcTransfer, RpcTrust, RpcTrustDelta,
};

/// Consign JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "consign_" via `namespace =
/// "consign"`. Authentication happens upstream; every mutating method
/// takes the already-authenticated principal id and role.
#[rpc(server, namespace = "consign")]
pub trait ConsignApi {
    // ── Transfers ────────────────────────────────────────────────────────────

    /// Create a transfer with the principal as sender. Returns the id.
    #[method(name = "createTransfer")]
    async fn create_transfer(
        &self,
        principal: String,
        role: String,
        request: RpcNewTransfer,
    ) -> RpcResult<String>;

    /// Create up to 100 transfers in one call. Requires the
    /// batch-operations benefit; items succeed or fail independently.
    /// `deadline_secs` caps how long item processing may run.
    #[method(name = "createBatch")]
    async fn create_batch(
        &self,
        principal: String,
        role: String,
        requests: Vec<RpcNewTransfer>,
        deadline_secs: Option<i64>,
    ) -> RpcResult<RpcBatchReport>;

    /// Sender attests dispatch. Returns the updated transfer.
    #[method(name = "confirmSent")]
    async fn confirm_sent(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        attestation: Option<RpcAttestation>,
    ) -> RpcResult<RpcTransfer>;

    /// Receiver attests receipt, completing the two-check consensus.
    #[method(name = "confirmReceived")]
    async fn confirm_received(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        attestation: Option<RpcAttestation>,
    ) -> RpcResult<RpcTransfer>;

    #[method(name = "getTransfer")]
    async fn get_transfer(&self, transfer_id: String) -> RpcResult<Option<RpcTransfer>>;

    /// Transfers where the participant is sender or receiver, newest first.
    #[method(name = "getTransfers")]
    async fn get_transfers(&self, participant_id: String) -> RpcResult<Vec<RpcTransfer>>;

    // ── Disputes ─────────────────────────────────────────────────────────────

    /// Raise a dispute on a transfer. Returns the dispute id.
    #[method(name = "openDispute")]
    async fn open_dispute(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        dispute_type: String,
        reason: String,
        evidence: Vec<RpcEvidenceInput>,
    ) -> RpcResult<String>;

    /// Append one evidence entry. Returns the evidence id.
    #[method(name = "addEvidence")]
    async fn add_evidence(
        &self,
        principal: String,
        role: String,
        dispute_id: String,
        entry: RpcEvidenceInput,
    ) -> RpcResult<String>;

    /// Arbitrator decision. `required_action` defaults to "none";
    /// a non-zero `compensation_amount` gates the remedy on approval.
    #[method(name = "resolveDispute")]
    async fn resolve_dispute(
        &self,
        principal: String,
        role: String,
        dispute_id: String,
        decision: String,
        required_action: Option<String>,
        compensation_amount: Option<u64>,
        notes: Option<String>,
    ) -> RpcResult<RpcDispute>;

    #[method(name = "getDispute")]
    async fn get_dispute(&self, dispute_id: String) -> RpcResult<Option<RpcDispute>>;

    #[method(name = "getDisputes")]
    async fn get_disputes(&self, transfer_id: String) -> RpcResult<Vec<RpcDispute>>;

    // ── Compensation ─────────────────────────────────────────────────────────

    /// Approve a pending monetary remedy. Returns the follow-up transfer id.
    #[method(name = "approveCompensation")]
    async fn approve_compensation(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
    ) -> RpcResult<String>;

    #[method(name = "rejectCompensation")]
    async fn reject_compensation(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        reason: String,
    ) -> RpcResult<bool>;

    /// The compensation record tracking a transfer's remedy, if any.
    #[method(name = "getCompensation")]
    async fn get_compensation(&self, transfer_id: String) -> RpcResult<Option<RpcCompensation>>;

    // ── Trust ────────────────────────────────────────────────────────────────

    #[method(name = "getTrust")]
    async fn get_trust(&self, participant_id: String) -> RpcResult<Option<RpcTrust>>;

    /// Most recent score deltas first, at most `limit` (max 200).
    #[method(name = "getTrustHistory")]
    async fn get_trust_history(
        &self,
        participant_id: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcTrustDelta>>;

    /// Participants ranked by score (max 200).
    #[method(name = "getLeaderboard")]
    async fn get_leaderboard(&self, limit: u32) -> RpcResult<Vec<RpcTrust>>;

    // ── Emergency stop ───────────────────────────────────────────────────────

    /// Freeze live transfers. `scope` is a transfer-id list, or absent for
    /// a global stop. Returns the stop id.
    #[method(name = "triggerEmergencyStop")]
    async fn trigger_emergency_stop(
        &self,
        principal: String,
        role: String,
        reason: String,
        scope: Option<Vec<String>>,
    ) -> RpcResult<String>;

    /// Resume a stop, optionally only for a subset of its transfers.
    #[method(name = "resumeEmergencyStop")]
    async fn resume_emergency_stop(
        &self,
        principal: String,
        role: String,
        stop_id: String,
        scope: Option<Vec<String>>,
    ) -> RpcResult<RpcStop>;

    /// Currently active stops.
    #[method(name = "getEmergencyStatus")]
    async fn get_emergency_status(&self) -> RpcResult<Vec<RpcStop>>;
}
