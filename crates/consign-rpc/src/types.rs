//! Wire DTOs for the JSON-RPC surface. Enums travel as snake_case strings;
//! conversions to and from core types live in the server module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcNewTransfer {
    pub receiver: String,
    pub item_id: String,
    /// "product" | "batch" | "material"
    pub item_type: String,
    pub quantity: f64,
    pub value: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RpcAttestation {
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub attachments: Vec<RpcContentRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcContentRef {
    pub name: String,
    pub digest: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEvidenceInput {
    /// "photo" | "document" | "tracking" | "testimony" | "system_log"
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub file_refs: Vec<RpcContentRef>,
}

// ── Entities ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTransfer {
    pub id: String,
    pub sender: String,
    pub receiver: String,
    pub item_id: String,
    pub item_type: String,
    pub quantity: f64,
    pub value: u64,
    pub state: String,
    pub created: i64,
    pub sender_confirmed_at: Option<i64>,
    pub receiver_confirmed_at: Option<i64>,
    pub terminal_at: Option<i64>,
    pub timeout_at: i64,
    pub dispute_id: Option<String>,
    pub parent_id: Option<String>,
    pub auto_approved: bool,
    pub frozen: bool,
    pub emergency_stop_id: Option<String>,
    pub version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEvidenceEntry {
    pub id: String,
    pub submitted_by: String,
    pub timestamp: i64,
    pub kind: String,
    pub description: String,
    pub file_refs: Vec<RpcContentRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResolution {
    pub decision: String,
    pub required_action: String,
    pub compensation_amount: u64,
    pub resolved_by: String,
    pub resolved_at: i64,
    pub notes: String,
    pub follow_up_id: Option<String>,
    pub action_completed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcDispute {
    pub id: String,
    pub transfer_id: String,
    pub initiator: String,
    pub respondent: String,
    pub dispute_type: String,
    pub status: String,
    pub reason: String,
    pub opened_at: i64,
    pub evidence_deadline: i64,
    pub evidence: Vec<RpcEvidenceEntry>,
    pub resolution: Option<RpcResolution>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTrustDelta {
    pub delta: f64,
    pub cause: String,
    pub at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcTrust {
    pub participant_id: String,
    pub score: f64,
    pub tier: String,
    pub benefits: Vec<String>,
    pub total_transfers: u64,
    pub dispute_count: u64,
    pub disputes_lost: u64,
    pub timeout_count: u64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcStop {
    pub id: String,
    pub triggered_by: String,
    pub reason: String,
    /// None means a global stop.
    pub scope: Option<Vec<String>>,
    pub started_at: i64,
    pub resumed_at: Option<i64>,
    pub status: String,
    pub affected: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcCompensation {
    pub id: String,
    pub parent_id: String,
    pub dispute_id: String,
    pub kind: String,
    pub status: String,
    pub amount: u64,
    pub created_at: i64,
    pub follow_up_id: Option<String>,
    pub approver: Option<String>,
}

// ── Batch report ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBatchFailure {
    pub index: usize,
    pub kind: String,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcBatchReport {
    pub created: Vec<String>,
    pub failures: Vec<RpcBatchFailure>,
}
