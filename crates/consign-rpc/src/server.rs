use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use consign_core::compensation::{Compensation, CompensationStatus};
use consign_core::dispute::{
    Decision, Dispute, DisputeType, EvidenceKind, RequiredAction, Resolution,
};
use consign_core::error::{ConsignError, ErrorKind};
use consign_core::principal::{Principal, Role};
use consign_core::stop::{EmergencyStop, StopScope};
use consign_core::transfer::{Attestation, ItemType, Transfer};
use consign_core::trust::{Benefit, ParticipantTrust, TrustCause};
use consign_core::types::{ContentRef, DisputeId, ParticipantId, StopId, TransferId};
use consign_engine::{Coordinator, EvidenceInput, NewTransfer};
use consign_trust::score;

use crate::api::ConsignApiServer;
use crate::types::{
    RpcAttestation, RpcBatchFailure, RpcBatchReport, RpcCompensation, RpcContentRef,
    RpcDispute, RpcEvidenceEntry, RpcEvidenceInput, RpcNewTransfer, RpcResolution, RpcStop,
    RpcTransfer, RpcTrust, RpcTrustDelta,
};

/// Largest page for history/leaderboard queries.
const MAX_QUERY_LIMIT: u32 = 200;

// ── Error mapping ────────────────────────────────────────────────────────────

fn invalid_params(msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(-32602, msg.into(), None::<()>)
}

fn to_rpc_err(e: ConsignError) -> ErrorObject<'static> {
    let code = match e.kind() {
        ErrorKind::Validation => -32001,
        ErrorKind::Forbidden => -32002,
        ErrorKind::NotFound => -32003,
        ErrorKind::InvalidState => -32004,
        ErrorKind::Conflict => -32005,
        ErrorKind::Stopped => -32006,
        ErrorKind::Timeout => -32007,
        ErrorKind::Internal => -32603,
    };
    ErrorObject::owned(code, e.to_string(), None::<()>)
}

/// NotFound becomes a JSON null for plain getters.
fn optional<T>(result: Result<T, ConsignError>) -> RpcResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(to_rpc_err(e)),
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

fn parse_principal(principal: String, role: &str) -> Result<Principal, ErrorObject<'static>> {
    let role = match role {
        "participant" => Role::Participant,
        "manager" => Role::Manager,
        "admin" => Role::Admin,
        "security" => Role::Security,
        other => return Err(invalid_params(format!("unknown role: {other}"))),
    };
    if principal.is_empty() {
        return Err(invalid_params("principal must not be empty"));
    }
    Ok(Principal {
        id: ParticipantId(principal),
        role,
    })
}

fn parse_item_type(s: &str) -> Result<ItemType, ErrorObject<'static>> {
    match s {
        "product" => Ok(ItemType::Product),
        "batch" => Ok(ItemType::Batch),
        "material" => Ok(ItemType::Material),
        other => Err(invalid_params(format!("unknown item type: {other}"))),
    }
}

fn parse_dispute_type(s: &str) -> Result<DisputeType, ErrorObject<'static>> {
    match s {
        "not_received" => Ok(DisputeType::NotReceived),
        "wrong_item" => Ok(DisputeType::WrongItem),
        "damaged" => Ok(DisputeType::Damaged),
        "quantity_mismatch" => Ok(DisputeType::QuantityMismatch),
        "quality_issue" => Ok(DisputeType::QualityIssue),
        "not_sent" => Ok(DisputeType::NotSent),
        "timeout" => Ok(DisputeType::Timeout),
        other => Err(invalid_params(format!("unknown dispute type: {other}"))),
    }
}

fn parse_evidence_kind(s: &str) -> Result<EvidenceKind, ErrorObject<'static>> {
    match s {
        "photo" => Ok(EvidenceKind::Photo),
        "document" => Ok(EvidenceKind::Document),
        "tracking" => Ok(EvidenceKind::Tracking),
        "testimony" => Ok(EvidenceKind::Testimony),
        "system_log" => Ok(EvidenceKind::SystemLog),
        other => Err(invalid_params(format!("unknown evidence kind: {other}"))),
    }
}

fn parse_decision(s: &str) -> Result<Decision, ErrorObject<'static>> {
    match s {
        "in_favor_sender" => Ok(Decision::InFavorSender),
        "in_favor_receiver" => Ok(Decision::InFavorReceiver),
        "split" => Ok(Decision::Split),
        "no_fault" => Ok(Decision::NoFault),
        "escalate" => Ok(Decision::Escalate),
        other => Err(invalid_params(format!("unknown decision: {other}"))),
    }
}

fn parse_action(s: &str) -> Result<RequiredAction, ErrorObject<'static>> {
    match s {
        "none" => Ok(RequiredAction::None),
        "return" => Ok(RequiredAction::Return),
        "resend" => Ok(RequiredAction::Resend),
        "replace" => Ok(RequiredAction::Replace),
        "resend_partial" => Ok(RequiredAction::ResendPartial),
        other => Err(invalid_params(format!("unknown required action: {other}"))),
    }
}

fn to_attestation(rpc: Option<RpcAttestation>) -> Attestation {
    let rpc = rpc.unwrap_or_default();
    Attestation {
        note: rpc.note,
        attachments: rpc
            .attachments
            .into_iter()
            .map(|r| ContentRef {
                name: r.name,
                digest: r.digest,
            })
            .collect(),
    }
}

fn to_evidence_input(rpc: RpcEvidenceInput) -> Result<EvidenceInput, ErrorObject<'static>> {
    Ok(EvidenceInput {
        kind: parse_evidence_kind(&rpc.kind)?,
        description: rpc.description,
        file_refs: rpc
            .file_refs
            .into_iter()
            .map(|r| ContentRef {
                name: r.name,
                digest: r.digest,
            })
            .collect(),
    })
}

// ── DTO conversion ───────────────────────────────────────────────────────────

fn item_type_str(t: ItemType) -> &'static str {
    match t {
        ItemType::Product => "product",
        ItemType::Batch => "batch",
        ItemType::Material => "material",
    }
}

fn content_refs_to_rpc(refs: &[ContentRef]) -> Vec<RpcContentRef> {
    refs.iter()
        .map(|r| RpcContentRef {
            name: r.name.clone(),
            digest: r.digest.clone(),
        })
        .collect()
}

fn transfer_to_rpc(t: Transfer) -> RpcTransfer {
    RpcTransfer {
        id: t.id.0,
        sender: t.sender.0,
        receiver: t.receiver.0,
        item_id: t.item_id,
        item_type: item_type_str(t.item_type).into(),
        quantity: t.quantity,
        value: t.value,
        state: t.state.as_str().into(),
        created: t.created,
        sender_confirmed_at: t.sender_confirmed_at,
        receiver_confirmed_at: t.receiver_confirmed_at,
        terminal_at: t.terminal_at,
        timeout_at: t.timeout_at,
        dispute_id: t.dispute_id.map(|d| d.0),
        parent_id: t.parent_id.map(|p| p.0),
        auto_approved: t.auto_approved,
        frozen: t.frozen,
        emergency_stop_id: t.emergency_stop_id.map(|s| s.0),
        version: t.version,
    }
}

fn resolution_to_rpc(r: &Resolution) -> RpcResolution {
    RpcResolution {
        decision: r.decision.as_str().into(),
        required_action: r.required_action.as_str().into(),
        compensation_amount: r.compensation_amount,
        resolved_by: r.resolved_by.0.clone(),
        resolved_at: r.resolved_at,
        notes: r.notes.clone(),
        follow_up_id: r.follow_up_id.clone().map(|t| t.0),
        action_completed: r.action_completed,
    }
}

fn dispute_status_str(d: &Dispute) -> &'static str {
    use consign_core::dispute::DisputeStatus;
    match d.status {
        DisputeStatus::Open => "open",
        DisputeStatus::Investigating => "investigating",
        DisputeStatus::Resolved => "resolved",
        DisputeStatus::Escalated => "escalated",
    }
}

fn evidence_kind_str(k: EvidenceKind) -> &'static str {
    match k {
        EvidenceKind::Photo => "photo",
        EvidenceKind::Document => "document",
        EvidenceKind::Tracking => "tracking",
        EvidenceKind::Testimony => "testimony",
        EvidenceKind::SystemLog => "system_log",
    }
}

fn dispute_to_rpc(d: Dispute) -> RpcDispute {
    RpcDispute {
        status: dispute_status_str(&d).into(),
        id: d.id.0,
        transfer_id: d.transfer_id.0,
        initiator: d.initiator.0,
        respondent: d.respondent.0,
        dispute_type: d.dispute_type.as_str().into(),
        reason: d.reason,
        opened_at: d.opened_at,
        evidence_deadline: d.evidence_deadline,
        evidence: d
            .evidence
            .iter()
            .map(|e| RpcEvidenceEntry {
                id: e.id.0.clone(),
                submitted_by: e.submitted_by.0.clone(),
                timestamp: e.timestamp,
                kind: evidence_kind_str(e.kind).into(),
                description: e.description.clone(),
                file_refs: content_refs_to_rpc(&e.file_refs),
            })
            .collect(),
        resolution: d.resolution.as_ref().map(resolution_to_rpc),
    }
}

fn benefit_str(b: Benefit) -> &'static str {
    match b {
        Benefit::PrioritySupport => "priority_support",
        Benefit::BatchOperations => "batch_operations_allowed",
        Benefit::ReducedHoldTimes => "reduced_hold_times",
        Benefit::AutoApprovalLowValue => "auto_approval_low_value",
    }
}

fn cause_str(c: TrustCause) -> &'static str {
    match c {
        TrustCause::TransferValidated => "transfer_validated",
        TrustCause::TransferTimeout => "transfer_timeout",
        TrustCause::DisputeOpened => "dispute_opened",
        TrustCause::DisputeLost => "dispute_lost",
        TrustCause::DisputeSplit => "dispute_split",
        TrustCause::DisputeNoFault => "dispute_no_fault",
        TrustCause::CompensationCompleted => "compensation_completed",
    }
}

fn trust_to_rpc(t: ParticipantTrust) -> RpcTrust {
    RpcTrust {
        benefits: score::benefits_for(t.tier)
            .iter()
            .map(|b| benefit_str(*b).to_string())
            .collect(),
        participant_id: t.participant_id.0,
        score: t.score,
        tier: t.tier.to_string(),
        total_transfers: t.total_transfers,
        dispute_count: t.dispute_count,
        disputes_lost: t.disputes_lost,
        timeout_count: t.timeout_count,
        updated_at: t.updated_at,
    }
}

fn compensation_to_rpc(c: Compensation) -> RpcCompensation {
    RpcCompensation {
        id: c.id.0,
        parent_id: c.parent_id.0,
        dispute_id: c.dispute_id.0,
        kind: c.kind.as_str().into(),
        status: match c.status {
            CompensationStatus::PendingApproval => "pending_approval".into(),
            CompensationStatus::Approved => "approved".into(),
            CompensationStatus::Rejected => "rejected".into(),
            CompensationStatus::InProgress => "in_progress".into(),
            CompensationStatus::Completed => "completed".into(),
        },
        amount: c.amount,
        created_at: c.created_at,
        follow_up_id: c.follow_up_id.map(|t| t.0),
        approver: c.approver.map(|p| p.0),
    }
}

fn stop_to_rpc(s: EmergencyStop) -> RpcStop {
    RpcStop {
        id: s.id.0,
        triggered_by: s.triggered_by.0,
        reason: s.reason,
        scope: match s.scope {
            StopScope::All => None,
            StopScope::Transfers(ids) => Some(ids.into_iter().map(|t| t.0).collect()),
        },
        started_at: s.started_at,
        resumed_at: s.resumed_at,
        status: match s.status {
            consign_core::stop::StopStatus::Active => "active".into(),
            consign_core::stop::StopStatus::Resumed => "resumed".into(),
        },
        affected: s.affected.into_iter().map(|t| t.0).collect(),
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

pub struct RpcServer {
    coord: Arc<Coordinator>,
}

impl RpcServer {
    pub fn new(coord: Arc<Coordinator>) -> Self {
        Self { coord }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl ConsignApiServer for RpcServer {
    async fn create_transfer(
        &self,
        principal: String,
        role: String,
        request: RpcNewTransfer,
    ) -> RpcResult<String> {
        let principal = parse_principal(principal, &role)?;
        let req = NewTransfer {
            receiver: ParticipantId(request.receiver),
            item_id: request.item_id,
            item_type: parse_item_type(&request.item_type)?,
            quantity: request.quantity,
            value: request.value,
            metadata: request.metadata,
        };
        let tx = self
            .coord
            .create_transfer(&principal, req)
            .map_err(to_rpc_err)?;
        Ok(tx.id.0)
    }

    async fn create_batch(
        &self,
        principal: String,
        role: String,
        requests: Vec<RpcNewTransfer>,
        deadline_secs: Option<i64>,
    ) -> RpcResult<RpcBatchReport> {
        let principal = parse_principal(principal, &role)?;
        let mut parsed = Vec::with_capacity(requests.len());
        for r in requests {
            parsed.push(NewTransfer {
                receiver: ParticipantId(r.receiver),
                item_id: r.item_id,
                item_type: parse_item_type(&r.item_type)?,
                quantity: r.quantity,
                value: r.value,
                metadata: r.metadata,
            });
        }
        let report = self
            .coord
            .create_batch(&principal, parsed, deadline_secs.map(|d| d.max(0)))
            .map_err(to_rpc_err)?;
        Ok(RpcBatchReport {
            created: report.created.into_iter().map(|id| id.0).collect(),
            failures: report
                .failures
                .into_iter()
                .map(|f| RpcBatchFailure {
                    index: f.index,
                    kind: format!("{:?}", f.kind),
                    reason: f.reason,
                })
                .collect(),
        })
    }

    async fn confirm_sent(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        attestation: Option<RpcAttestation>,
    ) -> RpcResult<RpcTransfer> {
        let principal = parse_principal(principal, &role)?;
        let id = TransferId(transfer_id);
        self.coord
            .confirm_sent(&principal, &id, to_attestation(attestation))
            .map_err(to_rpc_err)?;
        let tx = self.coord.get_transfer(&id).map_err(to_rpc_err)?;
        Ok(transfer_to_rpc(tx))
    }

    async fn confirm_received(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        attestation: Option<RpcAttestation>,
    ) -> RpcResult<RpcTransfer> {
        let principal = parse_principal(principal, &role)?;
        let id = TransferId(transfer_id);
        self.coord
            .confirm_received(&principal, &id, to_attestation(attestation))
            .map_err(to_rpc_err)?;
        let tx = self.coord.get_transfer(&id).map_err(to_rpc_err)?;
        Ok(transfer_to_rpc(tx))
    }

    async fn get_transfer(&self, transfer_id: String) -> RpcResult<Option<RpcTransfer>> {
        let found = optional(self.coord.get_transfer(&TransferId(transfer_id)))?;
        Ok(found.map(transfer_to_rpc))
    }

    async fn get_transfers(&self, participant_id: String) -> RpcResult<Vec<RpcTransfer>> {
        let transfers = self
            .coord
            .transfers_for_participant(&ParticipantId(participant_id))
            .map_err(to_rpc_err)?;
        Ok(transfers.into_iter().map(transfer_to_rpc).collect())
    }

    async fn open_dispute(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        dispute_type: String,
        reason: String,
        evidence: Vec<RpcEvidenceInput>,
    ) -> RpcResult<String> {
        let principal = parse_principal(principal, &role)?;
        let dispute_type = parse_dispute_type(&dispute_type)?;
        let mut inputs = Vec::with_capacity(evidence.len());
        for e in evidence {
            inputs.push(to_evidence_input(e)?);
        }
        let dispute = self
            .coord
            .open_dispute(&principal, &TransferId(transfer_id), dispute_type, reason, inputs)
            .map_err(to_rpc_err)?;
        Ok(dispute.id.0)
    }

    async fn add_evidence(
        &self,
        principal: String,
        role: String,
        dispute_id: String,
        entry: RpcEvidenceInput,
    ) -> RpcResult<String> {
        let principal = parse_principal(principal, &role)?;
        let evidence_id = self
            .coord
            .add_evidence(&principal, &DisputeId(dispute_id), to_evidence_input(entry)?)
            .map_err(to_rpc_err)?;
        Ok(evidence_id.0)
    }

    async fn resolve_dispute(
        &self,
        principal: String,
        role: String,
        dispute_id: String,
        decision: String,
        required_action: Option<String>,
        compensation_amount: Option<u64>,
        notes: Option<String>,
    ) -> RpcResult<RpcDispute> {
        let principal = parse_principal(principal, &role)?;
        let decision = parse_decision(&decision)?;
        let action = match required_action.as_deref() {
            Some(s) => parse_action(s)?,
            None => RequiredAction::None,
        };
        let dispute = self
            .coord
            .resolve_dispute(
                &principal,
                &DisputeId(dispute_id),
                decision,
                action,
                compensation_amount.unwrap_or(0),
                notes.unwrap_or_default(),
            )
            .map_err(to_rpc_err)?;
        Ok(dispute_to_rpc(dispute))
    }

    async fn get_dispute(&self, dispute_id: String) -> RpcResult<Option<RpcDispute>> {
        let found = optional(self.coord.get_dispute(&DisputeId(dispute_id)))?;
        Ok(found.map(dispute_to_rpc))
    }

    async fn get_disputes(&self, transfer_id: String) -> RpcResult<Vec<RpcDispute>> {
        let disputes = self
            .coord
            .disputes_for_transfer(&TransferId(transfer_id))
            .map_err(to_rpc_err)?;
        Ok(disputes.into_iter().map(dispute_to_rpc).collect())
    }

    async fn approve_compensation(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
    ) -> RpcResult<String> {
        let principal = parse_principal(principal, &role)?;
        let follow_up = self
            .coord
            .approve_compensation(&principal, &TransferId(transfer_id))
            .map_err(to_rpc_err)?;
        Ok(follow_up.0)
    }

    async fn reject_compensation(
        &self,
        principal: String,
        role: String,
        transfer_id: String,
        reason: String,
    ) -> RpcResult<bool> {
        let principal = parse_principal(principal, &role)?;
        self.coord
            .reject_compensation(&principal, &TransferId(transfer_id), reason)
            .map_err(to_rpc_err)?;
        Ok(true)
    }

    async fn get_compensation(&self, transfer_id: String) -> RpcResult<Option<RpcCompensation>> {
        let found = optional(
            self.coord
                .compensation_for_transfer(&TransferId(transfer_id)),
        )?;
        Ok(found.map(compensation_to_rpc))
    }

    async fn get_trust(&self, participant_id: String) -> RpcResult<Option<RpcTrust>> {
        let found = optional(self.coord.get_trust(&ParticipantId(participant_id)))?;
        Ok(found.map(trust_to_rpc))
    }

    async fn get_trust_history(
        &self,
        participant_id: String,
        limit: u32,
    ) -> RpcResult<Vec<RpcTrustDelta>> {
        let limit = limit.min(MAX_QUERY_LIMIT) as usize;
        let history = self
            .coord
            .trust_history(&ParticipantId(participant_id), limit)
            .map_err(to_rpc_err)?;
        Ok(history
            .into_iter()
            .map(|d| RpcTrustDelta {
                delta: d.delta,
                cause: cause_str(d.cause).into(),
                at: d.at,
            })
            .collect())
    }

    async fn get_leaderboard(&self, limit: u32) -> RpcResult<Vec<RpcTrust>> {
        let limit = limit.min(MAX_QUERY_LIMIT) as usize;
        let board = self.coord.leaderboard(limit).map_err(to_rpc_err)?;
        Ok(board.into_iter().map(trust_to_rpc).collect())
    }

    async fn trigger_emergency_stop(
        &self,
        principal: String,
        role: String,
        reason: String,
        scope: Option<Vec<String>>,
    ) -> RpcResult<String> {
        let principal = parse_principal(principal, &role)?;
        let scope = match scope {
            None => StopScope::All,
            Some(ids) => StopScope::Transfers(ids.into_iter().map(TransferId).collect()),
        };
        let stop = self
            .coord
            .trigger_stop(&principal, reason, scope)
            .map_err(to_rpc_err)?;
        Ok(stop.id.0)
    }

    async fn resume_emergency_stop(
        &self,
        principal: String,
        role: String,
        stop_id: String,
        scope: Option<Vec<String>>,
    ) -> RpcResult<RpcStop> {
        let principal = parse_principal(principal, &role)?;
        let stop = self
            .coord
            .resume_stop(
                &principal,
                &StopId(stop_id),
                scope.map(|ids| ids.into_iter().map(TransferId).collect()),
            )
            .map_err(to_rpc_err)?;
        Ok(stop_to_rpc(stop))
    }

    async fn get_emergency_status(&self) -> RpcResult<Vec<RpcStop>> {
        let stops = self.coord.emergency_status().map_err(to_rpc_err)?;
        Ok(stops.into_iter().map(stop_to_rpc).collect())
    }
}
