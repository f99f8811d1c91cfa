//! Per-participant trust records.
//!
//! The score is a pure fold of the history deltas clamped to [0, 100]; the
//! tier is a pure function of (score, transfer count, dispute rate). Both
//! functions live in the trust crate; this module holds the data.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ParticipantId, Timestamp, Version};

// ── Tier ─────────────────────────────────────────────────────────────────────

/// Coarse trust bucket gating benefits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    New,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::New => "new",
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        };
        write!(f, "{s}")
    }
}

/// Privileges granted by tier, consumed by the policy gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Benefit {
    PrioritySupport,
    BatchOperations,
    ReducedHoldTimes,
    AutoApprovalLowValue,
}

// ── TrustDelta ───────────────────────────────────────────────────────────────

/// Why a score delta was applied. Recorded with every history entry for
/// auditability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustCause {
    TransferValidated,
    TransferTimeout,
    DisputeOpened,
    DisputeLost,
    DisputeSplit,
    DisputeNoFault,
    CompensationCompleted,
}

/// One entry of the capped history ring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustDelta {
    pub delta: f64,
    pub cause: TrustCause,
    pub at: Timestamp,
}

// ── ParticipantTrust ─────────────────────────────────────────────────────────

/// Running trust aggregate for one participant. Records exist for the
/// lifetime of the participant and are never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantTrust {
    pub participant_id: ParticipantId,
    /// Clamped to [0, 100].
    pub score: f64,
    pub tier: Tier,
    pub total_transfers: u64,
    pub dispute_count: u64,
    pub disputes_lost: u64,
    pub timeout_count: u64,
    pub updated_at: Timestamp,
    /// Capped ring of score deltas, oldest first.
    pub history: Vec<TrustDelta>,
    pub version: Version,
}

/// Starting score for a fresh participant.
pub const INITIAL_SCORE: f64 = 50.0;

impl ParticipantTrust {
    pub fn new(participant_id: ParticipantId, now: Timestamp) -> Self {
        Self {
            participant_id,
            score: INITIAL_SCORE,
            tier: Tier::New,
            total_transfers: 0,
            dispute_count: 0,
            disputes_lost: 0,
            timeout_count: 0,
            updated_at: now,
            history: Vec::new(),
            version: 1,
        }
    }

    /// Disputes per transfer, in [0, 1]. Zero-transfer participants have a
    /// zero rate.
    pub fn dispute_rate(&self) -> f64 {
        if self.total_transfers == 0 {
            0.0
        } else {
            self.dispute_count as f64 / self.total_transfers as f64
        }
    }
}
