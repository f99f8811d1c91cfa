//! Engine policy parameters.
//!
//! All windows are seconds. Defaults match the protocol documentation; every
//! field is overridable from the node's JSON config file.

use serde::{Deserialize, Serialize};

use crate::types::{DurationSecs, Value};

fn default_t_initial() -> DurationSecs {
    24 * 3600
}
fn default_t_receive() -> DurationSecs {
    48 * 3600
}
fn default_w_dispute() -> DurationSecs {
    72 * 3600
}
fn default_t_evidence() -> DurationSecs {
    48 * 3600
}
fn default_v_auto() -> Value {
    1_000
}
fn default_trust_history_cap() -> usize {
    1_024
}
fn default_event_queue_cap() -> usize {
    10_000
}
fn default_conflict_retry_max() -> u32 {
    3
}
fn default_resume_grace() -> DurationSecs {
    2 * 3600
}
fn default_reduced_hold_divisor() -> i64 {
    2
}

/// Runtime policy configuration for the consensus engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sender must confirm dispatch within this window of creation.
    #[serde(default = "default_t_initial")]
    pub t_initial_secs: DurationSecs,

    /// Receiver must confirm receipt within this window of sender confirmation.
    #[serde(default = "default_t_receive")]
    pub t_receive_secs: DurationSecs,

    /// Post-validation window during which a dispute may still be opened.
    #[serde(default = "default_w_dispute")]
    pub w_dispute_secs: DurationSecs,

    /// Window for the dispute initiator to supply initial evidence before
    /// auto-escalation.
    #[serde(default = "default_t_evidence")]
    pub t_evidence_secs: DurationSecs,

    /// Value ceiling for auto-approved transfers between platinum parties.
    #[serde(default = "default_v_auto")]
    pub v_auto: Value,

    /// Ring-buffer size for per-participant trust history.
    #[serde(default = "default_trust_history_cap")]
    pub trust_history_cap: usize,

    /// Per-subscriber event queue size before the overflow policy kicks in.
    #[serde(default = "default_event_queue_cap")]
    pub event_queue_cap: usize,

    /// How many times a version race is retried inside the engine before
    /// `Conflict` surfaces to the caller.
    #[serde(default = "default_conflict_retry_max")]
    pub conflict_retry_max: u32,

    /// Extra grace added to deadlines when an emergency stop is resumed.
    #[serde(default = "default_resume_grace")]
    pub resume_grace_secs: DurationSecs,

    /// Senders with the reduced-hold-times benefit get
    /// `t_initial_secs / reduced_hold_divisor`.
    #[serde(default = "default_reduced_hold_divisor")]
    pub reduced_hold_divisor: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            t_initial_secs: default_t_initial(),
            t_receive_secs: default_t_receive(),
            w_dispute_secs: default_w_dispute(),
            t_evidence_secs: default_t_evidence(),
            v_auto: default_v_auto(),
            trust_history_cap: default_trust_history_cap(),
            event_queue_cap: default_event_queue_cap(),
            conflict_retry_max: default_conflict_retry_max(),
            resume_grace_secs: default_resume_grace(),
            reduced_hold_divisor: default_reduced_hold_divisor(),
        }
    }
}
