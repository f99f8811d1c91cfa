use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, StopId, Timestamp, TransferId, Version};

/// Which transfers an emergency stop covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScope {
    /// Every live transfer, present and future, until resumed.
    All,
    /// An explicit list of transfers.
    Transfers(Vec<TransferId>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Active,
    Resumed,
}

/// An operator-initiated freeze of selected live transfers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmergencyStop {
    pub id: StopId,
    pub triggered_by: ParticipantId,
    pub reason: String,
    pub scope: StopScope,
    pub started_at: Timestamp,
    pub resumed_at: Option<Timestamp>,
    pub status: StopStatus,
    /// Transfers actually frozen when the stop was triggered. Bounded by
    /// the live set at trigger time.
    pub affected: Vec<TransferId>,
    pub version: Version,
}

impl EmergencyStop {
    pub fn new(
        id: StopId,
        triggered_by: ParticipantId,
        reason: String,
        scope: StopScope,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            triggered_by,
            reason,
            scope,
            started_at,
            resumed_at: None,
            status: StopStatus::Active,
            affected: Vec::new(),
            version: 1,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StopStatus::Active
    }

    pub fn is_global(&self) -> bool {
        self.scope == StopScope::All
    }
}
