use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ParticipantId;

/// Role attached to an authenticated request by the external auth layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Participant,
    Manager,
    Admin,
    Security,
}

impl Role {
    /// Dispute resolution requires the admin capability.
    pub fn can_arbitrate(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Emergency stops require admin or security.
    pub fn can_trigger_stop(&self) -> bool {
        matches!(self, Role::Admin | Role::Security)
    }

    /// Resume is admin-only.
    pub fn can_resume_stop(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Compensation approval requires manager or admin.
    pub fn can_approve_compensation(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Participant => "participant",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Security => "security",
        };
        write!(f, "{s}")
    }
}

/// An authenticated caller: identity plus role, as handed over by the auth
/// layer. The engine never authenticates; it only authorizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: ParticipantId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: ParticipantId::new(id),
            role,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.role)
    }
}
