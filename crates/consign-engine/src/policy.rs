//! Policy gateway (C9): capability checks evaluated once, before any state
//! transition. Pure functions over (principal, trust tier, subject).

use consign_core::config::EngineConfig;
use consign_core::error::ConsignError;
use consign_core::principal::Principal;
use consign_core::transfer::Transfer;
use consign_core::trust::{Benefit, ParticipantTrust, Tier};
use consign_core::types::{Timestamp, Value};
use consign_trust::score;

/// Tier of a possibly-unknown participant. Newcomers have no record yet.
pub fn tier_of(trust: Option<&ParticipantTrust>) -> Tier {
    trust.map(|t| t.tier).unwrap_or(Tier::New)
}

/// Batch creation requires the batch-operations benefit (gold and up).
pub fn check_batch_allowed(trust: Option<&ParticipantTrust>) -> Result<(), ConsignError> {
    if score::has_benefit(tier_of(trust), Benefit::BatchOperations) {
        return Ok(());
    }
    Err(ConsignError::BenefitRequired {
        benefit: "batch_operations_allowed",
    })
}

/// Dispute resolution requires the admin capability and a neutral
/// arbitrator.
pub fn check_arbitrator(principal: &Principal, tx: &Transfer) -> Result<(), ConsignError> {
    if !principal.role.can_arbitrate() {
        return Err(ConsignError::RoleRequired { required: "admin" });
    }
    if tx.is_party(&principal.id) {
        return Err(ConsignError::ArbitratorIsParty(principal.id.clone()));
    }
    Ok(())
}

pub fn check_stop_trigger(principal: &Principal) -> Result<(), ConsignError> {
    if principal.role.can_trigger_stop() {
        return Ok(());
    }
    Err(ConsignError::RoleRequired {
        required: "admin|security",
    })
}

pub fn check_stop_resume(principal: &Principal) -> Result<(), ConsignError> {
    if principal.role.can_resume_stop() {
        return Ok(());
    }
    Err(ConsignError::RoleRequired { required: "admin" })
}

/// Compensation approval requires manager or admin, distinct from both
/// parties.
pub fn check_compensation_approver(
    principal: &Principal,
    parent: &Transfer,
) -> Result<(), ConsignError> {
    if !principal.role.can_approve_compensation() {
        return Err(ConsignError::RoleRequired {
            required: "manager|admin",
        });
    }
    if parent.is_party(&principal.id) {
        return Err(ConsignError::ApproverIsParty);
    }
    Ok(())
}

/// Low-value transfers between platinum parties (both at least gold, and
/// the initiating side holding the auto-approval benefit) skip the
/// two-check path entirely.
pub fn auto_approval_eligible(
    cfg: &EngineConfig,
    sender: Option<&ParticipantTrust>,
    receiver: Option<&ParticipantTrust>,
    value: Value,
) -> bool {
    if value > cfg.v_auto {
        return false;
    }
    let sender_tier = tier_of(sender);
    let receiver_tier = tier_of(receiver);
    score::has_benefit(sender_tier, Benefit::AutoApprovalLowValue)
        && sender_tier >= Tier::Gold
        && receiver_tier >= Tier::Gold
}

/// Sender deadline for a fresh transfer: reduced hold times shorten
/// `t_initial`.
pub fn initial_deadline(
    cfg: &EngineConfig,
    sender: Option<&ParticipantTrust>,
    now: Timestamp,
) -> Timestamp {
    let window = if score::has_benefit(tier_of(sender), Benefit::ReducedHoldTimes) {
        cfg.t_initial_secs / cfg.reduced_hold_divisor.max(1)
    } else {
        cfg.t_initial_secs
    };
    now + window
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_core::principal::Role;
    use consign_core::transfer::ItemType;
    use consign_core::types::{ParticipantId, TransferId};
    use std::collections::BTreeMap;

    fn trust_with_tier(id: &str, tier: Tier) -> ParticipantTrust {
        let mut t = ParticipantTrust::new(ParticipantId::new(id), 0);
        t.tier = tier;
        t
    }

    fn transfer() -> Transfer {
        Transfer::new(
            TransferId("t1".into()),
            ParticipantId::new("alice"),
            ParticipantId::new("bob"),
            "item".into(),
            ItemType::Product,
            1.0,
            100,
            BTreeMap::new(),
            0,
            86_400,
        )
    }

    #[test]
    fn batch_needs_gold() {
        assert!(check_batch_allowed(Some(&trust_with_tier("p", Tier::Gold))).is_ok());
        assert!(check_batch_allowed(Some(&trust_with_tier("p", Tier::Silver))).is_err());
        assert!(check_batch_allowed(None).is_err());
    }

    #[test]
    fn arbitrator_must_be_neutral_admin() {
        let tx = transfer();
        assert!(check_arbitrator(&Principal::new("carol", Role::Admin), &tx).is_ok());
        assert!(matches!(
            check_arbitrator(&Principal::new("carol", Role::Manager), &tx).unwrap_err(),
            ConsignError::RoleRequired { .. }
        ));
        assert!(matches!(
            check_arbitrator(&Principal::new("alice", Role::Admin), &tx).unwrap_err(),
            ConsignError::ArbitratorIsParty(_)
        ));
    }

    #[test]
    fn stop_roles() {
        assert!(check_stop_trigger(&Principal::new("ops", Role::Security)).is_ok());
        assert!(check_stop_trigger(&Principal::new("ops", Role::Admin)).is_ok());
        assert!(check_stop_trigger(&Principal::new("ops", Role::Manager)).is_err());
        assert!(check_stop_resume(&Principal::new("ops", Role::Security)).is_err());
        assert!(check_stop_resume(&Principal::new("ops", Role::Admin)).is_ok());
    }

    #[test]
    fn approver_must_be_neutral_manager() {
        let tx = transfer();
        assert!(check_compensation_approver(&Principal::new("carol", Role::Manager), &tx).is_ok());
        assert!(
            check_compensation_approver(&Principal::new("carol", Role::Participant), &tx).is_err()
        );
        assert!(matches!(
            check_compensation_approver(&Principal::new("alice", Role::Admin), &tx).unwrap_err(),
            ConsignError::ApproverIsParty
        ));
    }

    #[test]
    fn auto_approval_needs_value_and_both_tiers() {
        let cfg = EngineConfig::default();
        let plat = trust_with_tier("a", Tier::Platinum);
        let gold = trust_with_tier("b", Tier::Gold);
        let silver = trust_with_tier("c", Tier::Silver);

        assert!(auto_approval_eligible(&cfg, Some(&plat), Some(&plat), 50));
        assert!(auto_approval_eligible(&cfg, Some(&plat), Some(&gold), 50));
        assert!(!auto_approval_eligible(&cfg, Some(&gold), Some(&plat), 50));
        assert!(!auto_approval_eligible(&cfg, Some(&plat), Some(&silver), 50));
        assert!(!auto_approval_eligible(&cfg, Some(&plat), Some(&plat), cfg.v_auto + 1));
        assert!(!auto_approval_eligible(&cfg, None, Some(&plat), 50));
    }

    #[test]
    fn reduced_hold_halves_the_window() {
        let cfg = EngineConfig::default();
        let gold = trust_with_tier("a", Tier::Gold);
        assert_eq!(initial_deadline(&cfg, None, 0), cfg.t_initial_secs);
        assert_eq!(initial_deadline(&cfg, Some(&gold), 0), cfg.t_initial_secs / 2);
    }
}
