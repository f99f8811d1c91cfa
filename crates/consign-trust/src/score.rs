//! Pure scoring rules.
//!
//! The score is a fold of history deltas over the initial score, clamped to
//! [0, 100]. The tier is a pure function of (score, transfer count, dispute
//! rate); benefits are a pure function of tier. Nothing here touches the
//! store.

use consign_core::trust::{
    Benefit, ParticipantTrust, Tier, TrustCause, TrustDelta, INITIAL_SCORE,
};
use consign_core::types::{Timestamp, Value};

// ── Delta table ──────────────────────────────────────────────────────────────

pub const DELTA_TIMEOUT: f64 = -5.0;
pub const DELTA_DISPUTE_OPENED: f64 = -1.0;
pub const DELTA_DISPUTE_LOST: f64 = -10.0;
pub const DELTA_DISPUTE_SPLIT: f64 = -3.0;
/// No-fault reverses the opener penalty.
pub const DELTA_DISPUTE_NO_FAULT: f64 = 1.0;
/// Partial recovery for completing the remedy.
pub const DELTA_COMPENSATION_COMPLETED: f64 = 2.0;

/// Validated transfers earn a size-weighted reward.
pub fn validated_delta(value: Value) -> f64 {
    if value < 100 {
        0.5
    } else if value < 10_000 {
        1.0
    } else {
        2.0
    }
}

/// Delta for one cause. `value` only matters for validated transfers.
pub fn delta_for(cause: TrustCause, value: Value) -> f64 {
    match cause {
        TrustCause::TransferValidated => validated_delta(value),
        TrustCause::TransferTimeout => DELTA_TIMEOUT,
        TrustCause::DisputeOpened => DELTA_DISPUTE_OPENED,
        TrustCause::DisputeLost => DELTA_DISPUTE_LOST,
        TrustCause::DisputeSplit => DELTA_DISPUTE_SPLIT,
        TrustCause::DisputeNoFault => DELTA_DISPUTE_NO_FAULT,
        TrustCause::CompensationCompleted => DELTA_COMPENSATION_COMPLETED,
    }
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Recompute the score from a full history. Equals the running score as
/// long as the ring has not yet evicted entries.
pub fn fold_score(history: &[TrustDelta]) -> f64 {
    history
        .iter()
        .fold(INITIAL_SCORE, |acc, d| clamp(acc + d.delta))
}

// ── Tiering ──────────────────────────────────────────────────────────────────

/// Platinum additionally requires volume and a clean dispute record.
pub fn tier_for(score: f64, total_transfers: u64, dispute_rate: f64) -> Tier {
    if total_transfers < 10 {
        return Tier::New;
    }
    if score >= 95.0 && total_transfers >= 100 && dispute_rate < 0.02 {
        Tier::Platinum
    } else if score >= 85.0 {
        Tier::Gold
    } else if score >= 70.0 {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

pub fn benefits_for(tier: Tier) -> &'static [Benefit] {
    match tier {
        Tier::New | Tier::Bronze => &[],
        Tier::Silver => &[Benefit::PrioritySupport],
        Tier::Gold => &[
            Benefit::PrioritySupport,
            Benefit::BatchOperations,
            Benefit::ReducedHoldTimes,
        ],
        Tier::Platinum => &[
            Benefit::PrioritySupport,
            Benefit::BatchOperations,
            Benefit::ReducedHoldTimes,
            Benefit::AutoApprovalLowValue,
        ],
    }
}

pub fn has_benefit(tier: Tier, benefit: Benefit) -> bool {
    benefits_for(tier).contains(&benefit)
}

// ── Applying a delta ─────────────────────────────────────────────────────────

/// Apply one cause to a trust record: push the history entry (evicting the
/// oldest past `cap`), update the running score and counters, recompute the
/// tier.
pub fn apply(
    trust: &mut ParticipantTrust,
    cause: TrustCause,
    value: Value,
    now: Timestamp,
    cap: usize,
) {
    let delta = delta_for(cause, value);
    trust.history.push(TrustDelta {
        delta,
        cause,
        at: now,
    });
    if trust.history.len() > cap {
        let excess = trust.history.len() - cap;
        trust.history.drain(..excess);
    }
    trust.score = clamp(trust.score + delta);

    match cause {
        TrustCause::TransferValidated => trust.total_transfers += 1,
        TrustCause::TransferTimeout => trust.timeout_count += 1,
        TrustCause::DisputeOpened => trust.dispute_count += 1,
        TrustCause::DisputeLost => trust.disputes_lost += 1,
        TrustCause::DisputeSplit | TrustCause::DisputeNoFault
        | TrustCause::CompensationCompleted => {}
    }

    trust.tier = tier_for(trust.score, trust.total_transfers, trust.dispute_rate());
    trust.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_core::types::ParticipantId;

    fn fresh(id: &str) -> ParticipantTrust {
        ParticipantTrust::new(ParticipantId::new(id), 0)
    }

    #[test]
    fn value_buckets() {
        assert_eq!(validated_delta(50), 0.5);
        assert_eq!(validated_delta(1_000), 1.0);
        assert_eq!(validated_delta(50_000), 2.0);
    }

    #[test]
    fn running_score_equals_fold_of_history() {
        let mut t = fresh("p");
        apply(&mut t, TrustCause::TransferValidated, 1_000, 1, 1024);
        apply(&mut t, TrustCause::DisputeOpened, 0, 2, 1024);
        apply(&mut t, TrustCause::DisputeLost, 0, 3, 1024);
        apply(&mut t, TrustCause::CompensationCompleted, 0, 4, 1024);
        assert_eq!(t.score, fold_score(&t.history));
        assert_eq!(t.score, 50.0 + 1.0 - 1.0 - 10.0 + 2.0);
    }

    #[test]
    fn score_clamps_at_both_ends() {
        let mut t = fresh("p");
        for n in 0..20 {
            apply(&mut t, TrustCause::DisputeLost, 0, n, 1024);
        }
        assert_eq!(t.score, 0.0);

        let mut u = fresh("q");
        for n in 0..60 {
            apply(&mut u, TrustCause::TransferValidated, 50_000, n, 1024);
        }
        assert_eq!(u.score, 100.0);
    }

    #[test]
    fn history_ring_is_capped() {
        let mut t = fresh("p");
        for n in 0..10 {
            apply(&mut t, TrustCause::TransferValidated, 100, n, 4);
        }
        assert_eq!(t.history.len(), 4);
        // The ring keeps the newest entries.
        assert_eq!(t.history[0].at, 6);
        assert_eq!(t.history[3].at, 9);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_for(99.0, 5, 0.0), Tier::New);
        assert_eq!(tier_for(60.0, 20, 0.0), Tier::Bronze);
        assert_eq!(tier_for(70.0, 20, 0.0), Tier::Silver);
        assert_eq!(tier_for(84.9, 20, 0.0), Tier::Silver);
        assert_eq!(tier_for(85.0, 20, 0.0), Tier::Gold);
        assert_eq!(tier_for(95.0, 20, 0.0), Tier::Gold); // volume short of platinum
        assert_eq!(tier_for(95.0, 100, 0.01), Tier::Platinum);
        assert_eq!(tier_for(95.0, 100, 0.05), Tier::Gold); // dispute rate too high
    }

    #[test]
    fn benefit_sets_grow_with_tier() {
        assert!(benefits_for(Tier::Bronze).is_empty());
        assert!(has_benefit(Tier::Silver, Benefit::PrioritySupport));
        assert!(has_benefit(Tier::Gold, Benefit::BatchOperations));
        assert!(has_benefit(Tier::Gold, Benefit::ReducedHoldTimes));
        assert!(!has_benefit(Tier::Gold, Benefit::AutoApprovalLowValue));
        assert!(has_benefit(Tier::Platinum, Benefit::AutoApprovalLowValue));
    }
}
