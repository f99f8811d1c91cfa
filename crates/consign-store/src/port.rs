//! The persistence port: entity reads, range scans, and atomic staged
//! commits under optimistic concurrency.
//!
//! Every entity carries a monotonically increasing `version`. Writers read
//! an entity at version `v`, mutate a copy, bump it to `v + 1`, and stage it
//! with `expected = v`. [`Store::commit`] verifies every expectation against
//! current state and applies the whole batch or nothing; a mismatch fails
//! with `Conflict` and the caller re-reads and retries.

use consign_core::compensation::Compensation;
use consign_core::dispute::Dispute;
use consign_core::error::ConsignError;
use consign_core::stop::EmergencyStop;
use consign_core::transfer::Transfer;
use consign_core::trust::ParticipantTrust;
use consign_core::types::{
    CompensationId, DisputeId, ParticipantId, StopId, Timestamp, TransferId, Version,
};

/// One staged write: the new entity state plus the version the writer
/// observed. `expected = 0` asserts the entity does not exist yet.
#[derive(Clone, Debug)]
pub struct Staged<T> {
    pub entity: T,
    pub expected: Version,
}

/// A unit of work. All writes in a batch become visible atomically; on any
/// version mismatch nothing is applied.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub transfers: Vec<Staged<Transfer>>,
    pub disputes: Vec<Staged<Dispute>>,
    pub trust: Vec<Staged<ParticipantTrust>>,
    pub stops: Vec<Staged<EmergencyStop>>,
    pub compensations: Vec<Staged<Compensation>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_transfer(&mut self, entity: Transfer, expected: Version) -> &mut Self {
        self.transfers.push(Staged { entity, expected });
        self
    }

    pub fn put_dispute(&mut self, entity: Dispute, expected: Version) -> &mut Self {
        self.disputes.push(Staged { entity, expected });
        self
    }

    pub fn put_trust(&mut self, entity: ParticipantTrust, expected: Version) -> &mut Self {
        self.trust.push(Staged { entity, expected });
        self
    }

    pub fn put_stop(&mut self, entity: EmergencyStop, expected: Version) -> &mut Self {
        self.stops.push(Staged { entity, expected });
        self
    }

    pub fn put_compensation(&mut self, entity: Compensation, expected: Version) -> &mut Self {
        self.compensations.push(Staged { entity, expected });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
            && self.disputes.is_empty()
            && self.trust.is_empty()
            && self.stops.is_empty()
            && self.compensations.is_empty()
    }
}

/// Abstract persistence capability. Implementations may be in-memory (for
/// tests) or durable; reads return detached copies.
pub trait Store: Send + Sync {
    // ── Point reads ──────────────────────────────────────────────────────────

    fn transfer(&self, id: &TransferId) -> Result<Option<Transfer>, ConsignError>;
    fn dispute(&self, id: &DisputeId) -> Result<Option<Dispute>, ConsignError>;
    fn trust(&self, id: &ParticipantId) -> Result<Option<ParticipantTrust>, ConsignError>;
    fn stop(&self, id: &StopId) -> Result<Option<EmergencyStop>, ConsignError>;
    fn compensation(&self, id: &CompensationId) -> Result<Option<Compensation>, ConsignError>;

    /// The compensation record tracking a given parent transfer, if any.
    fn compensation_for_parent(
        &self,
        parent: &TransferId,
    ) -> Result<Option<Compensation>, ConsignError>;

    // ── Scans ────────────────────────────────────────────────────────────────

    /// Every transfer where `p` is sender or receiver.
    fn transfers_for_participant(&self, p: &ParticipantId)
        -> Result<Vec<Transfer>, ConsignError>;

    /// Non-terminal transfers, for emergency-stop admission and startup
    /// rehydration.
    fn live_transfers(&self) -> Result<Vec<Transfer>, ConsignError>;

    /// Transfers whose confirmation deadline is at or before `t` and that
    /// still await a confirmation. Used by scheduler replay.
    fn transfers_due(&self, t: Timestamp) -> Result<Vec<Transfer>, ConsignError>;

    fn disputes_for_transfer(&self, id: &TransferId) -> Result<Vec<Dispute>, ConsignError>;

    /// Disputes still awaiting resolution (open or investigating).
    fn open_disputes(&self) -> Result<Vec<Dispute>, ConsignError>;

    fn active_stops(&self) -> Result<Vec<EmergencyStop>, ConsignError>;

    /// Every trust record; the leaderboard sorts a copy.
    fn all_trust(&self) -> Result<Vec<ParticipantTrust>, ConsignError>;

    // ── Writes ───────────────────────────────────────────────────────────────

    /// Apply a staged batch atomically. Fails with
    /// [`ConsignError::VersionConflict`] on the first expectation that does
    /// not hold; in that case no write is applied.
    fn commit(&self, batch: Batch) -> Result<(), ConsignError>;

    /// Flush buffered writes to durable media. No-op for volatile stores.
    fn flush(&self) -> Result<(), ConsignError>;
}
