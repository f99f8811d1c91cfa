//! Volatile store used by tests and the scenario suite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use consign_core::compensation::Compensation;
use consign_core::dispute::{Dispute, DisputeStatus};
use consign_core::error::ConsignError;
use consign_core::stop::EmergencyStop;
use consign_core::transfer::{Transfer, TransferState};
use consign_core::trust::ParticipantTrust;
use consign_core::types::{
    CompensationId, DisputeId, ParticipantId, StopId, Timestamp, TransferId, Version,
};

use crate::port::{Batch, Staged, Store};

#[derive(Default)]
struct Inner {
    transfers: BTreeMap<String, Transfer>,
    disputes: BTreeMap<String, Dispute>,
    trust: BTreeMap<String, ParticipantTrust>,
    stops: BTreeMap<String, EmergencyStop>,
    compensations: BTreeMap<String, Compensation>,
}

/// In-memory [`Store`]. A single mutex serializes commits, which also makes
/// the expected-version checks race-free.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check<T>(
    map: &BTreeMap<String, T>,
    key: &str,
    staged_expected: Version,
    entity: &'static str,
    version_of: impl Fn(&T) -> Version,
) -> Result<(), ConsignError> {
    let found = map.get(key).map(&version_of).unwrap_or(0);
    if found != staged_expected {
        return Err(ConsignError::VersionConflict {
            entity,
            expected: staged_expected,
            found,
        });
    }
    Ok(())
}

impl Store for MemStore {
    fn transfer(&self, id: &TransferId) -> Result<Option<Transfer>, ConsignError> {
        Ok(self.inner.lock().unwrap().transfers.get(id.as_str()).cloned())
    }

    fn dispute(&self, id: &DisputeId) -> Result<Option<Dispute>, ConsignError> {
        Ok(self.inner.lock().unwrap().disputes.get(id.as_str()).cloned())
    }

    fn trust(&self, id: &ParticipantId) -> Result<Option<ParticipantTrust>, ConsignError> {
        Ok(self.inner.lock().unwrap().trust.get(id.as_str()).cloned())
    }

    fn stop(&self, id: &StopId) -> Result<Option<EmergencyStop>, ConsignError> {
        Ok(self.inner.lock().unwrap().stops.get(id.as_str()).cloned())
    }

    fn compensation(&self, id: &CompensationId) -> Result<Option<Compensation>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .compensations
            .get(id.as_str())
            .cloned())
    }

    fn compensation_for_parent(
        &self,
        parent: &TransferId,
    ) -> Result<Option<Compensation>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .compensations
            .values()
            .find(|c| c.parent_id == *parent)
            .cloned())
    }

    fn transfers_for_participant(
        &self,
        p: &ParticipantId,
    ) -> Result<Vec<Transfer>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transfers
            .values()
            .filter(|t| t.is_party(p))
            .cloned()
            .collect())
    }

    fn live_transfers(&self) -> Result<Vec<Transfer>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transfers
            .values()
            .filter(|t| !t.state.is_terminal())
            .cloned()
            .collect())
    }

    fn transfers_due(&self, t: Timestamp) -> Result<Vec<Transfer>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transfers
            .values()
            .filter(|x| {
                x.timeout_at <= t
                    && matches!(
                        x.state,
                        TransferState::Initiated | TransferState::SenderConfirmed
                    )
            })
            .cloned()
            .collect())
    }

    fn disputes_for_transfer(&self, id: &TransferId) -> Result<Vec<Dispute>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .disputes
            .values()
            .filter(|d| d.transfer_id == *id)
            .cloned()
            .collect())
    }

    fn open_disputes(&self) -> Result<Vec<Dispute>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .disputes
            .values()
            .filter(|d| {
                matches!(d.status, DisputeStatus::Open | DisputeStatus::Investigating)
            })
            .cloned()
            .collect())
    }

    fn active_stops(&self) -> Result<Vec<EmergencyStop>, ConsignError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .stops
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }

    fn all_trust(&self) -> Result<Vec<ParticipantTrust>, ConsignError> {
        Ok(self.inner.lock().unwrap().trust.values().cloned().collect())
    }

    fn commit(&self, batch: Batch) -> Result<(), ConsignError> {
        let mut inner = self.inner.lock().unwrap();

        // Verify every expectation before touching anything.
        for Staged { entity, expected } in &batch.transfers {
            check(&inner.transfers, entity.id.as_str(), *expected, "transfer", |t| t.version)?;
        }
        for Staged { entity, expected } in &batch.disputes {
            check(&inner.disputes, entity.id.as_str(), *expected, "dispute", |d| d.version)?;
        }
        for Staged { entity, expected } in &batch.trust {
            check(
                &inner.trust,
                entity.participant_id.as_str(),
                *expected,
                "trust",
                |t| t.version,
            )?;
        }
        for Staged { entity, expected } in &batch.stops {
            check(&inner.stops, entity.id.as_str(), *expected, "stop", |s| s.version)?;
        }
        for Staged { entity, expected } in &batch.compensations {
            check(
                &inner.compensations,
                entity.id.as_str(),
                *expected,
                "compensation",
                |c| c.version,
            )?;
        }

        for Staged { entity, .. } in batch.transfers {
            inner.transfers.insert(entity.id.as_str().to_string(), entity);
        }
        for Staged { entity, .. } in batch.disputes {
            inner.disputes.insert(entity.id.as_str().to_string(), entity);
        }
        for Staged { entity, .. } in batch.trust {
            inner
                .trust
                .insert(entity.participant_id.as_str().to_string(), entity);
        }
        for Staged { entity, .. } in batch.stops {
            inner.stops.insert(entity.id.as_str().to_string(), entity);
        }
        for Staged { entity, .. } in batch.compensations {
            inner
                .compensations
                .insert(entity.id.as_str().to_string(), entity);
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), ConsignError> {
        Ok(())
    }
}
