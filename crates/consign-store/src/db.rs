//! Durable store backed by sled (pure-Rust, no C dependencies).
//!
//! Named trees:
//!   transfers     — id utf8 bytes → bincode(Transfer)
//!   disputes      — id utf8 bytes → bincode(Dispute)
//!   trust         — participant id bytes → bincode(ParticipantTrust)
//!   stops         — id utf8 bytes → bincode(EmergencyStop)
//!   compensations — id utf8 bytes → bincode(Compensation)
//!
//! Commits run under a single writer lock; the expected-version checks and
//! the tree inserts therefore observe a consistent snapshot, and the flush
//! happens before `commit` returns so nothing is acknowledged until durable.

use std::path::Path;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

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

pub struct SledStore {
    _db: sled::Db,
    transfers: sled::Tree,
    disputes: sled::Tree,
    trust: sled::Tree,
    stops: sled::Tree,
    compensations: sled::Tree,
    write_lock: Mutex<()>,
}

fn storage_err(e: impl std::fmt::Display) -> ConsignError {
    ConsignError::Storage(e.to_string())
}

fn codec_err(e: impl std::fmt::Display) -> ConsignError {
    ConsignError::Serialization(e.to_string())
}

fn get<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>, ConsignError> {
    match tree.get(key.as_bytes()).map_err(storage_err)? {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(codec_err)?)),
        None => Ok(None),
    }
}

fn scan<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, ConsignError> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_, bytes) = item.map_err(storage_err)?;
        out.push(bincode::deserialize(&bytes).map_err(codec_err)?);
    }
    Ok(out)
}

fn put<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> Result<(), ConsignError> {
    let bytes = bincode::serialize(value).map_err(codec_err)?;
    tree.insert(key.as_bytes(), bytes).map_err(storage_err)?;
    Ok(())
}

impl SledStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConsignError> {
        let db = sled::open(path).map_err(storage_err)?;
        let transfers = db.open_tree("transfers").map_err(storage_err)?;
        let disputes = db.open_tree("disputes").map_err(storage_err)?;
        let trust = db.open_tree("trust").map_err(storage_err)?;
        let stops = db.open_tree("stops").map_err(storage_err)?;
        let compensations = db.open_tree("compensations").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            transfers,
            disputes,
            trust,
            stops,
            compensations,
            write_lock: Mutex::new(()),
        })
    }

    fn check_expected<T: DeserializeOwned>(
        &self,
        tree: &sled::Tree,
        key: &str,
        expected: Version,
        entity: &'static str,
        version_of: impl Fn(&T) -> Version,
    ) -> Result<(), ConsignError> {
        let found = get::<T>(tree, key)?.map(|t| version_of(&t)).unwrap_or(0);
        if found != expected {
            return Err(ConsignError::VersionConflict {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }
}

impl Store for SledStore {
    fn transfer(&self, id: &TransferId) -> Result<Option<Transfer>, ConsignError> {
        get(&self.transfers, id.as_str())
    }

    fn dispute(&self, id: &DisputeId) -> Result<Option<Dispute>, ConsignError> {
        get(&self.disputes, id.as_str())
    }

    fn trust(&self, id: &ParticipantId) -> Result<Option<ParticipantTrust>, ConsignError> {
        get(&self.trust, id.as_str())
    }

    fn stop(&self, id: &StopId) -> Result<Option<EmergencyStop>, ConsignError> {
        get(&self.stops, id.as_str())
    }

    fn compensation(&self, id: &CompensationId) -> Result<Option<Compensation>, ConsignError> {
        get(&self.compensations, id.as_str())
    }

    fn compensation_for_parent(
        &self,
        parent: &TransferId,
    ) -> Result<Option<Compensation>, ConsignError> {
        Ok(scan::<Compensation>(&self.compensations)?
            .into_iter()
            .find(|c| c.parent_id == *parent))
    }

    fn transfers_for_participant(
        &self,
        p: &ParticipantId,
    ) -> Result<Vec<Transfer>, ConsignError> {
        Ok(scan::<Transfer>(&self.transfers)?
            .into_iter()
            .filter(|t| t.is_party(p))
            .collect())
    }

    fn live_transfers(&self) -> Result<Vec<Transfer>, ConsignError> {
        Ok(scan::<Transfer>(&self.transfers)?
            .into_iter()
            .filter(|t| !t.state.is_terminal())
            .collect())
    }

    fn transfers_due(&self, t: Timestamp) -> Result<Vec<Transfer>, ConsignError> {
        Ok(scan::<Transfer>(&self.transfers)?
            .into_iter()
            .filter(|x| {
                x.timeout_at <= t
                    && matches!(
                        x.state,
                        TransferState::Initiated | TransferState::SenderConfirmed
                    )
            })
            .collect())
    }

    fn disputes_for_transfer(&self, id: &TransferId) -> Result<Vec<Dispute>, ConsignError> {
        Ok(scan::<Dispute>(&self.disputes)?
            .into_iter()
            .filter(|d| d.transfer_id == *id)
            .collect())
    }

    fn open_disputes(&self) -> Result<Vec<Dispute>, ConsignError> {
        Ok(scan::<Dispute>(&self.disputes)?
            .into_iter()
            .filter(|d| matches!(d.status, DisputeStatus::Open | DisputeStatus::Investigating))
            .collect())
    }

    fn active_stops(&self) -> Result<Vec<EmergencyStop>, ConsignError> {
        Ok(scan::<EmergencyStop>(&self.stops)?
            .into_iter()
            .filter(|s| s.is_active())
            .collect())
    }

    fn all_trust(&self) -> Result<Vec<ParticipantTrust>, ConsignError> {
        scan(&self.trust)
    }

    fn commit(&self, batch: Batch) -> Result<(), ConsignError> {
        let _guard = self.write_lock.lock().unwrap();

        for Staged { entity, expected } in &batch.transfers {
            self.check_expected::<Transfer>(
                &self.transfers,
                entity.id.as_str(),
                *expected,
                "transfer",
                |t| t.version,
            )?;
        }
        for Staged { entity, expected } in &batch.disputes {
            self.check_expected::<Dispute>(
                &self.disputes,
                entity.id.as_str(),
                *expected,
                "dispute",
                |d| d.version,
            )?;
        }
        for Staged { entity, expected } in &batch.trust {
            self.check_expected::<ParticipantTrust>(
                &self.trust,
                entity.participant_id.as_str(),
                *expected,
                "trust",
                |t| t.version,
            )?;
        }
        for Staged { entity, expected } in &batch.stops {
            self.check_expected::<EmergencyStop>(
                &self.stops,
                entity.id.as_str(),
                *expected,
                "stop",
                |s| s.version,
            )?;
        }
        for Staged { entity, expected } in &batch.compensations {
            self.check_expected::<Compensation>(
                &self.compensations,
                entity.id.as_str(),
                *expected,
                "compensation",
                |c| c.version,
            )?;
        }

        for Staged { entity, .. } in &batch.transfers {
            put(&self.transfers, entity.id.as_str(), entity)?;
        }
        for Staged { entity, .. } in &batch.disputes {
            put(&self.disputes, entity.id.as_str(), entity)?;
        }
        for Staged { entity, .. } in &batch.trust {
            put(&self.trust, entity.participant_id.as_str(), entity)?;
        }
        for Staged { entity, .. } in &batch.stops {
            put(&self.stops, entity.id.as_str(), entity)?;
        }
        for Staged { entity, .. } in &batch.compensations {
            put(&self.compensations, entity.id.as_str(), entity)?;
        }

        self._db.flush().map_err(storage_err)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), ConsignError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}
