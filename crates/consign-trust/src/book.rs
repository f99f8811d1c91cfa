//! The trust book: a batch hook that stages score mutations in the same
//! unit of work as the state change that caused them.
//!
//! The engine opens a book per operation, records causes against the
//! involved parties, and folds the touched records into its staged batch.
//! Trust therefore commits (or rolls back) atomically with the transfer
//! transition; `trust.updated` events go out only after the commit.

use std::collections::BTreeMap;

use tracing::debug;

use consign_core::error::ConsignError;
use consign_core::event::EngineEvent;
use consign_core::trust::{ParticipantTrust, TrustCause};
use consign_core::types::{ParticipantId, Timestamp, Value, Version};
use consign_store::{Batch, Store};

use crate::score;

pub struct TrustBook {
    history_cap: usize,
    touched: BTreeMap<ParticipantId, (ParticipantTrust, Version)>,
}

impl TrustBook {
    pub fn new(history_cap: usize) -> Self {
        Self {
            history_cap,
            touched: BTreeMap::new(),
        }
    }

    /// Record one cause against a participant, loading (or creating) their
    /// record on first touch.
    pub fn record(
        &mut self,
        store: &dyn Store,
        participant: &ParticipantId,
        cause: TrustCause,
        value: Value,
        now: Timestamp,
    ) -> Result<(), ConsignError> {
        if !self.touched.contains_key(participant) {
            let (record, expected) = match store.trust(participant)? {
                Some(existing) => {
                    let expected = existing.version;
                    let mut record = existing;
                    record.version = expected + 1;
                    (record, expected)
                }
                None => (ParticipantTrust::new(participant.clone(), now), 0),
            };
            self.touched.insert(participant.clone(), (record, expected));
        }

        let (record, _) = self.touched.get_mut(participant).expect("just inserted");
        score::apply(record, cause, value, now, self.history_cap);
        debug!(participant = %participant, ?cause, score = record.score, "trust delta");
        Ok(())
    }

    /// Current tier of a participant as staged in this book, if touched.
    pub fn staged(&self, participant: &ParticipantId) -> Option<&ParticipantTrust> {
        self.touched.get(participant).map(|(r, _)| r)
    }

    /// Fold the touched records into `batch` and return the `trust.updated`
    /// events to publish after the commit.
    pub fn stage(self, batch: &mut Batch) -> Vec<EngineEvent> {
        let mut events = Vec::with_capacity(self.touched.len());
        for (_, (record, expected)) in self.touched {
            events.push(EngineEvent::TrustUpdated {
                participant_id: record.participant_id.clone(),
                score: record.score,
                tier: record.tier,
                at: record.updated_at,
            });
            batch.put_trust(record, expected);
        }
        events
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }
}
