use consign_core::error::ConsignError;
use consign_core::trust::{ParticipantTrust, TrustDelta};
use consign_core::types::ParticipantId;
use consign_store::Store;

/// Read-side helpers over trust records.
pub struct TrustQuery<'a> {
    store: &'a dyn Store,
}

impl<'a> TrustQuery<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub fn get(&self, participant: &ParticipantId) -> Result<ParticipantTrust, ConsignError> {
        self.store
            .trust(participant)?
            .ok_or_else(|| ConsignError::TrustNotFound(participant.clone()))
    }

    /// Most recent deltas first, at most `limit`.
    pub fn history(
        &self,
        participant: &ParticipantId,
        limit: usize,
    ) -> Result<Vec<TrustDelta>, ConsignError> {
        let record = self.get(participant)?;
        Ok(record.history.into_iter().rev().take(limit).collect())
    }

    /// Participants ranked by score (ties broken by id for a stable order).
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<ParticipantTrust>, ConsignError> {
        let mut records = self.store.all_trust()?;
        records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        records.truncate(limit);
        Ok(records)
    }
}
