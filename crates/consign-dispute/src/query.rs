use consign_core::dispute::Dispute;
use consign_core::error::ConsignError;
use consign_core::types::{DisputeId, ParticipantId, TransferId};
use consign_store::Store;

/// Read-side helpers over dispute records.
pub struct DisputeQuery<'a> {
    store: &'a dyn Store,
}

impl<'a> DisputeQuery<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &DisputeId) -> Result<Dispute, ConsignError> {
        self.store
            .dispute(id)?
            .ok_or_else(|| ConsignError::DisputeNotFound(id.clone()))
    }

    /// All disputes ever raised on a transfer, oldest first.
    pub fn for_transfer(&self, id: &TransferId) -> Result<Vec<Dispute>, ConsignError> {
        let mut disputes = self.store.disputes_for_transfer(id)?;
        disputes.sort_by_key(|d| d.opened_at);
        Ok(disputes)
    }

    /// Unresolved disputes a participant is involved in.
    pub fn open_for_participant(
        &self,
        p: &ParticipantId,
    ) -> Result<Vec<Dispute>, ConsignError> {
        Ok(self
            .store
            .open_disputes()?
            .into_iter()
            .filter(|d| d.is_party(p))
            .collect())
    }
}
