//! Bootstrap records: explicit seed participants loaded into a fresh
//! store. Replaces nothing that already exists, so re-running a node
//! against a populated database is a no-op.

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use consign_core::trust::ParticipantTrust;
use consign_core::types::{ParticipantId, Timestamp};
use consign_store::{Batch, Store};
use consign_trust::score;

/// One seed participant from the bootstrap JSON file.
#[derive(Debug, Deserialize)]
pub struct SeedParticipant {
    pub id: String,
    #[serde(default = "default_score")]
    pub score: f64,
    #[serde(default)]
    pub total_transfers: u64,
}

fn default_score() -> f64 {
    consign_core::trust::INITIAL_SCORE
}

/// Load seed participants from `path` and insert any that are missing.
/// Returns how many records were created.
pub fn apply_bootstrap(
    store: &dyn Store,
    path: &std::path::Path,
    now: Timestamp,
) -> anyhow::Result<usize> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading bootstrap file {}", path.display()))?;
    let seeds: Vec<SeedParticipant> =
        serde_json::from_str(&json).context("parsing bootstrap JSON")?;

    let mut batch = Batch::new();
    let mut created = 0usize;
    for seed in seeds {
        let id = ParticipantId::new(&seed.id);
        if store.trust(&id)?.is_some() {
            continue;
        }
        let mut record = ParticipantTrust::new(id, now);
        record.score = seed.score.clamp(0.0, 100.0);
        record.total_transfers = seed.total_transfers;
        record.tier = score::tier_for(record.score, record.total_transfers, 0.0);
        batch.put_trust(record, 0);
        created += 1;
    }
    if !batch.is_empty() {
        store.commit(batch)?;
    }
    info!(created, "bootstrap records applied");
    Ok(created)
}
