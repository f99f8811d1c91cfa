use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

/// Duration in seconds. All policy windows are expressed in this unit.
pub type DurationSecs = i64;

/// Optimistic-concurrency version. Versions start at 1; an expected version
/// of 0 means "the entity must not exist yet".
pub type Version = u64;

/// Monetary value in minor currency units. Non-negative by construction.
pub type Value = u64;

/// Hex-encode 16 fresh random bytes. All server-generated identifiers use
/// this; they are opaque and never parsed.
fn random_suffix() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

// ── ParticipantId ────────────────────────────────────────────────────────────

/// Identifier of a supply-chain participant, assigned by the external
/// authentication layer. Opaque to the engine.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

// ── TransferId ───────────────────────────────────────────────────────────────

/// Server-generated identifier of a custody transfer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn generate() -> Self {
        Self(random_suffix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({}…)", &self.0[..self.0.len().min(8)])
    }
}

// ── DisputeId ────────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisputeId(pub String);

impl DisputeId {
    pub fn generate() -> Self {
        Self(random_suffix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisputeId({}…)", &self.0[..self.0.len().min(8)])
    }
}

// ── EvidenceId ───────────────────────────────────────────────────────────────

/// Identifier of one evidence entry. Embeds the creation timestamp plus a
/// random suffix for uniqueness; consumers must not parse it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct EvidenceId(pub String);

impl EvidenceId {
    pub fn generate(now: Timestamp) -> Self {
        let mut buf = [0u8; 6];
        rand::thread_rng().fill_bytes(&mut buf);
        Self(format!("{}-{}", now, hex::encode(buf)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── StopId / CompensationId ──────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct StopId(pub String);

impl StopId {
    pub fn generate() -> Self {
        Self(random_suffix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ES:{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct CompensationId(pub String);

impl CompensationId {
    pub fn generate() -> Self {
        Self(random_suffix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompensationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── ContentRef ───────────────────────────────────────────────────────────────

/// Content-addressed reference to an attachment held by external blob
/// storage. The engine stores only the BLAKE3 digest; it is a commitment,
/// never interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Caller-supplied file name, for display only.
    pub name: String,
    /// BLAKE3 digest of the attachment bytes, hex-encoded.
    pub digest: String,
}

impl ContentRef {
    /// Build a reference by hashing the attachment bytes.
    pub fn for_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            digest: blake3::hash(bytes).to_hex().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TransferId::generate();
        let b = TransferId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn evidence_id_embeds_timestamp() {
        let id = EvidenceId::generate(1_700_000_000);
        assert!(id.as_str().starts_with("1700000000-"));
    }

    #[test]
    fn content_ref_digest_is_stable() {
        let a = ContentRef::for_bytes("photo.jpg", b"pixels");
        let b = ContentRef::for_bytes("photo.jpg", b"pixels");
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
    }
}
