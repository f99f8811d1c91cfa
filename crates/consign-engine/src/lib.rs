//! consign-engine
//!
//! The transfer state machine and everything that drives it: pure
//! transition functions ([`machine`]), the versioned read-modify-write
//! engine ([`engine`]), the emergency stop controller ([`stop`]), the
//! policy gateway ([`policy`]), and the coordinator façade
//! ([`coordinator`]) that external transports call into.

pub mod coordinator;
pub mod engine;
pub mod machine;
pub mod policy;
pub mod stop;

pub use coordinator::{BatchFailure, BatchReport, Coordinator, MAX_BATCH};
pub use engine::{EvidenceInput, NewTransfer, TransferEngine};
pub use stop::StopController;
