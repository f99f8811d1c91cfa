//! consign-dispute
//!
//! Dispute-engine rules and queries (C5). The lifecycle transitions
//! themselves run inside the engine crate so they share the transfer's
//! unit of work; this crate owns the pure admission rules (who may file,
//! who may append evidence, which remedies each dispute type admits) and
//! the read side.

pub mod query;
pub mod rules;

pub use query::DisputeQuery;
