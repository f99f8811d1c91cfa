//! consign-store
//!
//! The persistence port (C3) and its two engines: a volatile in-memory
//! store for tests and a durable sled-backed store for the node. All
//! writes go through staged [`port::Batch`]es committed atomically under
//! optimistic per-entity versioning.

pub mod db;
pub mod memory;
pub mod port;

pub use db::SledStore;
pub use memory::MemStore;
pub use port::{Batch, Staged, Store};
