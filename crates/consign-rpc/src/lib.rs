//! consign-rpc
//!
//! JSON-RPC 2.0 adapter over the consensus coordinator. Transport only:
//! every method parses wire strings into core types, calls the
//! coordinator, and maps the typed error taxonomy to stable wire codes.
//! Authentication is upstream; methods receive the authenticated
//! principal id and role verbatim.

pub mod api;
pub mod server;
pub mod types;

pub use server::RpcServer;
