//! Tenderdesk Core - interaction primitives, offline sync and health reporting.
//!
//! This crate holds the pieces of the tender CRM that carry real state or
//! timing semantics. It has no HTTP dependency; the `tenderdesk-server` app
//! wires it into the API.

pub mod errors;
pub mod format;
pub mod health;
pub mod interaction;
pub mod sync;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
