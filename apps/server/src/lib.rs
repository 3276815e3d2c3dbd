pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod sync_events;
pub mod transport;
mod main_lib;

pub use main_lib::{build_state, build_state_with_lookup, init_tracing, AppState};
