//! Configuration health reporting.
//!
//! The deployment is healthy when every required configuration key is set.
//! Each missing key yields a warning, and the report maps to HTTP 200 when
//! nothing is missing and 503 otherwise.
//!
//! - **Models** (`model.rs`) - `HealthState`, `HealthReport`
//! - **Service** (`service.rs`) - runs the key checks against a `ConfigLookup`

pub mod model;
pub mod service;

pub use model::{HealthReport, HealthState};
pub use service::{ConfigLookup, EnvLookup, HealthService, MapLookup};
