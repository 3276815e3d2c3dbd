//! Health report models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate health of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Ok,
    Degraded,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Ok => "ok",
            HealthState::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of checking the required configuration keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthState,
    /// Presence of each required key
    pub checks: BTreeMap<String, bool>,
    /// One entry per missing key
    pub warnings: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Ok
    }

    /// HTTP status the health endpoint answers with.
    pub fn status_code(&self) -> u16 {
        match self.status {
            HealthState::Ok => 200,
            HealthState::Degraded => 503,
        }
    }

    /// Keys reported as missing, in key order.
    pub fn missing_keys(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, present)| !**present)
            .map(|(key, _)| key.as_str())
            .collect()
    }
}
