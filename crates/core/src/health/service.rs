//! Health service.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::model::{HealthReport, HealthState};

/// Read access to configuration values.
pub trait ConfigLookup: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Looks keys up in the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl ConfigLookup for EnvLookup {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of values, used by tests and embedded callers.
#[derive(Debug, Clone, Default)]
pub struct MapLookup(HashMap<String, String>);

impl MapLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl ConfigLookup for MapLookup {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Checks that every required configuration key is present.
#[derive(Debug, Clone)]
pub struct HealthService {
    required_keys: Vec<String>,
}

impl HealthService {
    pub fn new<I, S>(required_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let required_keys = required_keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        Self { required_keys }
    }

    pub fn required_keys(&self) -> &[String] {
        &self.required_keys
    }

    pub fn check(&self, lookup: &dyn ConfigLookup) -> HealthReport {
        self.check_at(lookup, Utc::now())
    }

    /// Runs the check with a fixed timestamp (for testing).
    pub fn check_at(&self, lookup: &dyn ConfigLookup, now: DateTime<Utc>) -> HealthReport {
        let mut checks = BTreeMap::new();
        let mut warnings = Vec::new();

        for key in &self.required_keys {
            // Blank values count as missing.
            let present = lookup
                .get(key)
                .is_some_and(|value| !value.trim().is_empty());
            if !present {
                warnings.push(format!("Missing required configuration: {key}"));
            }
            checks.insert(key.clone(), present);
        }

        let status = if warnings.is_empty() {
            HealthState::Ok
        } else {
            log::warn!("Health check degraded: {}", warnings.join("; "));
            HealthState::Degraded
        };

        HealthReport {
            status,
            checks,
            warnings,
            checked_at: now,
        }
    }
}
