use crate::config::types::{GuestboxError, Result};
/// Supervisor configuration loaded from a JSON file
use crate::namespace::Policy;
use crate::properties::{ambient, PropertyScope};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_WORKER_PREFIX: &str = "guest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub policy: Policy,
    /// Seeded into the process property scope before the first launch.
    pub base_properties: BTreeMap<String, String>,
    pub worker_name_prefix: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            policy: Policy::Isolated,
            base_properties: BTreeMap::new(),
            worker_name_prefix: DEFAULT_WORKER_PREFIX.to_string(),
        }
    }
}

impl SupervisorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GuestboxError::Config(format!("Failed to read config file: {}", e)))?;

        let config: SupervisorConfig = serde_json::from_str(&content)
            .map_err(|e| GuestboxError::Config(format!("Failed to parse config JSON: {}", e)))?;

        if config.worker_name_prefix.trim().is_empty() {
            return Err(GuestboxError::Config(
                "worker_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Writes `base_properties` into the process scope. Existing keys are
    /// overwritten.
    pub(crate) fn seed_process_scope(&self) {
        self.seed_scope(ambient::process_scope());
    }

    pub(crate) fn seed_scope(&self, scope: &PropertyScope) {
        if self.base_properties.is_empty() {
            return;
        }
        scope.merge(&self.base_properties);
        debug!("Scope seeded with {} base properties", self.base_properties.len());
    }
}
