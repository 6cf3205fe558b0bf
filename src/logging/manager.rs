use crate::config::types::Result;
use crate::properties::PropertySnapshot;
use log::debug;
use std::sync::{Mutex, PoisonError, RwLock};

/// Property naming a custom log manager to resolve through the namespace.
pub const MANAGER_PROPERTY: &str = "logging.manager";

/// Prefix of the logging keys inside a context's property scope.
pub const CONFIG_PREFIX: &str = "logging.";

/// Reserved manager name selecting [`DefaultLogManager`].
pub const DEFAULT_MANAGER: &str = "guestbox.logging.DefaultLogManager";

/// Called whenever a manager's configuration changes.
pub type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// Holds the logging configuration of one context.
pub trait LogManager: Send + Sync {
    /// Replaces the configuration with the logging keys of `properties`
    /// and notifies change listeners.
    fn read_configuration(&self, properties: &PropertySnapshot) -> Result<()>;

    /// Looks up a configuration key (without the `logging.` prefix).
    fn property(&self, key: &str) -> Option<String>;

    fn add_change_listener(&self, listener: ChangeListener);
}

/// Manager reading `logging.*` keys from the context's own properties.
#[derive(Default)]
pub struct DefaultLogManager {
    config: RwLock<PropertySnapshot>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl DefaultLogManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener();
        }
    }
}

impl LogManager for DefaultLogManager {
    fn read_configuration(&self, properties: &PropertySnapshot) -> Result<()> {
        let config = properties.strip_prefix(CONFIG_PREFIX);
        debug!("Log configuration read with {} keys", config.len());
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        self.notify();
        Ok(())
    }

    fn property(&self, key: &str) -> Option<String> {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(str::to_string)
    }

    fn add_change_listener(&self, listener: ChangeListener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
