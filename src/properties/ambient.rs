//! Ambient property access.
//!
//! Guests read and write "global" settings through [`get_property`] and
//! [`set_property`]. Until a store is installed these go straight to the
//! single process-wide scope. Installing a store (the isolated supervisor
//! installs a context redirector) reroutes every ambient call through it.
//! A store can be installed once per process.

use super::{PropertyScope, PropertySnapshot};
use crate::config::types::{GuestboxError, Result};
use crate::logging::handler::CONSOLE_HANDLER;
use log::{debug, info};
use once_cell::sync::Lazy;
use std::sync::{Arc, OnceLock};

/// Property key holding the host operating system name.
pub const OS_NAME: &str = "os.name";
/// Property key holding the host CPU architecture.
pub const OS_ARCH: &str = "os.arch";
/// Property key holding the working directory of the host process.
pub const USER_DIR: &str = "user.dir";
/// Property key holding the crate version.
pub const VERSION: &str = "guestbox.version";

/// Root handlers every context starts with unless a launch overrides them.
pub const DEFAULT_LOG_HANDLERS: (&str, &str) = ("logging.handlers", CONSOLE_HANDLER);
/// Root level every context starts with.
pub const DEFAULT_LOG_LEVEL: (&str, &str) = ("logging..level", "INFO");

/// Kind of an installed ambient store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    /// Reads and writes hit one scope directly.
    Direct,
    /// Calls are forwarded to the calling thread's execution context.
    ContextRedirect,
    /// Anything supplied by an embedder.
    Custom,
}

/// Backend of the ambient property calls.
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Option<String>;
    fn remove(&self, key: &str) -> Option<String>;
    fn snapshot(&self) -> PropertySnapshot;

    fn kind(&self) -> StoreKind {
        StoreKind::Custom
    }
}

impl PropertyStore for PropertyScope {
    fn get(&self, key: &str) -> Option<String> {
        PropertyScope::get(self, key)
    }

    fn set(&self, key: &str, value: &str) -> Option<String> {
        PropertyScope::set(self, key, value)
    }

    fn remove(&self, key: &str) -> Option<String> {
        PropertyScope::remove(self, key)
    }

    fn snapshot(&self) -> PropertySnapshot {
        PropertyScope::snapshot(self)
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Direct
    }
}

static PROCESS_SCOPE: Lazy<Arc<PropertyScope>> = Lazy::new(|| {
    let scope = PropertyScope::new();
    scope.set(OS_NAME, std::env::consts::OS);
    scope.set(OS_ARCH, std::env::consts::ARCH);
    scope.set(VERSION, env!("CARGO_PKG_VERSION"));
    for (key, value) in [DEFAULT_LOG_HANDLERS, DEFAULT_LOG_LEVEL] {
        scope.set(key, value);
    }
    if let Ok(dir) = std::env::current_dir() {
        scope.set(USER_DIR, dir.to_string_lossy());
    }
    debug!("Process property scope seeded with {} entries", scope.snapshot().len());
    Arc::new(scope)
});

static INSTALLED: OnceLock<Arc<dyn PropertyStore>> = OnceLock::new();

/// The single process-wide scope.
pub fn process_scope() -> &'static Arc<PropertyScope> {
    &PROCESS_SCOPE
}

/// Installs `store` as the target of every ambient property call.
///
/// A second installation is rejected with [`GuestboxError::Ambient`] and
/// leaves the first store in place. This function does not check whether
/// contexts already exist; the isolated supervisor refuses to install its
/// redirector once any context has been launched.
pub fn install(store: Arc<dyn PropertyStore>) -> Result<()> {
    let kind = store.kind();
    INSTALLED.set(store).map_err(|_| {
        GuestboxError::Ambient(format!(
            "an ambient property store is already installed ({:?})",
            installed_kind().unwrap_or(StoreKind::Custom)
        ))
    })?;
    info!("Ambient property store installed ({:?})", kind);
    Ok(())
}

pub fn installed() -> Option<&'static Arc<dyn PropertyStore>> {
    INSTALLED.get()
}

pub fn installed_kind() -> Option<StoreKind> {
    INSTALLED.get().map(|store| store.kind())
}

fn store() -> &'static dyn PropertyStore {
    match INSTALLED.get() {
        Some(store) => store.as_ref(),
        None => PROCESS_SCOPE.as_ref(),
    }
}

pub fn get_property(key: &str) -> Option<String> {
    store().get(key)
}

pub fn set_property(key: &str, value: &str) -> Option<String> {
    store().set(key, value)
}

pub fn remove_property(key: &str) -> Option<String> {
    store().remove(key)
}

/// Snapshot of the properties visible to the calling thread.
pub fn snapshot() -> PropertySnapshot {
    store().snapshot()
}
