/// Code-location resolution
///
/// Turning a code location into loadable units is the job of a
/// [`CodeResolver`]. [`Catalog`] is the in-process implementation: a
/// registry of libraries keyed by location.
use super::library::Library;
use crate::config::types::{GuestboxError, Result};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Suffix that expands a location to every library registered below it.
pub const WILDCARD_SUFFIX: &str = "/*";

pub trait CodeResolver: Send + Sync {
    /// Resolves one location. Wildcard locations may yield several libraries.
    fn resolve(&self, location: &str) -> Result<Vec<Arc<Library>>>;
}

#[derive(Debug, Default)]
pub struct Catalog {
    libraries: RwLock<BTreeMap<String, Arc<Library>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(self, library: Library) -> Self {
        self.register(library);
        self
    }

    /// Registers `library` under its location, replacing any previous one.
    pub fn register(&self, library: Library) -> Option<Arc<Library>> {
        let location = library.location().to_string();
        self.libraries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, Arc::new(library))
    }

    pub fn get(&self, location: &str) -> Option<Arc<Library>> {
        self.libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }

    pub fn locations(&self) -> Vec<String> {
        self.libraries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl CodeResolver for Catalog {
    fn resolve(&self, location: &str) -> Result<Vec<Arc<Library>>> {
        if location.trim().is_empty() {
            return Err(GuestboxError::CodeLocation("empty code location".to_string()));
        }

        let libraries = self.libraries.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = location.strip_suffix(WILDCARD_SUFFIX) {
            let prefix = format!("{dir}/");
            let matched: Vec<Arc<Library>> = libraries
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(_, library)| library.clone())
                .collect();
            debug!("Expanded '{}' to {} libraries", location, matched.len());
            return Ok(matched);
        }

        libraries
            .get(location)
            .cloned()
            .map(|library| vec![library])
            .ok_or_else(|| {
                GuestboxError::CodeLocation(format!("cannot read code location '{location}'"))
            })
    }
}

/// Resolves `locations` in order, flattening wildcard expansions.
pub fn resolve_all(resolver: &dyn CodeResolver, locations: &[String]) -> Result<Vec<Arc<Library>>> {
    let mut resolved = Vec::new();
    for location in locations {
        resolved.extend(resolver.resolve(location)?);
    }
    Ok(resolved)
}
