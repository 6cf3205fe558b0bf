use super::{first_definition, BaseNamespace, Library, Resolved};
use log::debug;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-wide namespace extended by every launch.
///
/// Resolution consults the base, then appended libraries in append order.
/// The first definition of a name wins, so a later library can add names
/// but never redefine one.
#[derive(Debug)]
pub struct SharedNamespace {
    base: Arc<BaseNamespace>,
    appended: RwLock<Vec<Arc<Library>>>,
}

impl SharedNamespace {
    pub fn new(base: Arc<BaseNamespace>) -> Self {
        Self {
            base,
            appended: RwLock::new(Vec::new()),
        }
    }

    /// Appends libraries not already present (matched by location).
    /// Returns how many were added.
    pub fn append<I>(&self, libraries: I) -> usize
    where
        I: IntoIterator<Item = Arc<Library>>,
    {
        let mut appended = self.appended.write().unwrap_or_else(PoisonError::into_inner);
        let mut added = 0;
        for library in libraries {
            if appended.iter().any(|l| l.location() == library.location()) {
                continue;
            }
            debug!("Shared namespace extended with '{}'", library.location());
            appended.push(library);
            added += 1;
        }
        added
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(resolved) = self.base.resolve(name) {
            return Some(resolved);
        }
        let appended = self.appended.read().unwrap_or_else(PoisonError::into_inner);
        first_definition(appended.iter(), name)
    }

    pub fn locations(&self) -> Vec<String> {
        let appended = self.appended.read().unwrap_or_else(PoisonError::into_inner);
        self.base
            .locations()
            .into_iter()
            .chain(appended.iter().map(|library| library.location().to_string()))
            .collect()
    }
}
