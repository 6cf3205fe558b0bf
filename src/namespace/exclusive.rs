use super::{first_definition, BaseNamespace, Library, Resolved};
use std::sync::Arc;

/// Namespace owned by a single context: private libraries, then the base.
#[derive(Debug)]
pub struct ExclusiveNamespace {
    private: Vec<Arc<Library>>,
    base: Arc<BaseNamespace>,
}

impl ExclusiveNamespace {
    pub fn new(private: Vec<Arc<Library>>, base: Arc<BaseNamespace>) -> Self {
        Self { private, base }
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        first_definition(&self.private, name).or_else(|| self.base.resolve(name))
    }

    pub fn locations(&self) -> Vec<String> {
        self.private
            .iter()
            .map(|library| library.location().to_string())
            .chain(self.base.locations())
            .collect()
    }
}
