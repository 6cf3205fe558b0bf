//! Symbol-resolution namespaces
//!
//! A [`Namespace`] maps a logical name to a [`Unit`]. Two policies exist:
//!
//! - [`ExclusiveNamespace`]: private libraries owned by one context, chained
//!   to a read-only [`BaseNamespace`]. Private definitions shadow the base.
//! - [`SharedNamespace`]: one process-wide namespace every launch appends
//!   libraries to. The base is consulted first, then appended libraries in
//!   append order; the first definition of a name wins.

pub mod catalog;
pub mod exclusive;
pub mod library;
pub mod shared;

pub use catalog::{resolve_all, Catalog, CodeResolver};
pub use exclusive::ExclusiveNamespace;
pub use library::{EntryPoint, HandlerFactory, Library, LogManagerFactory, Unit};
pub use shared::SharedNamespace;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Isolation policy of a supervisor and the namespaces it builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    #[default]
    Isolated,
    SharedExtended,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Isolated => write!(f, "isolated"),
            Policy::SharedExtended => write!(f, "shared_extended"),
        }
    }
}

/// A resolved unit together with the location that defined it.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub unit: Unit,
    pub origin: String,
}

pub(crate) fn first_definition<'a, I>(libraries: I, name: &str) -> Option<Resolved>
where
    I: IntoIterator<Item = &'a Arc<Library>>,
{
    libraries.into_iter().find_map(|library| {
        library.get(name).map(|unit| Resolved {
            unit: unit.clone(),
            origin: library.location().to_string(),
        })
    })
}

/// Read-only libraries shared by every namespace of a supervisor.
#[derive(Debug, Default)]
pub struct BaseNamespace {
    libraries: Vec<Arc<Library>>,
}

impl BaseNamespace {
    /// A base holding the built-in logging library followed by `libraries`.
    pub fn new(libraries: Vec<Arc<Library>>) -> Self {
        let mut all = vec![Arc::new(crate::logging::handler::builtin_library())];
        all.extend(libraries);
        Self { libraries: all }
    }

    pub fn builtin() -> Self {
        Self::new(Vec::new())
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        first_definition(&self.libraries, name)
    }

    pub fn locations(&self) -> Vec<String> {
        self.libraries
            .iter()
            .map(|library| library.location().to_string())
            .collect()
    }
}

/// Namespace reference held by an execution context.
#[derive(Clone, Debug)]
pub enum Namespace {
    Exclusive(Arc<ExclusiveNamespace>),
    Shared(Arc<SharedNamespace>),
}

impl Namespace {
    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        match self {
            Namespace::Exclusive(ns) => ns.resolve(name),
            Namespace::Shared(ns) => ns.resolve(name),
        }
    }

    /// Every location consulted, in resolution order.
    pub fn locations(&self) -> Vec<String> {
        match self {
            Namespace::Exclusive(ns) => ns.locations(),
            Namespace::Shared(ns) => ns.locations(),
        }
    }

    pub fn policy(&self) -> Policy {
        match self {
            Namespace::Exclusive(_) => Policy::Isolated,
            Namespace::Shared(_) => Policy::SharedExtended,
        }
    }
}
