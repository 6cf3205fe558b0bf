use crate::logging::handler::Handler;
use crate::logging::manager::LogManager;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Guest program entry point. Receives the guest's argument list.
pub type EntryPoint = Arc<dyn Fn(&[String]) -> anyhow::Result<()> + Send + Sync>;

/// Default constructor of a log handler.
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

/// Constructor of a custom log manager.
pub type LogManagerFactory = Arc<dyn Fn() -> anyhow::Result<Arc<dyn LogManager>> + Send + Sync>;

/// A named, loadable unit.
#[derive(Clone)]
pub enum Unit {
    EntryPoint(EntryPoint),
    Handler(HandlerFactory),
    LogManager(LogManagerFactory),
}

impl Unit {
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::EntryPoint(_) => "entry point",
            Unit::Handler(_) => "log handler",
            Unit::LogManager(_) => "log manager",
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({})", self.kind())
    }
}

/// The set of units found at one code location.
#[derive(Clone, Debug)]
pub struct Library {
    location: String,
    units: BTreeMap<String, Unit>,
    main: Option<String>,
}

impl Library {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            units: BTreeMap::new(),
            main: None,
        }
    }

    /// Declares the entry point run when this library is launched by
    /// location alone.
    pub fn with_main(mut self, name: impl Into<String>) -> Self {
        self.main = Some(name.into());
        self
    }

    pub fn main(&self) -> Option<&str> {
        self.main.as_deref()
    }

    pub fn with_unit(mut self, name: impl Into<String>, unit: Unit) -> Self {
        self.units.insert(name.into(), unit);
        self
    }

    pub fn with_entry_point<F>(self, name: impl Into<String>, entry: F) -> Self
    where
        F: Fn(&[String]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.with_unit(name, Unit::EntryPoint(Arc::new(entry)))
    }

    pub fn with_handler<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.with_unit(name, Unit::Handler(Arc::new(factory)))
    }

    pub fn with_log_manager<F>(self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn LogManager>> + Send + Sync + 'static,
    {
        self.with_unit(name, Unit::LogManager(Arc::new(factory)))
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}
