/// Per-context log configuration
///
/// The manager is built lazily on first use and cached; a failed build is
/// cached too. Change notifications from the manager mark the root logger
/// dirty, and the next structural root-logger operation rebuilds the handler
/// list from the `handlers` key before proceeding.
use super::handler::{parse_level, Handler, LogRecord};
use super::manager::{DefaultLogManager, LogManager, DEFAULT_MANAGER, MANAGER_PROPERTY};
use crate::config::types::{GuestboxError, Result};
use crate::namespace::{Namespace, Resolved, Unit};
use crate::properties::PropertyScope;
use crate::utils::lazy::{LazyCell, Phase};
use log::{debug, warn, LevelFilter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use uuid::Uuid;

/// Key (after the `logging.` prefix) listing handler names.
pub const HANDLERS_KEY: &str = "handlers";

/// Key (after the `logging.` prefix) holding the root level.
pub const ROOT_LEVEL_KEY: &str = ".level";

struct RootLogger {
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    level: RwLock<LevelFilter>,
    dirty: Arc<AtomicBool>,
    rebuild: Mutex<()>,
    generation: AtomicU64,
}

impl RootLogger {
    fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            level: RwLock::new(LevelFilter::Info),
            dirty: Arc::new(AtomicBool::new(true)),
            rebuild: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }
}

pub struct LogManagerWrapper {
    context_id: Uuid,
    properties: Arc<PropertyScope>,
    namespace: Namespace,
    manager: LazyCell<Arc<dyn LogManager>>,
    root: RootLogger,
}

impl LogManagerWrapper {
    pub fn new(context_id: Uuid, properties: Arc<PropertyScope>, namespace: Namespace) -> Self {
        Self {
            context_id,
            properties,
            namespace,
            manager: LazyCell::new(),
            root: RootLogger::new(),
        }
    }

    /// Returns the context's manager, building it on first call.
    pub fn get_manager(&self) -> Result<Arc<dyn LogManager>> {
        self.manager.get_or_try_init(|| self.build_manager())
    }

    pub fn is_built(&self) -> bool {
        self.manager.phase() == Phase::Built
    }

    /// Number of handler rebuilds performed so far.
    pub fn generation(&self) -> u64 {
        self.root.generation.load(Ordering::SeqCst)
    }

    fn build_manager(&self) -> Result<Arc<dyn LogManager>> {
        let manager: Arc<dyn LogManager> = match self.properties.get(MANAGER_PROPERTY) {
            None => Arc::new(DefaultLogManager::new()),
            Some(name) if name == DEFAULT_MANAGER => Arc::new(DefaultLogManager::new()),
            Some(name) => match self.namespace.resolve(&name) {
                Some(Resolved {
                    unit: Unit::LogManager(factory),
                    origin,
                }) => {
                    debug!("Context {} uses log manager '{}' from {}", self.context_id, name, origin);
                    factory().map_err(|e| {
                        GuestboxError::Logging(format!("log manager '{name}' failed to construct: {e:#}"))
                    })?
                }
                Some(resolved) => {
                    return Err(GuestboxError::Logging(format!(
                        "'{name}' is not a log manager (found {})",
                        resolved.unit.kind()
                    )))
                }
                None => {
                    return Err(GuestboxError::Logging(format!("log manager '{name}' not found")))
                }
            },
        };

        let dirty = self.root.dirty.clone();
        manager.add_change_listener(Box::new(move || dirty.store(true, Ordering::SeqCst)));
        manager.read_configuration(&self.properties.snapshot())?;
        Ok(manager)
    }

    /// Re-reads the context's current properties into the manager.
    pub fn reread_configuration(&self) -> Result<()> {
        self.get_manager()?
            .read_configuration(&self.properties.snapshot())
    }

    fn refresh(&self) -> Result<()> {
        let manager = self.get_manager()?;
        if !self.root.dirty.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _rebuild = self.root.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        if self.root.dirty.swap(false, Ordering::SeqCst) {
            self.reconfigure(manager.as_ref());
        }
        Ok(())
    }

    fn reconfigure(&self, manager: &dyn LogManager) {
        let mut handlers: Vec<Arc<dyn Handler>> = Vec::new();
        let names = manager.property(HANDLERS_KEY).unwrap_or_default();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let factory = match self.namespace.resolve(name) {
                Some(Resolved {
                    unit: Unit::Handler(factory),
                    ..
                }) => factory,
                Some(resolved) => {
                    warn!("Failed to load handler '{}': found {}", name, resolved.unit.kind());
                    continue;
                }
                None => {
                    warn!("Failed to load handler '{}': not found", name);
                    continue;
                }
            };

            let handler: Arc<dyn Handler> = Arc::from(factory());
            if let Some(level) = manager.property(&format!("{name}.level")) {
                match parse_level(&level) {
                    Some(level) => handler.set_level(level),
                    None => warn!("Failed to parse level \"{}\" for handler {}", level, name),
                }
            }
            handlers.push(handler);
        }

        if let Some(level) = manager.property(ROOT_LEVEL_KEY) {
            match parse_level(&level) {
                Some(level) => *self.root.level.write().unwrap_or_else(PoisonError::into_inner) = level,
                None => warn!("Failed to parse root level \"{}\"", level),
            }
        }

        let previous = std::mem::replace(
            &mut *self.root.handlers.write().unwrap_or_else(PoisonError::into_inner),
            handlers,
        );
        for handler in previous {
            handler.flush();
        }
        let generation = self.root.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Context {} root handlers rebuilt (generation {})", self.context_id, generation);
    }

    pub fn handlers(&self) -> Result<Vec<Arc<dyn Handler>>> {
        self.refresh()?;
        Ok(self
            .root
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    pub fn add_handler(&self, handler: Arc<dyn Handler>) -> Result<()> {
        self.refresh()?;
        self.root
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
        Ok(())
    }

    pub fn level(&self) -> Result<LevelFilter> {
        self.refresh()?;
        Ok(*self.root.level.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_level(&self, level: LevelFilter) -> Result<()> {
        self.refresh()?;
        *self.root.level.write().unwrap_or_else(PoisonError::into_inner) = level;
        Ok(())
    }

    /// Dispatches `record` to every root handler accepting its level.
    pub fn publish(&self, record: LogRecord) -> Result<()> {
        let level = self.level()?;
        if record.level > level {
            return Ok(());
        }
        let record = record.with_context(self.context_id);
        for handler in self.handlers()? {
            if handler.is_loggable(record.level) {
                handler.publish(&record);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::manager::ChangeListener;
    use crate::namespace::{BaseNamespace, ExclusiveNamespace, Library};
    use crate::properties::PropertySnapshot;
    use log::Level;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    /// Handler collecting messages into a shared buffer.
    struct Capture {
        level: RwLock<LevelFilter>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Handler for Capture {
        fn publish(&self, record: &LogRecord) {
            self.seen.lock().unwrap().push(record.message.clone());
        }
        fn set_level(&self, level: LevelFilter) {
            *self.level.write().unwrap() = level;
        }
        fn level(&self) -> LevelFilter {
            *self.level.read().unwrap()
        }
    }

    struct CountingManager {
        inner: DefaultLogManager,
    }

    impl LogManager for CountingManager {
        fn read_configuration(&self, properties: &PropertySnapshot) -> Result<()> {
            self.inner.read_configuration(properties)
        }
        fn property(&self, key: &str) -> Option<String> {
            self.inner.property(key)
        }
        fn add_change_listener(&self, listener: ChangeListener) {
            self.inner.add_change_listener(listener)
        }
    }

    fn wrapper_with(
        props: &[(&str, &str)],
        seen: Arc<Mutex<Vec<String>>>,
        constructions: Arc<AtomicUsize>,
    ) -> LogManagerWrapper {
        let library = Library::new("app")
            .with_handler("capture", move || {
                Box::new(Capture {
                    level: RwLock::new(LevelFilter::Trace),
                    seen: seen.clone(),
                })
            })
            .with_log_manager("counting", move || {
                constructions.fetch_add(1, Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(20));
                Ok(Arc::new(CountingManager {
                    inner: DefaultLogManager::new(),
                }) as Arc<dyn LogManager>)
            })
            .with_entry_point("Main", |_| Ok(()));
        let namespace = Namespace::Exclusive(Arc::new(ExclusiveNamespace::new(
            vec![Arc::new(library)],
            Arc::new(BaseNamespace::builtin()),
        )));
        let scope = PropertyScope::new();
        for (k, v) in props {
            scope.set(*k, *v);
        }
        LogManagerWrapper::new(Uuid::new_v4(), Arc::new(scope), namespace)
    }

    #[test]
    fn manager_is_built_once_under_contention() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let wrapper = Arc::new(wrapper_with(
            &[("logging.manager", "counting")],
            Arc::new(Mutex::new(Vec::new())),
            constructions.clone(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let wrapper = wrapper.clone();
                thread::spawn(move || wrapper.get_manager().unwrap())
            })
            .collect();
        let managers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
        assert!(wrapper.is_built());
    }

    #[test]
    fn handlers_come_from_context_properties() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let wrapper = wrapper_with(
            &[("logging.handlers", "capture"), ("logging.capture.level", "WARNING")],
            seen.clone(),
            Arc::new(AtomicUsize::new(0)),
        );

        wrapper.publish(LogRecord::new(Level::Error, "guest", "kept")).unwrap();
        wrapper.publish(LogRecord::new(Level::Info, "guest", "dropped")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["kept".to_string()]);
        assert_eq!(wrapper.handlers().unwrap().len(), 1);
    }

    #[test]
    fn change_notification_triggers_single_rebuild() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let wrapper = wrapper_with(&[], seen.clone(), Arc::new(AtomicUsize::new(0)));

        assert!(wrapper.handlers().unwrap().is_empty());
        assert_eq!(wrapper.generation(), 1);
        wrapper.handlers().unwrap();
        assert_eq!(wrapper.generation(), 1, "clean state must not rebuild");

        wrapper.properties.set("logging.handlers", "capture, missing");
        wrapper.reread_configuration().unwrap();
        assert_eq!(wrapper.generation(), 1, "rebuild waits for a structural operation");

        assert_eq!(wrapper.handlers().unwrap().len(), 1);
        assert_eq!(wrapper.generation(), 2);
    }

    #[test]
    fn root_level_key_applies() {
        let wrapper = wrapper_with(
            &[("logging..level", "SEVERE")],
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(AtomicUsize::new(0)),
        );
        assert_eq!(wrapper.level().unwrap(), LevelFilter::Error);
    }

    #[test]
    fn failed_build_is_reported_every_time() {
        let wrapper = wrapper_with(
            &[("logging.manager", "NoSuchManager")],
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(AtomicUsize::new(0)),
        );

        for _ in 0..2 {
            let err = wrapper.get_manager().err().expect("build must fail");
            assert!(err.to_string().contains("NoSuchManager"));
        }
        assert!(wrapper.handlers().is_err());
    }

    #[test]
    fn entry_point_is_not_a_manager() {
        let wrapper = wrapper_with(
            &[("logging.manager", "Main")],
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(AtomicUsize::new(0)),
        );
        let err = wrapper.get_manager().err().expect("build must fail");
        assert!(err.to_string().contains("entry point"));
    }
}
