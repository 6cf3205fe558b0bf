use crate::namespace::Library;
use chrono::{DateTime, Utc};
use log::{Level, LevelFilter};
use std::io::Write;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Name under which the console handler is registered in every base namespace.
pub const CONSOLE_HANDLER: &str = "guestbox.logging.ConsoleHandler";

/// Location of the built-in logging library.
pub const BUILTIN_LOCATION: &str = "builtin:logging";

/// One log event as seen by handlers.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub context_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(level: Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            target: target.into(),
            message: message.into(),
            context_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, context_id: Uuid) -> Self {
        self.context_id = Some(context_id);
        self
    }
}

/// Destination of log records. Handlers are default-constructed from a
/// factory and then given a level.
pub trait Handler: Send + Sync {
    fn publish(&self, record: &LogRecord);
    fn set_level(&self, level: LevelFilter);
    fn level(&self) -> LevelFilter;

    fn flush(&self) {}

    fn is_loggable(&self, level: Level) -> bool {
        level <= self.level()
    }
}

/// Writes records to standard error.
#[derive(Debug)]
pub struct ConsoleHandler {
    level: RwLock<LevelFilter>,
}

impl Default for ConsoleHandler {
    fn default() -> Self {
        Self {
            level: RwLock::new(LevelFilter::Info),
        }
    }
}

impl Handler for ConsoleHandler {
    fn publish(&self, record: &LogRecord) {
        if !self.is_loggable(record.level) {
            return;
        }
        let context = record
            .context_id
            .map(|id| id.to_string()[..8].to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} {:<5} [{}] {}: {}",
            record.timestamp.format("%H:%M:%S%.3f"),
            record.level,
            context,
            record.target,
            record.message
        );
    }

    fn set_level(&self, level: LevelFilter) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    fn level(&self) -> LevelFilter {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Library registered at the front of every base namespace.
pub fn builtin_library() -> Library {
    Library::new(BUILTIN_LOCATION)
        .with_handler(CONSOLE_HANDLER, || Box::new(ConsoleHandler::default()))
}

/// Parses a level name. Accepts the `log` crate names as well as the
/// classic `SEVERE`/`WARNING`/`FINE` family.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    let trimmed = name.trim();
    match trimmed.to_ascii_uppercase().as_str() {
        "SEVERE" => Some(LevelFilter::Error),
        "WARNING" => Some(LevelFilter::Warn),
        "CONFIG" => Some(LevelFilter::Info),
        "FINE" => Some(LevelFilter::Debug),
        "FINER" | "FINEST" | "ALL" => Some(LevelFilter::Trace),
        _ => LevelFilter::from_str(trimmed).ok(),
    }
}
