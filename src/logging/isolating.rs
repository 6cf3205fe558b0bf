//! Process-level `log` facade that routes guest records to their context.
//!
//! Records emitted on a thread bound to an execution context go to that
//! context's [`LogManagerWrapper`](super::wrapper::LogManagerWrapper).
//! Records from the supervisor itself (targets under `guestbox`) and records
//! from unbound threads go to the fallback logger.

use super::handler::LogRecord;
use crate::config::types::{GuestboxError, Result};
use crate::core::current;
use log::{LevelFilter, Log, Metadata, Record};

const HOST_TARGET: &str = "guestbox";

pub struct IsolatingLogger {
    fallback: Box<dyn Log>,
}

impl IsolatingLogger {
    pub fn new(fallback: Box<dyn Log>) -> Self {
        Self { fallback }
    }

    fn is_host_record(target: &str) -> bool {
        target == HOST_TARGET || target.starts_with("guestbox::")
    }
}

impl Log for IsolatingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if Self::is_host_record(metadata.target()) {
            return self.fallback.enabled(metadata);
        }
        true
    }

    fn log(&self, record: &Record) {
        if Self::is_host_record(record.target()) {
            self.fallback.log(record);
            return;
        }
        let Some(context) = current::current() else {
            self.fallback.log(record);
            return;
        };
        let routed = LogRecord::new(record.level(), record.target(), record.args().to_string());
        if let Err(e) = context.logging().publish(routed) {
            // Context logging is unusable; keep the record rather than drop it.
            log::debug!("Context {} log routing failed: {}", context.id(), e);
            self.fallback.log(record);
        }
    }

    fn flush(&self) {
        self.fallback.flush();
    }
}

/// Installs an [`IsolatingLogger`] as the global `log` backend.
pub fn install(fallback: Box<dyn Log>, max_level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(IsolatingLogger::new(fallback)))
        .map_err(|e| GuestboxError::Logging(e.to_string()))?;
    log::set_max_level(max_level);
    Ok(())
}
