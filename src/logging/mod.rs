//! Per-context logging
//!
//! Each execution context owns a [`LogManagerWrapper`] that lazily builds the
//! context's [`LogManager`] from its own properties and namespace, so two
//! contexts can configure logging differently in one process.

pub mod handler;
pub mod isolating;
pub mod manager;
pub mod wrapper;

pub use handler::{ConsoleHandler, Handler, LogRecord};
pub use manager::{DefaultLogManager, LogManager};
pub use wrapper::LogManagerWrapper;
