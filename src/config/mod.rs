//! Configuration and launch input
//!
//! Supervisor settings, launch specifications, mains files and the shared
//! error type.

pub mod launch;
pub mod mains;
pub mod settings;
pub mod types;
