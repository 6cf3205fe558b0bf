//! Demo guest programs shipped with the binary.
//!
//! Real code loading is left to embedders (see [`CodeResolver`]); the CLI
//! resolves code locations against this catalog instead.
//!
//! [`CodeResolver`]: crate::namespace::CodeResolver

use crate::core::interrupt;
use crate::logging::handler::{parse_level, Handler, LogRecord};
use crate::namespace::{Catalog, Library};
use crate::properties::ambient;
use log::LevelFilter;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

pub const DEMO_LOCATION: &str = "demo";

/// Handler printing records to stdout with the context id in front.
pub struct StdoutHandler {
    level: RwLock<LevelFilter>,
}

impl Default for StdoutHandler {
    fn default() -> Self {
        Self {
            level: RwLock::new(LevelFilter::Trace),
        }
    }
}

impl Handler for StdoutHandler {
    fn publish(&self, record: &LogRecord) {
        let context = record
            .context_id
            .map(|id| id.simple().to_string()[..8].to_string())
            .unwrap_or_default();
        println!("[{}] {} {}", context, record.level, record.message);
    }

    fn set_level(&self, level: LevelFilter) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    fn level(&self) -> LevelFilter {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn echo(args: &[String]) -> anyhow::Result<()> {
    log::info!(target: "demo::echo", "echo called with {} args", args.len());
    println!("{}", args.join(" "));
    Ok(())
}

/// Prints the named properties as seen through the ambient store; with no
/// arguments prints the code path.
fn props(args: &[String]) -> anyhow::Result<()> {
    let keys: Vec<&str> = if args.is_empty() {
        vec![crate::core::supervisor::CODE_PATH_PROPERTY]
    } else {
        args.iter().map(String::as_str).collect()
    };
    for key in keys {
        match ambient::get_property(key) {
            Some(value) => println!("{key}={value}"),
            None => println!("{key} is unset"),
        }
    }
    Ok(())
}

fn sleep(args: &[String]) -> anyhow::Result<()> {
    let millis: u64 = match args.first() {
        Some(arg) => arg.parse()?,
        None => 1000,
    };
    interrupt::sleep(Duration::from_millis(millis))?;
    println!("slept {millis} ms");
    Ok(())
}

fn fail(args: &[String]) -> anyhow::Result<()> {
    anyhow::bail!("demo failure requested ({})", args.join(" "))
}

fn panic_guest(args: &[String]) -> anyhow::Result<()> {
    panic!("demo panic requested ({})", args.join(" "))
}

/// Sets the log level of the calling context's root logger, then logs one
/// record per level.
fn loglevels(args: &[String]) -> anyhow::Result<()> {
    if let (Some(level), Some(context)) = (args.first(), crate::core::current::current()) {
        let level = parse_level(level).ok_or_else(|| anyhow::anyhow!("unknown level '{level}'"))?;
        context.logging().set_level(level)?;
    }
    log::error!(target: "demo::loglevels", "error record");
    log::warn!(target: "demo::loglevels", "warn record");
    log::info!(target: "demo::loglevels", "info record");
    log::debug!(target: "demo::loglevels", "debug record");
    Ok(())
}

pub fn demo_library() -> Library {
    Library::new(DEMO_LOCATION)
        .with_main("echo")
        .with_entry_point("echo", echo)
        .with_entry_point("props", props)
        .with_entry_point("sleep", sleep)
        .with_entry_point("fail", fail)
        .with_entry_point("panic", panic_guest)
        .with_entry_point("loglevels", loglevels)
        .with_handler("demo.StdoutHandler", || Box::new(StdoutHandler::default()))
}

pub fn demo_catalog() -> Catalog {
    Catalog::new().with_library(demo_library())
}
