//! guestbox: run isolated guest programs side by side in one host process
//!
//! # Architecture
//!
//! The crate is organized by the isolation concern each module owns:
//!
//! ## Execution Core ([`core`])
//! - [`core::context`]: Execution contexts (one per guest run)
//! - [`core::supervisor`]: The `Supervisor` trait and the worker body
//! - [`core::isolated`]: Isolated policy and the ambient context redirector
//! - [`core::shared`]: Shared-extended policy
//! - [`core::current`]: Current-context slot and inheriting spawn
//! - [`core::interrupt`]: Cooperative interruption
//! - [`core::mailbox`]: Single-slot rendezvous mailbox
//! - [`core::types`]: Guest failures and run outcomes
//!
//! ## Symbol Resolution ([`namespace`])
//! - [`namespace::library`]: Loadable units grouped per code location
//! - [`namespace::catalog`]: Code-location resolution
//! - [`namespace::exclusive`]: Per-context namespaces chained to the base
//! - [`namespace::shared`]: The process-wide appendable namespace
//!
//! ## Properties ([`properties`])
//! - [`properties::PropertyScope`]: Copy-on-create key/value scopes
//! - [`properties::ambient`]: Ambient get/set routed through an installable store
//!
//! ## Logging ([`logging`])
//! - [`logging::wrapper`]: Lazily built per-context log configuration
//! - [`logging::manager`]: Log managers and change notification
//! - [`logging::handler`]: Handlers and records
//! - [`logging::isolating`]: `log` backend routing guest records to their context
//!
//! ## Observability ([`observability`])
//! - [`observability::events`]: Structured lifecycle events
//! - [`observability::metrics`]: Context counters
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: Supervisor configuration file
//! - [`config::launch`]: Launch specifications and command-line parsing
//! - [`config::mains`]: Multi-guest mains files
//! - [`config::types`]: Shared error type
//!
//! # Design Principles
//!
//! 1. **Copy on create** - a context's properties never alias its parent's
//! 2. **Failures are values** - guest errors and panics surface only from `join`
//! 3. **Inherit, never re-resolve** - threads learn their context at spawn time
//! 4. **Build once** - lazy state fails permanently rather than retrying

// Execution core
pub mod core;

// Symbol resolution
pub mod namespace;

// Property scopes and ambient access
pub mod properties;

// Per-context logging
pub mod logging;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// Demo guests for the CLI
pub mod demo;

// CLI
pub mod cli;

pub use crate::config::launch::LaunchSpec;
pub use crate::config::settings::SupervisorConfig;
pub use crate::config::types::{GuestboxError, Result};
pub use crate::core::context::ExecutionContext;
pub use crate::core::current::{current, receive, spawn, spawn_named};
pub use crate::core::isolated::IsolatedSupervisor;
pub use crate::core::shared::SharedSupervisor;
pub use crate::core::supervisor::{supervisor_for, Supervisor};
pub use crate::core::types::{GuestFailure, RunOutcome};
pub use crate::namespace::{BaseNamespace, Catalog, CodeResolver, Library, Policy};
