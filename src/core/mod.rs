//! Guest execution core.
//!
//! Core owns execution contexts, their worker threads, the current-context
//! slot, cooperative interruption and the two supervisor policies.

pub mod context;
pub mod current;
pub mod interrupt;
pub mod isolated;
pub mod mailbox;
pub mod shared;
pub mod supervisor;
pub mod types;
