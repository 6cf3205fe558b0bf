//! Utilities
//!
//! Cross-cutting helpers shared by the context and logging layers.

pub mod lazy;
