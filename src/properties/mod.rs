//! Property scopes
//!
//! A [`PropertyScope`] is the key/value configuration store owned by one
//! execution context. Scopes are seeded by copying a [`PropertySnapshot`];
//! after the copy the two sides never observe each other's writes.

pub mod ambient;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Immutable, ordered copy of a property scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySnapshot {
    entries: BTreeMap<String, String>,
}

impl PropertySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose key starts with `prefix`, with the prefix removed.
    pub fn strip_prefix(&self, prefix: &str) -> PropertySnapshot {
        self.entries
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    /// Returns a copy with `overrides` applied on top (overrides win).
    pub fn merged_with<'a, I>(&self, overrides: I) -> PropertySnapshot
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries = self.entries.clone();
        for (key, value) in overrides {
            entries.insert(key.clone(), value.clone());
        }
        PropertySnapshot { entries }
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl FromIterator<(String, String)> for PropertySnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for PropertySnapshot {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Mutable configuration store of one execution context.
///
/// A poisoned lock is recovered rather than propagated: a guest panicking
/// mid-write cannot leave a map in a torn state, so the data stays usable.
#[derive(Debug, Default)]
pub struct PropertyScope {
    entries: RwLock<BTreeMap<String, String>>,
}

impl PropertyScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy-on-create: the new scope owns its own entries.
    pub fn from_snapshot(snapshot: &PropertySnapshot) -> Self {
        Self {
            entries: RwLock::new(snapshot.entries.clone()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Sets `key` and returns the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Applies every entry of `overrides` under one write lock.
    pub fn merge<'a, I>(&self, overrides: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in overrides {
            entries.insert(key.clone(), value.clone());
        }
    }

    pub fn snapshot(&self) -> PropertySnapshot {
        PropertySnapshot {
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
