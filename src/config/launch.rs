/// Launch specifications
///
/// A [`LaunchSpec`] names the entry point to run, the code locations to
/// resolve it from, property overrides for the new context, and the guest's
/// argument list. It can be built programmatically or parsed from a
/// classic command line: `-cp a:b -Dkey=value Main arg1 arg2`, or
/// `-jar app arg1` to run the main declared by the library at `app`.
use crate::config::types::{GuestboxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between code locations in a class-path style list.
pub const PATH_SEPARATOR: char = ':';

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub entry_point: String,
    #[serde(default)]
    pub code_locations: Vec<String>,
    #[serde(default)]
    pub property_overrides: BTreeMap<String, String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Location whose declared main supplies the entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_location: Option<String>,
}

impl LaunchSpec {
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
            ..Self::default()
        }
    }

    /// Spec running the main declared by the library at `location`.
    pub fn main_of(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            code_locations: vec![location.clone()],
            main_location: Some(location),
            ..Self::default()
        }
    }

    pub fn with_code_location(mut self, location: impl Into<String>) -> Self {
        self.code_locations.push(location.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.property_overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Code locations joined into one path string.
    pub fn code_path(&self) -> String {
        self.code_locations.join(&PATH_SEPARATOR.to_string())
    }

    /// Parses a launch command line.
    ///
    /// Options before the entry point: `-cp`/`-classpath <locs>` (colon
    /// separated, repeatable) and `-D<key>=<value>`. The first word not
    /// starting with `-` is the entry point; `-jar <location>` instead adds
    /// the location and takes the entry point from its declared main. Every
    /// word after either is passed to the guest untouched.
    pub fn parse_args<S: AsRef<str>>(words: &[S]) -> Result<Self> {
        let mut spec = LaunchSpec::default();
        let mut words = words.iter().map(|w| w.as_ref());

        while let Some(word) = words.next() {
            if word == "-cp" || word == "-classpath" {
                let path = words.next().ok_or_else(|| {
                    GuestboxError::LaunchSpec(format!("{word} requires a code path"))
                })?;
                spec.code_locations.extend(
                    path.split(PATH_SEPARATOR)
                        .filter(|loc| !loc.is_empty())
                        .map(str::to_string),
                );
            } else if let Some(definition) = word.strip_prefix("-D") {
                let (key, value) = definition.split_once('=').ok_or_else(|| {
                    GuestboxError::LaunchSpec(format!("missing '=' in property definition '{word}'"))
                })?;
                if key.is_empty() {
                    return Err(GuestboxError::LaunchSpec(format!(
                        "malformed property definition '{word}'"
                    )));
                }
                spec.property_overrides
                    .insert(key.to_string(), value.to_string());
            } else if word == "-jar" {
                let location = words.next().ok_or_else(|| {
                    GuestboxError::LaunchSpec("-jar requires a code location".to_string())
                })?;
                spec.code_locations.push(location.to_string());
                spec.main_location = Some(location.to_string());
                spec.args = words.map(str::to_string).collect();
                break;
            } else if word.starts_with('-') {
                return Err(GuestboxError::LaunchSpec(format!("unknown option '{word}'")));
            } else {
                spec.entry_point = word.to_string();
                spec.args = words.map(str::to_string).collect();
                break;
            }
        }

        spec.validate()?;
        Ok(spec)
    }

    /// Checks names and override keys. Resolves nothing.
    pub fn validate(&self) -> Result<()> {
        if let Some(location) = &self.main_location {
            if location.trim().is_empty() {
                return Err(GuestboxError::LaunchSpec(
                    "empty main location".to_string(),
                ));
            }
        } else if self.entry_point.trim().is_empty() {
            return Err(GuestboxError::LaunchSpec(
                "no entry point given".to_string(),
            ));
        }
        if self.entry_point.chars().any(char::is_whitespace) {
            return Err(GuestboxError::LaunchSpec(format!(
                "entry point '{}' contains whitespace",
                self.entry_point
            )));
        }
        for key in self.property_overrides.keys() {
            if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
                return Err(GuestboxError::LaunchSpec(format!(
                    "malformed property override key '{key}'"
                )));
            }
        }
        Ok(())
    }
}
