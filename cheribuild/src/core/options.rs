//! Ordered build-tool options: CMake cache entries and environment maps.
//!
//! Both collections keep insertion order so the rendered command line is
//! stable. Setting an existing key replaces its value in place.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A rendered CMake cache value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CMakeValue(String);

impl CMakeValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CMakeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CMakeValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CMakeValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<bool> for CMakeValue {
    fn from(value: bool) -> Self {
        Self(if value { "ON" } else { "OFF" }.to_string())
    }
}

impl From<u32> for CMakeValue {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<&Path> for CMakeValue {
    fn from(value: &Path) -> Self {
        Self(value.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CMakeOption {
    pub key: String,
    pub value: CMakeValue,
}

/// CMake cache variables in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CMakeOptions {
    entries: Vec<CMakeOption>,
}

impl CMakeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<CMakeValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(CMakeOption { key, value }),
        }
        self
    }

    /// Add a CMake list value (items joined with `;`).
    pub fn add_list(&mut self, key: impl Into<String>, items: &[&str]) -> &mut Self {
        self.add(key, items.join(";"))
    }

    pub fn get(&self, key: &str) -> Option<&CMakeValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CMakeOption> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `-DKEY=VALUE` arguments.
    pub fn to_args(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format!("-D{}={}", entry.key, entry.value))
            .collect()
    }
}

/// Environment variable name to value, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvVars {
    vars: Vec<(String, String)>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.vars.push((name, value)),
        }
        self
    }

    pub fn update<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.set(name, value);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
