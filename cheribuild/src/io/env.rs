//! Snapshot of the host process environment.
//!
//! Captured once at startup and passed through the build context so recipes
//! never consult the live process environment.

use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    vars: BTreeMap<String, String>,
}

impl HostEnv {
    /// Capture the current process environment (non UTF-8 entries are skipped).
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`. A variable set to the empty string counts as set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn get_or(&self, name: &str, default: impl Into<String>) -> String {
        self.get(name)
            .map(str::to_string)
            .unwrap_or_else(|| default.into())
    }

    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_kept() {
        let env = HostEnv::from_pairs([("HOST_CC", ""), ("HOST_CXX", "g++")]);
        assert_eq!(env.get("HOST_CC"), Some(""));
        assert_eq!(env.get_or("HOST_CC", "clang"), "");
        assert_eq!(env.get_or("HOST_CXX", "clang++"), "g++");
        assert_eq!(env.get_or("CC", "clang"), "clang");
    }

    #[test]
    fn empty_home_counts_as_unset() {
        assert_eq!(HostEnv::from_pairs([("HOME", "")]).home_dir(), None);
        assert_eq!(
            HostEnv::from_pairs([("HOME", "/home/dev")]).home_dir(),
            Some(PathBuf::from("/home/dev"))
        );
    }
}
