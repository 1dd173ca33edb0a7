//! Script variables and access to the host environment.

use regex::Regex;
use std::collections::HashMap;
use std::env as stdenv;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Returns true if `name` may be used as a script variable name.
pub fn is_valid_name(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Read access to the variables of the hosting process.
pub trait HostEnv {
    /// Look up a variable of the host process by exact name.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl HostEnv for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        // Keys like these can never be set in the environment.
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return None;
        }
        stdenv::var(key).ok()
    }
}

/// Variables assigned by one script run.
///
/// A fresh store is created for every execution and dropped when it finishes.
/// Lookups consult the store first and fall back to the host environment.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: HashMap<String, String>,
}

impl VariableStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a variable, falling back to `host`.
    pub fn get_var(&self, key: &str, host: &dyn HostEnv) -> Option<String> {
        self.vars.get(key).cloned().or_else(|| host.var(key))
    }

    /// Set or override a variable. Callers validate the name first.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEnv(&'static [(&'static str, &'static str)]);

    impl HostEnv for FixedEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_store_set_and_get_var() {
        let host = FixedEnv(&[]);
        let mut store = VariableStore::new();

        assert_eq!(store.get_var("KEY", &host), None);

        store.set_var("KEY", "VALUE");

        assert_eq!(store.get_var("KEY", &host), Some("VALUE".to_string()));
    }

    #[test]
    fn test_store_shadows_host() {
        let host = FixedEnv(&[("HOME", "/home/svc"), ("SHELL", "/bin/sh")]);
        let mut store = VariableStore::new();
        store.set_var("HOME", "/srv");

        assert_eq!(store.get_var("HOME", &host), Some("/srv".to_string()));
        assert_eq!(store.get_var("SHELL", &host), Some("/bin/sh".to_string()));
    }

    #[test]
    fn test_process_env_rejects_impossible_keys() {
        assert_eq!(ProcessEnv.var(""), None);
        assert_eq!(ProcessEnv.var("A=B"), None);
        assert_eq!(ProcessEnv.var("A\0B"), None);
    }

    #[test]
    fn test_process_env_reads_from_process() {
        assert!(ProcessEnv.var("PATH").is_some());
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("NAME"));
        assert!(is_valid_name("_tmp1"));
        assert!(!is_valid_name("1X"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("A-B"));
    }
}
