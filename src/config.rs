//! Interpreter configuration.

use crate::env::{HostEnv, ProcessEnv};

/// Environment variable that forces simulate mode when set to a truthy value.
pub const SIMULATE_VAR: &str = "SAFE_SHELL_SIMULATE";

/// Settings fixed when an interpreter is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Validate every command but only report its effect.
    pub simulate: bool,
}

impl InterpreterConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_host(&ProcessEnv)
    }

    /// Read the configuration from `host`.
    pub fn from_host(host: &dyn HostEnv) -> Self {
        let simulate = host.var(SIMULATE_VAR).is_some_and(|v| is_truthy(&v));
        Self { simulate }
    }

    /// Override the simulate flag.
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Vars(Option<&'static str>);

    impl HostEnv for Vars {
        fn var(&self, key: &str) -> Option<String> {
            assert_eq!(key, SIMULATE_VAR);
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn test_simulate_from_environment() {
        assert!(!InterpreterConfig::from_host(&Vars(None)).simulate);
        assert!(!InterpreterConfig::from_host(&Vars(Some("0"))).simulate);
        assert!(!InterpreterConfig::from_host(&Vars(Some(""))).simulate);
        assert!(InterpreterConfig::from_host(&Vars(Some("1"))).simulate);
        assert!(InterpreterConfig::from_host(&Vars(Some("TRUE"))).simulate);
        assert!(InterpreterConfig::from_host(&Vars(Some(" yes "))).simulate);
    }

    #[test]
    fn test_with_simulate() {
        let config = InterpreterConfig::default().with_simulate(true);
        assert!(config.simulate);
    }
}
