//! Error types for the interpreter.
//!
//! Errors fall into two groups:
//! - [`ParseError`]: structural and substitution problems found before anything runs.
//! - [`CommandError`]: validation and OS failures reported by a handler at execution time.
//!
//! Both are wrapped in [`ScriptError`], which carries the offending line number.

use std::io;
use thiserror::Error;

/// Problems detected while parsing a script. Nothing has been executed when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Script is empty.")]
    EmptyScript,

    #[error("Missing or incorrect shebang. Expected '{expected}'.")]
    MissingHeader { expected: &'static str },

    #[error("Invalid variable name '{name}'.")]
    InvalidVariableName { name: String },

    #[error("Variable '{name}' not found.")]
    UnresolvedVariable { name: String },

    #[error("Unknown command '{name}'.")]
    UnknownCommand { name: String },
}

/// Failure reported by a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command '{name}'.")]
    UnknownCommand { name: String },

    /// Wrong number of arguments.
    #[error("{command} command expects {expected} ({usage}), but got {got}.")]
    Arity {
        command: &'static str,
        expected: String,
        usage: &'static str,
        got: usize,
    },

    #[error("Invalid permissions format: {0}")]
    InvalidPermissions(String),

    #[error("Invalid owner:group format. Expected 'user:group'.")]
    InvalidOwnerGroup,

    #[error("User '{0}' not found.")]
    UnknownUser(String),

    #[error("Group '{0}' not found.")]
    UnknownGroup(String),

    #[error("Invalid characters in {command} arguments.")]
    DisallowedCharacters { command: &'static str },

    #[error("Unknown signal '{0}'.")]
    UnknownSignal(String),

    #[error("{command} command format is '{usage}', but got invalid format.")]
    Format {
        command: &'static str,
        usage: &'static str,
    },

    #[error("Invalid key '{0}'.")]
    InvalidKey(String),

    #[error("Cannot set '{key}': '{segment}' is not an object or array.")]
    NotAContainer { key: String, segment: String },

    #[error("Cannot set '{key}': index '{segment}' is out of range.")]
    IndexOutOfRange { key: String, segment: String },

    /// An OS operation failed; `source` carries the OS-reported reason.
    #[error("{context}: {source}")]
    Os {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("JSON parse error in '{path}': {source}")]
    Document {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CommandError {
    pub(crate) fn os(context: impl Into<String>, source: io::Error) -> Self {
        CommandError::Os {
            context: context.into(),
            source,
        }
    }
}

/// The cause of a failed script.
#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// A script failure tied to the line that caused it.
#[derive(Debug, Error)]
#[error("Error at line {line}: {cause}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub cause: Cause,
}

impl ScriptError {
    /// Tie `cause` to `line`.
    pub fn new(line: usize, cause: impl Into<Cause>) -> Self {
        Self {
            line,
            cause: cause.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_message_carries_line() {
        let err = ScriptError::new(
            3,
            ParseError::UnresolvedVariable {
                name: "UNSET".to_string(),
            },
        );
        assert_eq!(err.to_string(), "Error at line 3: Variable 'UNSET' not found.");
    }

    #[test]
    fn test_os_error_keeps_os_reason() {
        let err = CommandError::os(
            "Failed to remove '/x'",
            io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
        );
        assert_eq!(err.to_string(), "Failed to remove '/x': Permission denied");
    }
}
