//! Turns script text into an ordered list of [`Command`]s.
//!
//! Parsing is all-or-nothing: the first problem aborts the whole parse and no
//! command list is returned, so a malformed script can never be half applied.

use crate::command::{Command, CommandRegistry};
use crate::env::{self, HostEnv, VariableStore};
use crate::error::{ParseError, ScriptError};
use crate::lexer::{self, Line};
use crate::substitute::substitute;
use tracing::debug;

/// The mandatory first line of every script.
pub const HEADER: &str = "#!safe_shell";

/// Single-use parser holding the variables assigned so far.
pub struct Parser<'a> {
    registry: &'a CommandRegistry,
    host: &'a dyn HostEnv,
    vars: VariableStore,
}

impl<'a> Parser<'a> {
    /// Create a parser with an empty variable store.
    pub fn new(registry: &'a CommandRegistry, host: &'a dyn HostEnv) -> Self {
        Self {
            registry,
            host,
            vars: VariableStore::new(),
        }
    }

    /// Parse a whole script.
    pub fn parse(mut self, script: &str) -> Result<Vec<Command>, ScriptError> {
        let mut lines = script.lines();

        match lines.next() {
            None => return Err(ScriptError::new(1, ParseError::EmptyScript)),
            Some(first) if first.strip_suffix('\r').unwrap_or(first) != HEADER => {
                return Err(ScriptError::new(
                    1,
                    ParseError::MissingHeader { expected: HEADER },
                ));
            }
            Some(_) => {}
        }

        let mut commands = Vec::new();
        for (index, raw) in lines.enumerate() {
            let line = index + 2;
            if let Some(command) = self.parse_line(raw, line).map_err(|e| ScriptError::new(line, e))? {
                commands.push(command);
            }
        }
        Ok(commands)
    }

    fn parse_line(&mut self, raw: &str, line: usize) -> Result<Option<Command>, ParseError> {
        match lexer::classify(raw) {
            Line::Blank | Line::Comment => Ok(None),
            Line::Disabled => {
                debug!(line, "skipping indented line");
                Ok(None)
            }
            Line::Assignment { name, value } => {
                if !env::is_valid_name(name) {
                    return Err(ParseError::InvalidVariableName {
                        name: name.to_string(),
                    });
                }
                let value = substitute(value, &self.vars, self.host)?;
                debug!(line, variable = name, value = %value, "assignment");
                self.vars.set_var(name, value);
                Ok(None)
            }
            Line::Invocation { name, args } => {
                if !self.registry.contains(name) {
                    return Err(ParseError::UnknownCommand {
                        name: name.to_string(),
                    });
                }
                let args = args
                    .into_iter()
                    .map(|arg| substitute(arg, &self.vars, self.host))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Command {
                    line,
                    name: name.to_string(),
                    args,
                }))
            }
        }
    }
}
