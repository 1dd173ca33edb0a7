//! The script interpreter and the interactive session built on it.

use crate::command::{Command, CommandRegistry, ExecContext};
use crate::config::InterpreterConfig;
use crate::error::ScriptError;
use crate::lexer::{self, Line};
use crate::os::{HostOs, OsServices};
use crate::parser::{HEADER, Parser};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::debug;

/// Result of one [`Interpreter::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    /// `Error at line <N>: <cause>` when the script failed.
    pub error_message: Option<String>,
}

impl From<Result<(), ScriptError>> for ScriptOutcome {
    fn from(result: Result<(), ScriptError>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error_message: None,
            },
            Err(e) => Self {
                success: false,
                error_message: Some(e.to_string()),
            },
        }
    }
}

/// Parses and runs safe shell scripts.
///
/// A script is parsed completely before anything runs; commands then execute
/// in order and the first failure stops the script. Effects of commands that
/// already ran are kept.
///
/// The interpreter keeps no state between runs: every call gets a fresh
/// variable store, and the command registry is never modified after
/// construction, so one interpreter can serve many threads.
///
/// Example
/// ```
/// use safe_shell::{Interpreter, InterpreterConfig};
/// let sh = Interpreter::new(InterpreterConfig::default().with_simulate(true));
/// let outcome = sh.execute("#!safe_shell\nNAME=cache\nremove /tmp/${NAME}\n");
/// assert!(outcome.success);
/// ```
pub struct Interpreter {
    registry: Arc<CommandRegistry>,
    os: Arc<dyn OsServices>,
    config: InterpreterConfig,
}

impl Interpreter {
    /// An interpreter with the built-in commands acting on the host system.
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_services(Arc::new(CommandRegistry::with_builtins()), Arc::new(HostOs), config)
    }

    /// An interpreter with a custom command set and OS backend.
    pub fn with_services(
        registry: Arc<CommandRegistry>,
        os: Arc<dyn OsServices>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            registry,
            os,
            config,
        }
    }

    /// The commands this interpreter accepts.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// The configuration fixed at construction.
    pub fn config(&self) -> InterpreterConfig {
        self.config
    }

    /// Parse and run a script, reporting the outcome as a value.
    pub fn execute(&self, script: &str) -> ScriptOutcome {
        self.run(script).into()
    }

    /// Parse and run a script.
    pub fn run(&self, script: &str) -> Result<(), ScriptError> {
        let commands = self.parse(script)?;
        debug!(count = commands.len(), "script parsed");
        self.execute_commands(&commands)
    }

    /// Parse a script without running it.
    pub fn parse(&self, script: &str) -> Result<Vec<Command>, ScriptError> {
        Parser::new(&self.registry, self.os.as_ref()).parse(script)
    }

    fn execute_commands(&self, commands: &[Command]) -> Result<(), ScriptError> {
        let ctx = ExecContext {
            os: self.os.as_ref(),
            simulate: self.config.simulate,
        };
        for command in commands {
            self.registry
                .dispatch(&command.name, &command.args, ctx)
                .map_err(|e| ScriptError::new(command.line, e))?;
        }
        Ok(())
    }

    /// Interactive loop: each entered command runs as its own script.
    pub fn repl(&self) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        let mut session = Session::default();

        loop {
            match rl.readline("safe_shell$ ") {
                Ok(line) => {
                    if line.trim() == "exit" {
                        break;
                    }
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    if let Err(e) = session.feed(self, &line) {
                        println!("Error: {}", e.cause);
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

/// Line-at-a-time driver used by the interactive loop.
///
/// Assignments are remembered here, not in the interpreter: every fed line
/// runs as a complete script made of the header, the remembered
/// assignments, and the line itself.
#[derive(Debug, Default)]
pub struct Session {
    assignments: Vec<String>,
}

impl Session {
    /// Run one line, remembering it if it is an assignment.
    pub fn feed(&mut self, interpreter: &Interpreter, line: &str) -> Result<(), ScriptError> {
        let script = self.script_for(line);
        interpreter.run(&script)?;
        if matches!(lexer::classify(line), Line::Assignment { .. }) {
            self.assignments.push(line.to_string());
        }
        Ok(())
    }

    fn script_for(&self, line: &str) -> String {
        let mut script = String::from(HEADER);
        for assignment in &self.assignments {
            script.push('\n');
            script.push_str(assignment);
        }
        script.push('\n');
        script.push_str(line);
        script.push('\n');
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::fake::{Call, FakeOs};
    use std::path::PathBuf;

    fn interpreter(os: Arc<FakeOs>, simulate: bool) -> Interpreter {
        Interpreter::with_services(
            Arc::new(CommandRegistry::with_builtins()),
            os,
            InterpreterConfig { simulate },
        )
    }

    #[test]
    fn test_missing_header_has_no_effect() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), false);

        for script in ["", "remove /tmp/a\n", "#!bash\nremove /tmp/a\n"] {
            let outcome = sh.execute(script);
            assert!(!outcome.success);
            assert!(outcome.error_message.unwrap().starts_with("Error at line 1:"));
        }
        assert!(os.calls().is_empty());
    }

    #[test]
    fn test_stops_at_first_failing_command() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), false);

        let outcome = sh.execute(
            "#!safe_shell\nremove /a\nmakedir /d svc 700\nremove /b\n",
        );

        assert_eq!(
            outcome,
            ScriptOutcome {
                success: false,
                error_message: Some(
                    "Error at line 3: Invalid owner:group format. Expected 'user:group'."
                        .to_string()
                ),
            }
        );
        assert_eq!(os.calls(), vec![Call::Remove(PathBuf::from("/a"))]);
    }

    #[test]
    fn test_parse_failure_runs_nothing() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), false);

        let outcome = sh.execute("#!safe_shell\nremove /a\nremove /b/${MISSING}\n");

        assert_eq!(
            outcome.error_message.as_deref(),
            Some("Error at line 3: Variable 'MISSING' not found.")
        );
        assert!(os.calls().is_empty());
    }

    #[test]
    fn test_variables_do_not_leak_between_runs() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), false);

        assert!(sh.execute("#!safe_shell\nNAME=cache\nremove /tmp/${NAME}\n").success);
        let outcome = sh.execute("#!safe_shell\nremove /tmp/${NAME}\n");

        assert!(!outcome.success);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("Error at line 2: Variable 'NAME' not found.")
        );
    }

    #[test]
    fn test_environment_fallback() {
        let mut fake = FakeOs::new();
        fake.env.insert("APP_ROOT".to_string(), "/srv/app".to_string());
        let os = Arc::new(fake);
        let sh = interpreter(os.clone(), false);

        sh.run("#!safe_shell\nremove ${APP_ROOT}/cache\n").unwrap();

        assert_eq!(os.calls(), vec![Call::Remove(PathBuf::from("/srv/app/cache"))]);
    }

    #[test]
    fn test_simulate_validates_without_effects() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), true);

        assert!(sh.execute("#!safe_shell\nmakedir /data svc:svc 700\nreboot\n").success);
        let outcome = sh.execute("#!safe_shell\nmakedir /data svc:nogroup 700\n");

        assert_eq!(
            outcome.error_message.as_deref(),
            Some("Error at line 2: Group 'nogroup' not found.")
        );
        assert!(os.calls().is_empty());
    }

    #[test]
    fn test_session_remembers_assignments() {
        let os = Arc::new(FakeOs::new());
        let sh = interpreter(os.clone(), false);
        let mut session = Session::default();

        session.feed(&sh, "DIR=/tmp/work").unwrap();
        session.feed(&sh, "remove ${DIR}").unwrap();
        assert!(session.feed(&sh, "1BAD=x").is_err());
        assert!(session.feed(&sh, "remove ${NOPE}").is_err());
        session.feed(&sh, "remove ${DIR}/b").unwrap();

        assert_eq!(
            os.calls(),
            vec![
                Call::Remove(PathBuf::from("/tmp/work")),
                Call::Remove(PathBuf::from("/tmp/work/b")),
            ]
        );
    }
}
