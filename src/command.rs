//! Commands and the registry that dispatches them.
//!
//! A [`Handler`] validates raw arguments into an [`Action`]; the
//! [`CommandRegistry`] maps names and aliases to handlers and decides whether
//! the action runs or is only reported.

use crate::error::CommandError;
use crate::os::OsServices;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One parsed command invocation with fully substituted arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// 1-based line in the script, header included.
    pub line: usize,
    pub name: String,
    pub args: Vec<String>,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What a handler may touch while running.
#[derive(Clone, Copy)]
pub struct ExecContext<'a> {
    pub os: &'a dyn OsServices,
    /// Validate only; report the effect instead of performing it.
    pub simulate: bool,
}

/// A validated command, ready to perform its side effect.
pub trait Action {
    /// Perform the effect.
    fn execute(self: Box<Self>, os: &dyn OsServices) -> Result<(), CommandError>;
}

/// Object-safe capability registered for a command name.
pub trait Handler: Send + Sync {
    /// Canonical name of the command.
    fn name(&self) -> &'static str;

    /// Check arity and content, producing the action to run.
    fn validate(&self, args: &[String], os: &dyn OsServices) -> Result<Box<dyn Action>, CommandError>;
}

/// Built-in commands known at compile time.
///
/// Each built-in is a typed value produced from raw arguments by
/// [`Builtin::parse`]; a successfully parsed value is already validated.
pub(crate) trait Builtin: Sized + 'static {
    /// Canonical name of the command, e.g. "remove".
    fn name() -> &'static str;

    fn parse(args: &[String], os: &dyn OsServices) -> Result<Self, CommandError>;

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError>;
}

impl<T: Builtin> Action for T {
    fn execute(self: Box<Self>, os: &dyn OsServices) -> Result<(), CommandError> {
        <T as Builtin>::execute(*self, os)
    }
}

/// Registers a [`Builtin`] as a [`Handler`].
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: Builtin> Handler for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn validate(&self, args: &[String], os: &dyn OsServices) -> Result<Box<dyn Action>, CommandError> {
        Ok(Box::new(T::parse(args, os)?))
    }
}

/// Command name to handler table, fixed once built.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<&'static str, Arc<dyn Handler>>,
}

impl CommandRegistry {
    /// An empty registry. See [`CommandRegistry::with_builtins`] for the standard set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own name and every alias.
    pub fn register(&mut self, handler: Arc<dyn Handler>, aliases: &[&'static str]) {
        for alias in aliases {
            self.handlers.insert(alias, Arc::clone(&handler));
        }
        self.handlers.insert(handler.name(), handler);
    }

    /// Whether `name` is a registered command or alias.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Every registered name, aliases included, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Validate and run one command.
    ///
    /// In simulate mode the command is validated but its effect is only logged.
    pub fn dispatch(&self, name: &str, args: &[String], ctx: ExecContext<'_>) -> Result<(), CommandError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand {
                name: name.to_string(),
            })?;

        let action = handler.validate(args, ctx.os)?;
        if ctx.simulate {
            info!(command = handler.name(), "simulate: {} {}", name, args.join(" "));
            return Ok(());
        }
        action.execute(ctx.os)?;
        info!(command = handler.name(), "executed: {} {}", name, args.join(" "));
        Ok(())
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}
