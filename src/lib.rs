//! A restricted script interpreter for privileged maintenance tasks.
//!
//! Scripts start with the `#!safe_shell` header and contain only variable
//! assignments (`NAME=value`), comments and invocations of a fixed set of
//! commands (`remove`, `makedir`, `signal_process`, `patch_config`, ...).
//! There is no way to run arbitrary programs, no pipes, no redirection and no
//! shell expansion beyond `${NAME}` placeholders.
//!
//! The main entry point is [`Interpreter`]. Command handlers reach the
//! operating system only through [`os::OsServices`], and new commands are
//! added through [`command::Handler`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod interpreter;
pub mod lexer;
pub mod os;
pub mod parser;
pub mod substitute;

pub use config::InterpreterConfig;
pub use error::{CommandError, ParseError, ScriptError};
pub use interpreter::{Interpreter, ScriptOutcome, Session};
pub use parser::HEADER;
