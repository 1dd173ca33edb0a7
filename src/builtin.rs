//! The built-in command vocabulary.

use crate::command::{Builtin, CommandRegistry, Factory};
use crate::error::CommandError;
use crate::os::OsServices;
use nix::sys::signal::Signal;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Number, Value};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl CommandRegistry {
    /// A registry holding every built-in command and its aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Factory::<Remove>::default()), &["rm"]);
        registry.register(Arc::new(Factory::<MakeDir>::default()), &["mkdir"]);
        registry.register(Arc::new(Factory::<SignalProcess>::default()), &["pkill"]);
        registry.register(Arc::new(Factory::<PatchConfig>::default()), &["json"]);
        registry.register(Arc::new(Factory::<CopyFile>::default()), &["cp"]);
        registry.register(Arc::new(Factory::<CfgMgr>::default()), &[]);
        registry.register(Arc::new(Factory::<Reboot>::default()), &[]);
        registry.register(Arc::new(Factory::<PartCtr>::default()), &[]);
        registry
    }
}

fn plural(n: usize) -> String {
    if n == 1 {
        "1 argument".to_string()
    } else {
        format!("{} arguments", n)
    }
}

fn exactly(command: &'static str, n: usize, usage: &'static str, args: &[String]) -> CommandError {
    CommandError::Arity {
        command,
        expected: plural(n),
        usage,
        got: args.len(),
    }
}

fn at_least(
    command: &'static str,
    n: usize,
    usage: &'static str,
    args: &[String],
) -> Result<(), CommandError> {
    if args.len() >= n {
        return Ok(());
    }
    Err(CommandError::Arity {
        command,
        expected: format!("at least {}", plural(n)),
        usage,
        got: args.len(),
    })
}

/// `remove <path>`: delete a file or directory tree. A missing path is not an error.
pub struct Remove {
    pub path: PathBuf,
}

impl Builtin for Remove {
    fn name() -> &'static str {
        "remove"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        let [path] = args else {
            return Err(exactly(Self::name(), 1, "path", args));
        };
        Ok(Self {
            path: PathBuf::from(path),
        })
    }

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError> {
        match os.remove_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "nothing to remove");
                Ok(())
            }
            Err(e) => Err(CommandError::os(
                format!("Failed to remove '{}'", self.path.display()),
                e,
            )),
        }
    }
}

/// `makedir <path> <owner:group> <permission-octal>`.
///
/// Everything is checked before the directory is touched. Effects are applied
/// in the order directory, permissions, ownership, and are not rolled back.
pub struct MakeDir {
    pub path: PathBuf,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl MakeDir {
    fn parse_mode(raw: &str) -> Result<u32, CommandError> {
        let invalid = || CommandError::InvalidPermissions(raw.to_string());
        if raw.is_empty() || !raw.chars().all(|c| ('0'..='7').contains(&c)) {
            return Err(invalid());
        }
        u32::from_str_radix(raw, 8)
            .ok()
            .filter(|mode| *mode <= 0o7777)
            .ok_or_else(invalid)
    }
}

impl Builtin for MakeDir {
    fn name() -> &'static str {
        "makedir"
    }

    fn parse(args: &[String], os: &dyn OsServices) -> Result<Self, CommandError> {
        let [path, owner_group, perms] = args else {
            return Err(exactly(
                Self::name(),
                3,
                "path, owner:group, permissions",
                args,
            ));
        };

        let mode = Self::parse_mode(perms)?;

        let (owner, group) = owner_group
            .split_once(':')
            .ok_or(CommandError::InvalidOwnerGroup)?;

        let uid = os
            .user_id(owner)
            .map_err(|e| CommandError::os(format!("Failed to look up user '{}'", owner), e))?
            .ok_or_else(|| CommandError::UnknownUser(owner.to_string()))?;
        let gid = os
            .group_id(group)
            .map_err(|e| CommandError::os(format!("Failed to look up group '{}'", group), e))?
            .ok_or_else(|| CommandError::UnknownGroup(group.to_string()))?;

        Ok(Self {
            path: PathBuf::from(path),
            mode,
            uid,
            gid,
        })
    }

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError> {
        let shown = self.path.display();
        os.create_dir_all(&self.path)
            .map_err(|e| CommandError::os(format!("Failed to create directory '{}'", shown), e))?;
        os.set_mode(&self.path, self.mode)
            .map_err(|e| CommandError::os(format!("Failed to set permissions for '{}'", shown), e))?;
        os.set_owner(&self.path, self.uid, self.gid)
            .map_err(|e| CommandError::os(format!("Failed to set owner for '{}'", shown), e))?;
        Ok(())
    }
}

/// `signal_process <name> <signal>`: signal every process with that exact name.
///
/// Both arguments are restricted to a small character set before anything else
/// happens; this is the only place a script names something outside the filesystem.
pub struct SignalProcess {
    pub process: String,
    pub signal: Signal,
}

impl SignalProcess {
    fn parse_signal(raw: &str) -> Result<Signal, CommandError> {
        let upper = raw.to_ascii_uppercase();
        let full = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{}", upper)
        };
        Signal::from_str(&full).map_err(|_| CommandError::UnknownSignal(raw.to_string()))
    }
}

impl Builtin for SignalProcess {
    fn name() -> &'static str {
        "signal_process"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        let [process, signal] = args else {
            return Err(exactly(Self::name(), 2, "process_name, signal", args));
        };

        let name_ok = !process.is_empty()
            && process.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let signal_ok = !signal.is_empty() && signal.chars().all(|c| c.is_ascii_alphabetic());
        if !name_ok || !signal_ok {
            return Err(CommandError::DisallowedCharacters {
                command: Self::name(),
            });
        }

        Ok(Self {
            process: process.clone(),
            signal: Self::parse_signal(signal)?,
        })
    }

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError> {
        let count = os.signal_processes(&self.process, self.signal).map_err(|e| {
            CommandError::os(format!("Failed to signal '{}'", self.process), e)
        })?;
        if count == 0 {
            warn!(process = %self.process, signal = %self.signal, "no matching process");
        } else {
            debug!(process = %self.process, signal = %self.signal, count, "signaled");
        }
        Ok(())
    }
}

/// `patch_config <file> set <dotted.key> <value>`: overwrite one field of a JSON document.
///
/// Missing intermediate objects are created. The value is stored as a number
/// or boolean when it reads as one, otherwise as a string.
pub struct PatchConfig {
    pub path: PathBuf,
    pub key: String,
    pub segments: Vec<String>,
    pub value: Value,
}

const PATCH_USAGE: &str = "patch_config <file> set <key> <value>";

impl PatchConfig {
    fn retype(raw: &str) -> Value {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::from(n);
        }
        if let Ok(n) = raw.parse::<u64>() {
            return Value::from(n);
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Descend one level, creating an object for a missing or null slot.
    fn child<'v>(
        node: &'v mut Value,
        key: &str,
        parent: &str,
        segment: &str,
    ) -> Result<&'v mut Value, CommandError> {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
            Value::Array(items) => {
                let len = items.len();
                match segment.parse::<usize>() {
                    Ok(i) if i < len => Ok(&mut items[i]),
                    _ => Err(CommandError::IndexOutOfRange {
                        key: key.to_string(),
                        segment: segment.to_string(),
                    }),
                }
            }
            _ => Err(CommandError::NotAContainer {
                key: key.to_string(),
                segment: parent.to_string(),
            }),
        }
    }

    fn apply(&self, doc: &mut Value) -> Result<(), CommandError> {
        let mut parent = String::from("(root)");
        if !(doc.is_object() || doc.is_array()) {
            return Err(CommandError::NotAContainer {
                key: self.key.clone(),
                segment: parent,
            });
        }
        let mut node = doc;
        for (i, segment) in self.segments.iter().enumerate() {
            node = Self::child(node, &self.key, &parent, segment)?;
            parent = self.segments[..=i].join(".");
        }
        *node = self.value.clone();
        Ok(())
    }

    fn render(doc: &Value) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        doc.serialize(&mut ser)?;
        buf.push(b'\n');
        // serde_json only ever writes UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Builtin for PatchConfig {
    fn name() -> &'static str {
        "patch_config"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        let [path, verb, key, value] = args else {
            return Err(CommandError::Format {
                command: Self::name(),
                usage: PATCH_USAGE,
            });
        };
        if verb != "set" {
            return Err(CommandError::Format {
                command: Self::name(),
                usage: PATCH_USAGE,
            });
        }

        let segments: Vec<String> = key.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(CommandError::InvalidKey(key.clone()));
        }

        Ok(Self {
            path: PathBuf::from(path),
            key: key.clone(),
            segments,
            value: Self::retype(value),
        })
    }

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError> {
        let shown = self.path.display().to_string();
        let text = os
            .read_document(&self.path)
            .map_err(|e| CommandError::os(format!("Cannot open JSON file: {}", shown), e))?;
        let mut doc: Value = serde_json::from_str(&text).map_err(|source| CommandError::Document {
            path: shown.clone(),
            source,
        })?;

        self.apply(&mut doc)?;

        let rendered = Self::render(&doc).map_err(|source| CommandError::Document {
            path: shown.clone(),
            source,
        })?;
        os.write_document(&self.path, &rendered)
            .map_err(|e| CommandError::os(format!("Cannot write JSON file: {}", shown), e))?;
        Ok(())
    }
}

/// `copy <src> <dst>`: copy one regular file.
pub struct CopyFile {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl Builtin for CopyFile {
    fn name() -> &'static str {
        "copy"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        let [from, to] = args else {
            return Err(exactly(Self::name(), 2, "source, destination", args));
        };
        Ok(Self {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        })
    }

    fn execute(self, os: &dyn OsServices) -> Result<(), CommandError> {
        let bytes = os.copy_file(&self.from, &self.to).map_err(|e| {
            CommandError::os(
                format!(
                    "Failed to copy '{}' to '{}'",
                    self.from.display(),
                    self.to.display()
                ),
                e,
            )
        })?;
        debug!(bytes, "copied");
        Ok(())
    }
}

/// `cfgmgr <arg> <arg> ...`: configuration-manager request. No backing system; acknowledged only.
pub struct CfgMgr {
    pub args: Vec<String>,
}

impl Builtin for CfgMgr {
    fn name() -> &'static str {
        "cfgmgr"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        at_least(Self::name(), 2, "operation, target", args)?;
        Ok(Self {
            args: args.to_vec(),
        })
    }

    fn execute(self, _os: &dyn OsServices) -> Result<(), CommandError> {
        info!(args = ?self.args, "cfgmgr request acknowledged");
        Ok(())
    }
}

/// `reboot`: reboot request, acknowledged only.
pub struct Reboot {
    pub args: Vec<String>,
}

impl Builtin for Reboot {
    fn name() -> &'static str {
        "reboot"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        Ok(Self {
            args: args.to_vec(),
        })
    }

    fn execute(self, _os: &dyn OsServices) -> Result<(), CommandError> {
        info!(args = ?self.args, "reboot request acknowledged");
        Ok(())
    }
}

/// `partctr <partition> <action> ...`: partition-control request, acknowledged only.
pub struct PartCtr {
    pub args: Vec<String>,
}

impl Builtin for PartCtr {
    fn name() -> &'static str {
        "partctr"
    }

    fn parse(args: &[String], _os: &dyn OsServices) -> Result<Self, CommandError> {
        at_least(Self::name(), 2, "partition, action", args)?;
        Ok(Self {
            args: args.to_vec(),
        })
    }

    fn execute(self, _os: &dyn OsServices) -> Result<(), CommandError> {
        info!(args = ?self.args, "partctr request acknowledged");
        Ok(())
    }
}
