//! The operating-system services the built-in commands are allowed to use.
//!
//! Handlers never touch the OS directly: they go through [`OsServices`], so the
//! set of privileged primitives reachable from a script is exactly this trait.

use crate::env::{HostEnv, ProcessEnv};
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Gid, Group, Pid, Uid, User};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use sysinfo::{PidExt, Process, ProcessExt, System, SystemExt};
use tracing::debug;

/// Privileged primitives available to command handlers.
pub trait OsServices: HostEnv + Send + Sync {
    /// Remove a file, symlink or whole directory tree.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Create a directory and all missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace the permission bits of `path`.
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Resolve a user name to its uid, `None` if there is no such user.
    fn user_id(&self, name: &str) -> io::Result<Option<u32>>;

    /// Resolve a group name to its gid, `None` if there is no such group.
    fn group_id(&self, name: &str) -> io::Result<Option<u32>>;

    /// Change the owning user and group of `path`.
    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;

    /// Send `signal` to every process named exactly `name`.
    ///
    /// Returns how many processes were signaled; zero is not an error.
    fn signal_processes(&self, name: &str, signal: Signal) -> io::Result<usize>;

    /// Read a whole text document.
    fn read_document(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of a text document.
    fn write_document(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Copy a regular file, returning the number of bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// Linux keeps only the first 15 bytes of a process name.
fn process_matches(process: &Process, name: &str) -> bool {
    let file_name = |path: &Path| path.file_name().is_some_and(|f| f == name);
    process.name() == name
        || file_name(process.exe())
        || process.cmd().first().is_some_and(|arg0| file_name(Path::new(arg0)))
}

/// [`OsServices`] backed by the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostOs;

impl HostEnv for HostOs {
    fn var(&self, key: &str) -> Option<String> {
        ProcessEnv.var(key)
    }
}

impl OsServices for HostOs {
    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    fn user_id(&self, name: &str) -> io::Result<Option<u32>> {
        let user = User::from_name(name).map_err(io::Error::from)?;
        Ok(user.map(|u| u.uid.as_raw()))
    }

    fn group_id(&self, name: &str) -> io::Result<Option<u32>> {
        let group = Group::from_name(name).map_err(io::Error::from)?;
        Ok(group.map(|g| g.gid.as_raw()))
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        unistd::chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(io::Error::from)
    }

    fn signal_processes(&self, name: &str, sig: Signal) -> io::Result<usize> {
        let own_pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes();

        let mut signaled = 0;
        for (pid, process) in sys.processes() {
            let raw = pid.as_u32();
            if raw == own_pid || !process_matches(process, name) {
                continue;
            }
            match signal::kill(Pid::from_raw(raw as i32), sig) {
                Ok(()) => signaled += 1,
                // Exited after we listed it.
                Err(nix::errno::Errno::ESRCH) => debug!(pid = raw, "process already gone"),
                Err(e) => return Err(io::Error::from(e)),
            }
        }
        Ok(signaled)
    }

    fn read_document(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_document(&self, path: &Path, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! A recording, in-memory [`OsServices`] for unit tests.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Remove(PathBuf),
        CreateDir(PathBuf),
        SetMode(PathBuf, u32),
        SetOwner(PathBuf, u32, u32),
        Signal(String, Signal),
        Write(PathBuf, String),
        Copy(PathBuf, PathBuf),
    }

    #[derive(Default)]
    pub struct FakeOs {
        pub users: HashMap<String, u32>,
        pub groups: HashMap<String, u32>,
        pub env: HashMap<String, String>,
        pub processes: Vec<String>,
        pub documents: Mutex<HashMap<PathBuf, String>>,
        pub existing: Mutex<HashSet<PathBuf>>,
        pub fail_chmod: bool,
        pub calls: Mutex<Vec<Call>>,
    }

    impl FakeOs {
        pub fn new() -> Self {
            let mut os = Self::default();
            os.users.insert("svc".to_string(), 1001);
            os.users.insert("root".to_string(), 0);
            os.groups.insert("svc".to_string(), 2001);
            os.groups.insert("root".to_string(), 0);
            os
        }

        pub fn with_document(self, path: &str, contents: &str) -> Self {
            self.documents
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), contents.to_string());
            self
        }

        pub fn with_path(self, path: &str) -> Self {
            self.existing.lock().unwrap().insert(PathBuf::from(path));
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn document(&self, path: &str) -> Option<String> {
            self.documents.lock().unwrap().get(Path::new(path)).cloned()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl HostEnv for FakeOs {
        fn var(&self, key: &str) -> Option<String> {
            self.env.get(key).cloned()
        }
    }

    impl OsServices for FakeOs {
        fn remove_all(&self, path: &Path) -> io::Result<()> {
            self.record(Call::Remove(path.to_path_buf()));
            if self.existing.lock().unwrap().remove(path) {
                Ok(())
            } else {
                Err(io::Error::from(io::ErrorKind::NotFound))
            }
        }

        fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            self.record(Call::CreateDir(path.to_path_buf()));
            self.existing.lock().unwrap().insert(path.to_path_buf());
            Ok(())
        }

        fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
            if self.fail_chmod {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.record(Call::SetMode(path.to_path_buf(), mode));
            Ok(())
        }

        fn user_id(&self, name: &str) -> io::Result<Option<u32>> {
            Ok(self.users.get(name).copied())
        }

        fn group_id(&self, name: &str) -> io::Result<Option<u32>> {
            Ok(self.groups.get(name).copied())
        }

        fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
            self.record(Call::SetOwner(path.to_path_buf(), uid, gid));
            Ok(())
        }

        fn signal_processes(&self, name: &str, sig: Signal) -> io::Result<usize> {
            self.record(Call::Signal(name.to_string(), sig));
            Ok(self.processes.iter().filter(|p| *p == name).count())
        }

        fn read_document(&self, path: &Path) -> io::Result<String> {
            self.documents
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }

        fn write_document(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.record(Call::Write(path.to_path_buf(), contents.to_string()));
            self.documents
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
            self.record(Call::Copy(from.to_path_buf(), to.to_path_buf()));
            Ok(0)
        }
    }
}
