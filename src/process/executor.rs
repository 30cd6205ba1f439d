/*!
 * Spawn Configuration
 * One-shot builder consumed by `exec` to create a child process
 */

use super::cleanup;
use super::env::{validate_name, EnvDiff};
use super::handle::Process;
use super::search;
use super::sys::{self, LaunchPlan};
use super::types::{Console, StdioTarget};
use crate::core::errors::{LaunchStage, SubprocessError, SubprocessResult};
use crate::core::types::{Descriptor, StdioKind};
use crate::monitoring::spawn_span;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Everything that describes how to create one child
///
/// Setters record and never fail; validation happens in [`exec`](Self::exec),
/// which consumes the configuration.
#[derive(Debug, Default)]
pub struct SpawnConfig {
    stdio: [Option<StdioTarget>; 3],
    env: Option<EnvDiff>,
    shared: Vec<(String, Descriptor)>,
    suspended: bool,
    detached: bool,
    console: Console,
    hide_window: bool,
    search_path: bool,
}

impl SpawnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point one standard stream of the child at `descriptor`
    ///
    /// Ownership moves into the configuration; the parent's copy is closed
    /// once the child holds its own. A later call for the same stream wins.
    pub fn redirect(&mut self, kind: StdioKind, descriptor: Descriptor) -> &mut Self {
        self.stdio[kind.index()] = Some(StdioTarget::Redirect(descriptor));
        self
    }

    /// Let the child use the parent's own stream
    pub fn inherit(&mut self, kind: StdioKind) -> &mut Self {
        self.stdio[kind.index()] = Some(StdioTarget::Inherit);
        self
    }

    /// Apply an environment diff; without one the child inherits unmodified
    pub fn env(&mut self, diff: EnvDiff) -> &mut Self {
        self.env = Some(diff);
        self
    }

    /// Make `descriptor` visible to the child and export its raw value as
    /// the environment variable `name`
    pub fn share(&mut self, name: impl Into<String>, descriptor: Descriptor) -> &mut Self {
        self.shared.push((name.into(), descriptor));
        self
    }

    /// Create the child without letting it run until `Process::resume`
    pub fn suspended(&mut self) -> &mut Self {
        self.suspended = true;
        self
    }

    /// Disconnect the child from this process's session (Unix) or job and
    /// process group (Windows)
    pub fn detached(&mut self) -> &mut Self {
        self.detached = true;
        self
    }

    /// Console attachment; Windows only
    pub fn console(&mut self, console: Console) -> &mut Self {
        self.console = console;
        self
    }

    /// Hide the child's main window; Windows only
    pub fn hide_window(&mut self) -> &mut Self {
        self.hide_window = true;
        self
    }

    /// Resolve a bare program name against the child's PATH
    pub fn search_path(&mut self) -> &mut Self {
        self.search_path = true;
        self
    }

    /// Create the child
    ///
    /// `args[0]` names the program. Either a running (or suspended)
    /// [`Process`] is returned, or an error and no child at all.
    pub fn exec<I, S>(self, args: I, cwd: Option<&Path>) -> SubprocessResult<Process>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        cleanup::reap_orphans();

        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let program = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();

        let span = spawn_span(&program);
        let _entered = span.enter();

        let result = self
            .plan(program.clone(), args, cwd)
            .and_then(sys::launch);

        match result {
            Ok(launched) => {
                let pid = launched.child.id();
                span.record_pid(pid);
                cleanup::track(pid);
                info!(
                    pid,
                    suspended = launched.suspended,
                    "Spawned process '{}'",
                    program
                );
                Ok(Process::new(program, launched.child, launched.suspended))
            }
            Err(e) => {
                if let SubprocessError::LaunchFailure { stage, .. } = &e {
                    span.record_failure(stage.as_str());
                }
                error!("Failed to spawn '{}': {}", program, e);
                Err(e)
            }
        }
    }

    /// Validate and resolve everything the backend needs
    fn plan(self, display: String, args: Vec<OsString>, cwd: Option<&Path>) -> SubprocessResult<LaunchPlan> {
        if args.is_empty() {
            return Err(SubprocessError::rejected(
                &display,
                LaunchStage::Prepare,
                "empty argument list",
            ));
        }
        if args.iter().any(|a| contains_nul(a)) {
            return Err(SubprocessError::rejected(
                &display,
                LaunchStage::Prepare,
                "argument contains a NUL byte",
            ));
        }
        if let Some(diff) = &self.env {
            for (name, _) in diff.iter() {
                validate_name(name)
                    .map_err(|msg| SubprocessError::rejected(&display, LaunchStage::Prepare, msg))?;
            }
        }
        for (name, _) in &self.shared {
            validate_name(name)
                .map_err(|msg| SubprocessError::rejected(&display, LaunchStage::Prepare, msg))?;
        }

        let env = match &self.env {
            Some(diff) => diff.materialize_current(),
            None => std::env::vars_os().collect(),
        };

        let program = if self.search_path {
            search::resolve(&args[0], &env).ok_or_else(|| {
                SubprocessError::rejected(&display, LaunchStage::Resolve, "not found on PATH")
            })?
        } else {
            PathBuf::from(&args[0])
        };

        Ok(LaunchPlan {
            display,
            program,
            args,
            env,
            cwd: cwd.map(Path::to_path_buf),
            stdio: self.stdio,
            shared: self.shared,
            suspended: self.suspended,
            detached: self.detached,
            console: self.console,
            hide_window: self.hide_window,
        })
    }
}

#[cfg(unix)]
fn contains_nul(s: &OsStr) -> bool {
    use std::os::unix::ffi::OsStrExt;
    s.as_bytes().contains(&0)
}

#[cfg(windows)]
fn contains_nul(s: &OsStr) -> bool {
    use std::os::windows::ffi::OsStrExt;
    s.encode_wide().any(|c| c == 0)
}
