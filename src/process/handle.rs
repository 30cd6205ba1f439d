/*!
 * Process Handle
 * Lifecycle of one created child: wait, kill, resume, detach
 */

use super::cleanup;
use super::sys;
use super::types::{ExitStatus, ProcessState, DEFAULT_KILL_SIGNAL};
use crate::core::errors::{SubprocessError, SubprocessResult};
use crate::core::types::{NativeHandle, Pid};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use tracing::{debug, error, info, warn};

struct Lifecycle {
    child: sys::Child,
    state: ProcessState,
}

/// Handle to a created child process
///
/// Exclusively owns the child. `wait` may be called concurrently from
/// several threads (share the handle behind an `Arc`); exactly one of them
/// reclaims the child and all observe the same status.
///
/// Dropping a handle whose child was never reclaimed orphans the child;
/// it is reaped later by [`reap_orphans`](crate::process::reap_orphans).
pub struct Process {
    pid: Pid,
    program: String,
    /// Guards the child identity; reaping takes it exclusively
    lifecycle: RwLock<Lifecycle>,
    /// Serializes reclaimers
    reap: Mutex<()>,
    detached: bool,
}

impl Process {
    pub(crate) fn new(program: String, child: sys::Child, suspended: bool) -> Self {
        let state = if suspended {
            ProcessState::Suspended
        } else {
            ProcessState::Running
        };
        Self {
            pid: child.id(),
            program,
            lifecycle: RwLock::new(Lifecycle { child, state }),
            reap: Mutex::new(()),
            detached: false,
        }
    }

    /// OS process id
    pub fn id(&self) -> Pid {
        self.pid
    }

    /// Program name the child was launched as
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw platform identity: the pid on Unix, the process handle on Windows
    pub fn native_handle(&self) -> NativeHandle {
        self.lifecycle.read().child.native_handle()
    }

    pub fn state(&self) -> ProcessState {
        self.lifecycle.read().state
    }

    /// Cached exit status, present once the child was reclaimed
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.lifecycle.read().state {
            ProcessState::Exited(status) => Some(status),
            _ => None,
        }
    }

    /// Whether the child is still alive; never blocks, never reaps
    pub fn is_running(&self) -> bool {
        let lifecycle = self.lifecycle.read();
        if lifecycle.state.is_exited() {
            return false;
        }
        match lifecycle.child.probe_exited() {
            Ok(exited) => !exited,
            Err(e) => {
                debug!(pid = self.pid, "Liveness probe failed: {}", e);
                false
            }
        }
    }

    /// Block until the child exits and reclaim it
    ///
    /// Idempotent: later calls return the cached status.
    pub fn wait(&self) -> SubprocessResult<ExitStatus> {
        cleanup::reap_orphans();

        let _reaper = self.reap.lock();
        let target = {
            let lifecycle = self.lifecycle.read();
            if let ProcessState::Exited(status) = lifecycle.state {
                return Ok(status);
            }
            lifecycle.child.wait_target()
        };

        // Block without reaping so kill/is_running never see a recycled pid
        sys::wait_one(target)?;

        let mut lifecycle = self.lifecycle.write();
        let status = lifecycle.child.reap()?;
        lifecycle.state = ProcessState::Exited(status);
        drop(lifecycle);

        cleanup::reclaimed(self.pid);
        info!(pid = self.pid, program = %self.program, "Process exited with {}", status);
        Ok(status)
    }

    /// Ask the child to terminate
    ///
    /// `None` sends [`DEFAULT_KILL_SIGNAL`]. On Windows the value becomes
    /// the exit code. Returns whether the OS accepted the request; an
    /// exited child yields `false`.
    pub fn kill(&self, signal: Option<i32>) -> bool {
        let signal = signal.unwrap_or(DEFAULT_KILL_SIGNAL);
        let lifecycle = self.lifecycle.read();
        if lifecycle.state.is_exited() {
            return false;
        }
        let delivered = lifecycle.child.signal(signal);
        if delivered {
            info!(pid = self.pid, signal, "Sent termination request");
        }
        delivered
    }

    /// Let a suspended child start running
    ///
    /// A no-op returning `true` when the child was not suspended. Returns
    /// `false` if the child could not continue into the target program.
    pub fn resume(&self) -> bool {
        let mut lifecycle = self.lifecycle.write();
        if lifecycle.state != ProcessState::Suspended {
            return true;
        }
        lifecycle.state = ProcessState::Running;

        match lifecycle.child.resume(&self.program) {
            Ok(resumed) => {
                if resumed {
                    debug!(pid = self.pid, "Resumed suspended child");
                }
                resumed
            }
            Err(e) => {
                error!(pid = self.pid, "Resume failed: {}", e);
                false
            }
        }
    }

    /// Wait target while the child is alive, `None` once it has exited
    pub(crate) fn live_target(&self) -> SubprocessResult<Option<sys::WaitTarget>> {
        let lifecycle = self.lifecycle.read();
        if lifecycle.state.is_exited() || lifecycle.child.probe_exited()? {
            return Ok(None);
        }
        Ok(Some(lifecycle.child.wait_target()))
    }

    /// Give up responsibility for reclaiming the child
    ///
    /// Returns `true` when nothing is left to reclaim: the child was already
    /// reaped, or the platform reaps exited children by itself. Otherwise
    /// the child is orphaned into the registry and `false` is returned.
    /// A still-suspended child is killed first.
    pub fn detach(mut self) -> bool {
        self.detached = true;

        let mut lifecycle = self.lifecycle.write();
        if lifecycle.state.is_exited() {
            return true;
        }
        if lifecycle.child.is_parked() {
            lifecycle.child.kill_parked();
        }
        drop(lifecycle);

        if sys::auto_reaps() {
            cleanup::forget(self.pid);
            debug!(pid = self.pid, "Detached child");
            return true;
        }

        cleanup::orphan(self.pid);
        warn!(pid = self.pid, "{}", SubprocessError::ZombieRisk(self.pid));
        false
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let lifecycle = self.lifecycle.get_mut();
        if lifecycle.state.is_exited() {
            return;
        }
        if lifecycle.child.is_parked() {
            debug!(pid = self.pid, "Killing never-resumed child");
            lifecycle.child.kill_parked();
        }

        if sys::auto_reaps() {
            cleanup::forget(self.pid);
            return;
        }
        cleanup::orphan(self.pid);
        warn!(
            pid = self.pid,
            program = %self.program,
            "Dropped unreclaimed child: {}",
            SubprocessError::ZombieRisk(self.pid)
        );
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("program", &self.program)
            .field("state", &self.state())
            .finish()
    }
}

/// Id of the calling process
pub fn current_id() -> Pid {
    sys::current_id()
}
