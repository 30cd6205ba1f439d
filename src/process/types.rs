/*!
 * Process Types
 * Common types for process creation and lifecycle
 */

use crate::core::types::Descriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal sent by `Process::kill(None)`; the exit code used on Windows
pub const DEFAULT_KILL_SIGNAL: i32 = 15;

/// How a child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Normal exit with a status code
    Exited(i32),
    /// Terminated by a signal (Unix) or by `kill` with this code (Windows)
    Signaled(i32),
}

impl ExitStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Signaled(sig) => Some(*sig),
            ExitStatus::Exited(_) => None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    /// Collapse into one number the way shells do: signals become 128 + n
    pub fn code_or_signal(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(sig) => 128 + sig,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(sig) => write!(f, "signal {}", sig),
        }
    }
}

/// Observable lifecycle state of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Created, waiting for `resume` before running user code
    Suspended,
    /// Running (or exited but not yet observed)
    Running,
    /// Exit observed and reclaimed
    Exited(ExitStatus),
}

impl ProcessState {
    pub fn is_exited(&self) -> bool {
        matches!(self, ProcessState::Exited(_))
    }
}

/// Console attachment of a Windows child; ignored on Unix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Console {
    /// Share the parent's console
    #[default]
    Inherit,
    /// No console window at all
    Disable,
    /// Fresh console window
    New,
    /// No console, and none inherited
    Detached,
    /// Fresh console, window hidden
    Hide,
}

/// Where one standard stream of the child points
#[derive(Debug)]
pub enum StdioTarget {
    /// The parent's own stream
    Inherit,
    /// A descriptor handed over by the caller
    Redirect(Descriptor),
}
