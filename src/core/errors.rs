/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Subprocess operation result
pub type SubprocessResult<T> = Result<T, SubprocessError>;

/// Stage of process creation at which a launch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStage {
    /// Argument, environment or path validation before any OS call
    Prepare,
    /// Executable lookup on the search path
    Resolve,
    /// Creating the child (fork / CreateProcessW)
    Create,
    /// New session for a detached child
    Session,
    /// Standard stream redirection inside the child
    Redirect,
    /// Marking shared descriptors inheritable
    Share,
    /// Changing the working directory
    Chdir,
    /// Replacing the child image
    Exec,
    /// Placing the child into the kill-on-close job
    Job,
}

impl LaunchStage {
    pub(crate) const ALL: [LaunchStage; 9] = [
        LaunchStage::Prepare,
        LaunchStage::Resolve,
        LaunchStage::Create,
        LaunchStage::Session,
        LaunchStage::Redirect,
        LaunchStage::Share,
        LaunchStage::Chdir,
        LaunchStage::Exec,
        LaunchStage::Job,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStage::Prepare => "prepare",
            LaunchStage::Resolve => "resolve",
            LaunchStage::Create => "create",
            LaunchStage::Session => "session",
            LaunchStage::Redirect => "redirect",
            LaunchStage::Share => "share",
            LaunchStage::Chdir => "chdir",
            LaunchStage::Exec => "exec",
            LaunchStage::Job => "job",
        }
    }

    /// Wire tag used by the child side of the exec handshake
    pub(crate) fn tag(&self) -> u32 {
        *self as u32 + 1
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.tag() == tag)
    }
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subprocess errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SubprocessError {
    #[error("{op}: resource exhausted: {message}")]
    #[diagnostic(
        code(subprocess::resource),
        help("The OS ran out of descriptors, handles or process slots. Close unused pipes and reclaim exited children.")
    )]
    Resource {
        op: String,
        code: Option<i32>,
        message: String,
    },

    #[error("{op}: {message} (os error {code})")]
    #[diagnostic(
        code(subprocess::system),
        help("The underlying system call failed. The OS error code identifies the cause.")
    )]
    System { op: String, code: i32, message: String },

    #[error("Invalid handle: {0}")]
    #[diagnostic(
        code(subprocess::invalid_handle),
        help("The endpoint or process is not in a state that supports this operation.")
    )]
    InvalidHandle(String),

    #[error("Failed to launch '{program}' at {stage}: {message}")]
    #[diagnostic(
        code(subprocess::launch_failure),
        help("The child never started running the target program. Check the path, permissions and working directory.")
    )]
    LaunchFailure {
        program: String,
        stage: LaunchStage,
        code: Option<i32>,
        message: String,
    },

    #[error("subprocess({0}) may become a zombie process")]
    #[diagnostic(
        code(subprocess::zombie_risk),
        severity(Warning),
        help("The child was launched but nothing will reap it until reap_orphans() runs.")
    )]
    ZombieRisk(Pid),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(subprocess::invalid_argument))]
    InvalidArgument(String),
}

impl SubprocessError {
    /// Classify an I/O error raised by `op`
    pub fn from_io(op: impl Into<String>, err: io::Error) -> Self {
        let op = op.into();
        let message = err.to_string();
        match err.raw_os_error() {
            Some(code) if is_resource_code(code) => SubprocessError::Resource {
                op,
                code: Some(code),
                message,
            },
            Some(code) => SubprocessError::System { op, code, message },
            None => SubprocessError::System {
                op,
                code: -1,
                message,
            },
        }
    }

    /// Classify the calling thread's last OS error
    pub fn last_os_error(op: impl Into<String>) -> Self {
        Self::from_io(op, io::Error::last_os_error())
    }

    /// Launch failure carrying an OS error code
    pub fn launch(program: &str, stage: LaunchStage, err: io::Error) -> Self {
        SubprocessError::LaunchFailure {
            program: program.to_string(),
            stage,
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    /// Launch failure detected before any OS call
    pub fn rejected(program: &str, stage: LaunchStage, message: impl Into<String>) -> Self {
        SubprocessError::LaunchFailure {
            program: program.to_string(),
            stage,
            code: None,
            message: message.into(),
        }
    }

    /// OS error code, when one is attached
    pub fn os_code(&self) -> Option<i32> {
        match self {
            SubprocessError::Resource { code, .. } => *code,
            SubprocessError::System { code, .. } => Some(*code),
            SubprocessError::LaunchFailure { code, .. } => *code,
            _ => None,
        }
    }
}

#[cfg(unix)]
impl From<nix::errno::Errno> for SubprocessError {
    fn from(errno: nix::errno::Errno) -> Self {
        SubprocessError::from_io("syscall", io::Error::from(errno))
    }
}

#[cfg(unix)]
fn is_resource_code(code: i32) -> bool {
    matches!(
        code,
        libc::EMFILE | libc::ENFILE | libc::EAGAIN | libc::ENOMEM | libc::ENOSPC
    )
}

#[cfg(windows)]
fn is_resource_code(code: i32) -> bool {
    use windows_sys::Win32::Foundation::{
        ERROR_NOT_ENOUGH_MEMORY, ERROR_NO_SYSTEM_RESOURCES, ERROR_OUTOFMEMORY,
        ERROR_TOO_MANY_OPEN_FILES,
    };
    matches!(
        code as u32,
        ERROR_NOT_ENOUGH_MEMORY
            | ERROR_OUTOFMEMORY
            | ERROR_NO_SYSTEM_RESOURCES
            | ERROR_TOO_MANY_OPEN_FILES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tags_round_trip() {
        for stage in LaunchStage::ALL {
            assert_eq!(LaunchStage::from_tag(stage.tag()), Some(stage));
        }
        assert_eq!(LaunchStage::from_tag(0), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_descriptor_exhaustion_is_resource() {
        let err = SubprocessError::from_io("pipe", io::Error::from_raw_os_error(libc::EMFILE));
        assert!(matches!(err, SubprocessError::Resource { code: Some(c), .. } if c == libc::EMFILE));
    }

    #[cfg(unix)]
    #[test]
    fn test_other_errno_is_system() {
        let err = SubprocessError::from_io("waitpid", io::Error::from_raw_os_error(libc::ECHILD));
        assert_eq!(err.os_code(), Some(libc::ECHILD));
        assert!(matches!(err, SubprocessError::System { .. }));
        assert!(err.to_string().starts_with("waitpid: "));
    }

    #[test]
    fn test_error_serialization_tag() {
        let err = SubprocessError::ZombieRisk(42);
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"error_type":"zombie_risk","details":42}"#);
    }

    #[test]
    fn test_launch_failure_display() {
        let err = SubprocessError::rejected("prog", LaunchStage::Prepare, "empty argument list");
        assert_eq!(
            err.to_string(),
            "Failed to launch 'prog' at prepare: empty argument list"
        );
    }
}
