/*!
 * Core Types
 * Common types used across the subprocess core
 */

use serde::{Deserialize, Serialize};

/// OS process identifier
pub type Pid = u32;

/// Owned OS I/O descriptor
#[cfg(unix)]
pub type Descriptor = std::os::fd::OwnedFd;
#[cfg(windows)]
pub type Descriptor = std::os::windows::io::OwnedHandle;

/// Borrowed OS I/O descriptor
#[cfg(unix)]
pub type BorrowedDescriptor<'a> = std::os::fd::BorrowedFd<'a>;
#[cfg(windows)]
pub type BorrowedDescriptor<'a> = std::os::windows::io::BorrowedHandle<'a>;

/// Raw platform identity of a child: the pid on Unix, the process handle on Windows
#[cfg(unix)]
pub type NativeHandle = libc::pid_t;
#[cfg(windows)]
pub type NativeHandle = std::os::windows::io::RawHandle;

/// Standard stream of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioKind {
    Input,
    Output,
    Error,
}

impl StdioKind {
    pub const ALL: [StdioKind; 3] = [StdioKind::Input, StdioKind::Output, StdioKind::Error];

    /// Slot in a three-entry stdio table, also the Unix target descriptor
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            StdioKind::Input => 0,
            StdioKind::Output => 1,
            StdioKind::Error => 2,
        }
    }
}
