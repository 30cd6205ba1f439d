/*!
 * Subprocess Core Library
 * Cross-platform child process creation, piping and lifecycle tracking
 */

pub mod core;
pub mod monitoring;
pub mod pipe;
pub mod process;

// Re-exports
pub use crate::core::errors::{LaunchStage, SubprocessError, SubprocessResult};
pub use crate::core::types::{BorrowedDescriptor, Descriptor, NativeHandle, Pid, StdioKind};
pub use monitoring::{init_tracing, spawn_span};
pub use pipe::{dup, peek, AsDescriptor, Pipe, PipeReader, PipeWriter};
pub use process::{
    current_id, orphans, outstanding, reap_orphans, select, set_current, spawn, Console,
    EnvBuilder, EnvDiff, EnvOp, ExitStatus, Process, ProcessState, SpawnConfig, SpawnOptions,
    Spawned, StdioOption, StdioTarget, DEFAULT_KILL_SIGNAL,
};
