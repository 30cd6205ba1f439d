/*!
 * Process Module
 * Child creation, lifecycle and multiplexed waiting
 */

pub mod cleanup;
pub mod env;
pub mod executor;
pub mod handle;
pub mod options;
pub mod select;
pub mod types;

mod search;
mod sys;

// Re-export for convenience
pub use cleanup::{orphans, outstanding, reap_orphans};
pub use env::{set_current, EnvBuilder, EnvDiff, EnvOp};
pub use executor::SpawnConfig;
pub use handle::{current_id, Process};
pub use options::{spawn, Spawned, SpawnOptions, StdioOption};
pub use select::select;
pub use types::{Console, ExitStatus, ProcessState, StdioTarget, DEFAULT_KILL_SIGNAL};
