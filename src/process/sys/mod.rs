/*!
 * Platform Layer
 * One launch/wait/signal interface, selected at compile time
 *
 * Both backends expose the same items:
 * - `launch(LaunchPlan) -> Launched`
 * - `Child` with `id`, `native_handle`, `wait_target`, `probe_exited`,
 *   `reap`, `signal`, `resume`, `kill_parked`
 * - `wait_one`, `wait_any` over `WaitTarget`s
 * - `try_reap`, `auto_reaps`, `current_id`
 */

use super::types::{Console, StdioTarget};
use crate::core::types::Descriptor;
use std::ffi::OsString;
use std::path::PathBuf;

pub(crate) mod cmdline;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::*;

/// Everything the backend needs to create one child
///
/// Built and validated by `SpawnConfig::exec`; the backend consumes it.
#[derive(Debug)]
pub(crate) struct LaunchPlan {
    /// Name used in errors and logs (argv[0] as given)
    pub display: String,
    /// Resolved program path
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Fully materialized child environment
    pub env: Vec<(OsString, OsString)>,
    pub cwd: Option<PathBuf>,
    pub stdio: [Option<StdioTarget>; 3],
    /// Descriptors made visible to the child, exported under these names
    pub shared: Vec<(String, Descriptor)>,
    pub suspended: bool,
    pub detached: bool,
    #[cfg_attr(unix, allow(dead_code))]
    pub console: Console,
    #[cfg_attr(unix, allow(dead_code))]
    pub hide_window: bool,
}

/// Outcome of a successful launch
#[derive(Debug)]
pub(crate) struct Launched {
    pub child: Child,
    /// The child is parked until `Child::resume`
    pub suspended: bool,
}
