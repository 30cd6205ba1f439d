/*!
 * Process Multiplexer
 * Block until any member of a set of children has exited
 */

use super::cleanup;
use super::handle::Process;
use crate::core::errors::SubprocessResult;
use tracing::debug;

/// Wait for any of `set` to exit
///
/// Returns the index of a member observed exited, promptly if one already
/// has. `None` for an empty set. Blocks with no timeout otherwise; the
/// member is not reclaimed, call `wait` on it for its status.
pub fn select(set: &[&Process]) -> SubprocessResult<Option<usize>> {
    cleanup::reap_orphans();
    if set.is_empty() {
        return Ok(None);
    }

    let mut targets = Vec::with_capacity(set.len());
    for (index, process) in set.iter().enumerate() {
        match process.live_target()? {
            Some(target) => targets.push(target),
            None => return Ok(Some(index)),
        }
    }

    let index = super::sys::wait_any(&targets)?;
    debug!(index, pid = set[index].id(), "Select observed exit");
    Ok(Some(index))
}
