/*!
 * Child Registry
 * Tracks children that have not been reclaimed yet
 *
 * Every successful exec is tracked. A child whose `Process` handle goes
 * away before `wait` is moved to the orphaned state; orphans are reaped
 * opportunistically at the next exec, wait or select, or explicitly via
 * `reap_orphans`.
 */

use super::sys;
use crate::core::types::Pid;
use dashmap::DashMap;
use std::sync::OnceLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildState {
    /// A live `Process` handle will reclaim it
    Owned,
    /// Handle released; reaped by `reap_orphans`
    Orphaned,
}

fn registry() -> &'static DashMap<Pid, ChildState> {
    static REGISTRY: OnceLock<DashMap<Pid, ChildState>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

/// Record a freshly launched child
pub(crate) fn track(pid: Pid) {
    registry().insert(pid, ChildState::Owned);
}

/// The child was reclaimed through its handle
pub(crate) fn reclaimed(pid: Pid) {
    registry().remove(&pid);
}

/// The handle was released before reclamation
pub(crate) fn orphan(pid: Pid) {
    registry().insert(pid, ChildState::Orphaned);
    debug!(pid, "Child orphaned");
}

/// Forget a child the platform reaps on its own
pub(crate) fn forget(pid: Pid) {
    registry().remove(&pid);
}

/// Reap every orphan that has exited, without blocking
///
/// Returns the number of children reclaimed.
pub fn reap_orphans() -> usize {
    // Snapshot first; reaping while iterating would hold shard locks
    let pending = orphans();
    if pending.is_empty() {
        return 0;
    }

    let mut reaped = 0;
    for pid in pending {
        if sys::try_reap(pid) {
            registry().remove(&pid);
            reaped += 1;
        }
    }

    if reaped > 0 {
        info!("Reaped {} orphaned children", reaped);
    }
    reaped
}

/// Children released without being reclaimed
pub fn orphans() -> Vec<Pid> {
    registry()
        .iter()
        .filter(|entry| *entry.value() == ChildState::Orphaned)
        .map(|entry| *entry.key())
        .collect()
}

/// Number of children launched and not reclaimed, owned or orphaned
pub fn outstanding() -> usize {
    registry().len()
}
