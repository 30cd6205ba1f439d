/*!
 * Shared helpers for process tests
 */

#![cfg(unix)]
#![allow(dead_code)]

use std::time::{Duration, Instant};
use subprocess_core::{Pipe, PipeReader, Process, SpawnConfig, StdioKind};

/// Argument vector running `script` under /bin/sh
pub fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Launch `script` with stdout captured
pub fn capture(script: &str) -> (Process, PipeReader) {
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config.redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config.exec(sh(script), None).unwrap();
    (process, pipe.open_read().unwrap())
}

/// Poll `condition` until it holds or `timeout` passes
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
