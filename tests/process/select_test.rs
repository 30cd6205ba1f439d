/*!
 * Select Tests
 */

#![cfg(unix)]

use super::common::sh;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use subprocess_core::{select, ExitStatus, Process, SpawnConfig};

fn start(script: &str) -> Process {
    SpawnConfig::new().exec(sh(script), None).unwrap()
}

#[test]
fn test_select_empty_set() {
    assert_eq!(select(&[]).unwrap(), None);
}

#[test]
fn test_select_returns_already_exited_member() {
    let long = SpawnConfig::new().exec(["/bin/sleep", "30"], None).unwrap();
    let quick = start("exit 2");
    assert_eq!(quick.wait().unwrap(), ExitStatus::Exited(2));

    let started = Instant::now();
    assert_eq!(select(&[&long, &quick]).unwrap(), Some(1));
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(long.kill(None));
    long.wait().unwrap();
}

#[test]
fn test_select_returns_exited_but_unreaped_member() {
    let quick = start("exit 0");
    let long = SpawnConfig::new().exec(["/bin/sleep", "30"], None).unwrap();

    assert_eq!(select(&[&long, &quick]).unwrap(), Some(1));
    // select leaves the status for wait
    assert_eq!(quick.exit_status(), None);
    assert_eq!(quick.wait().unwrap(), ExitStatus::Exited(0));

    assert!(long.kill(None));
    long.wait().unwrap();
}

#[test]
fn test_select_blocks_until_first_exit() {
    let long = SpawnConfig::new().exec(["/bin/sleep", "30"], None).unwrap();
    let short = start("sleep 0.3; exit 6");

    let started = Instant::now();
    assert_eq!(select(&[&long, &short]).unwrap(), Some(1));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(long.is_running());

    assert_eq!(short.wait().unwrap(), ExitStatus::Exited(6));
    assert!(long.kill(None));
    assert_eq!(long.wait().unwrap(), ExitStatus::Signaled(15));
}

#[test]
fn test_select_single_member() {
    let only = start("sleep 0.1");
    assert_eq!(select(&[&only]).unwrap(), Some(0));
    only.wait().unwrap();
}
