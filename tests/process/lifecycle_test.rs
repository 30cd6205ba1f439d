/*!
 * Lifecycle Tests
 * wait, kill, resume, detach and drop
 */

#![cfg(unix)]

use super::common::{capture, eventually, sh};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use subprocess_core::{
    orphans, peek, reap_orphans, ExitStatus, Pipe, ProcessState, SpawnConfig, StdioKind,
};

#[test]
fn test_resume_running_process_is_noop() {
    let process = SpawnConfig::new().exec(sh("exit 0"), None).unwrap();
    assert_eq!(process.state(), ProcessState::Running);
    assert!(process.resume());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(0));
    assert!(process.resume());
}

#[test]
fn test_suspended_child_runs_only_after_resume() {
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config
        .suspended()
        .redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config.exec(sh("printf started"), None).unwrap();
    let mut reader = pipe.open_read().unwrap();

    assert_eq!(process.state(), ProcessState::Suspended);
    assert!(process.is_running());
    thread::sleep(Duration::from_millis(100));
    assert_eq!(peek(&reader).unwrap(), 0);

    assert!(process.resume());
    assert_eq!(process.state(), ProcessState::Running);
    assert_eq!(reader.read_all().unwrap(), b"started".to_vec());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn test_suspended_missing_program_fails_on_resume() {
    let mut config = SpawnConfig::new();
    config.suspended();
    let process = config
        .exec(["/nonexistent/subprocess-core-parked"], None)
        .unwrap();

    assert!(!process.resume());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(127));
}

#[test]
#[serial]
fn test_resume_after_parked_child_died() {
    // A host that does not ignore SIGPIPE must survive a resume into a dead child
    let previous = unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL) };

    let mut config = SpawnConfig::new();
    config.suspended();
    let process = config.exec(sh("exit 0"), None).unwrap();
    assert!(process.kill(Some(libc::SIGKILL)));
    assert!(eventually(Duration::from_secs(5), || !process.is_running()));

    let resumed = process.resume();
    unsafe { libc::signal(libc::SIGPIPE, previous) };

    assert!(!resumed);
    assert_eq!(process.wait().unwrap(), ExitStatus::Signaled(libc::SIGKILL));
}

#[test]
fn test_wait_is_idempotent() {
    let process = SpawnConfig::new().exec(sh("exit 3"), None).unwrap();
    let first = process.wait().unwrap();
    assert_eq!(first, ExitStatus::Exited(3));
    assert_eq!(process.wait().unwrap(), first);
    assert_eq!(process.exit_status(), Some(first));
    assert_eq!(process.state(), ProcessState::Exited(first));
}

#[test]
fn test_concurrent_waiters_agree() {
    let process = Arc::new(SpawnConfig::new().exec(sh("sleep 0.2; exit 9"), None).unwrap());

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let process = Arc::clone(&process);
            thread::spawn(move || process.wait().unwrap())
        })
        .collect();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), ExitStatus::Exited(9));
    }
}

#[test]
fn test_kill_is_distinct_from_exit_code() {
    let killed = SpawnConfig::new().exec(["/bin/sleep", "30"], None).unwrap();
    assert!(killed.is_running());
    assert!(killed.kill(None));
    let killed_status = killed.wait().unwrap();
    assert_eq!(killed_status, ExitStatus::Signaled(15));
    assert_eq!(killed_status.code(), None);

    let exited = SpawnConfig::new().exec(sh("exit 15"), None).unwrap();
    let exited_status = exited.wait().unwrap();
    assert_eq!(exited_status, ExitStatus::Exited(15));
    assert_ne!(killed_status, exited_status);
}

#[test]
fn test_kill_with_explicit_signal() {
    let process = SpawnConfig::new().exec(["/bin/sleep", "30"], None).unwrap();
    assert!(process.kill(Some(libc::SIGKILL)));
    assert_eq!(process.wait().unwrap(), ExitStatus::Signaled(libc::SIGKILL));
}

#[test]
fn test_kill_after_exit_reports_false() {
    let (process, mut reader) = capture("printf done");
    reader.read_all().unwrap();

    // Exited but not yet waited on
    assert!(eventually(Duration::from_secs(5), || !process.is_running()));
    assert!(!process.kill(None));
    assert!(!process.kill(Some(libc::SIGKILL)));

    process.wait().unwrap();

    assert!(!process.is_running());
    assert!(!process.kill(None));
    assert_eq!(process.exit_status(), Some(ExitStatus::Exited(0)));
}

#[test]
fn test_is_running_does_not_reap() {
    let process = SpawnConfig::new().exec(sh("exit 5"), None).unwrap();
    assert!(eventually(Duration::from_secs(5), || !process.is_running()));

    // The status is still there for wait to collect
    assert_eq!(process.exit_status(), None);
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(5));
}

#[test]
#[serial]
fn test_detach_orphans_live_child() {
    let process = SpawnConfig::new().exec(sh("sleep 0.2"), None).unwrap();
    let pid = process.id();

    assert!(!process.detach());
    assert!(orphans().contains(&pid));

    assert!(eventually(Duration::from_secs(5), || {
        reap_orphans();
        !orphans().contains(&pid)
    }));
}

#[test]
fn test_detach_after_wait_is_clean() {
    let process = SpawnConfig::new().exec(sh("exit 0"), None).unwrap();
    let pid = process.id();
    process.wait().unwrap();
    assert!(process.detach());
    assert!(!orphans().contains(&pid));
}

#[test]
#[serial]
fn test_drop_orphans_unreclaimed_child() {
    let process = SpawnConfig::new().exec(sh("exit 0"), None).unwrap();
    let pid = process.id();
    drop(process);

    assert!(eventually(Duration::from_secs(5), || {
        reap_orphans();
        !orphans().contains(&pid)
    }));
}

#[test]
#[serial]
fn test_drop_kills_parked_child() {
    let mut config = SpawnConfig::new();
    config.suspended();
    let process = config.exec(sh("exit 0"), None).unwrap();
    let pid = process.id() as libc::pid_t;
    drop(process);

    assert!(eventually(Duration::from_secs(5), || {
        reap_orphans();
        // Gone once reaped
        (unsafe { libc::kill(pid, 0) }) != 0
    }));
}
