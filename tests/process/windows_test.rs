/*!
 * Windows Backend Tests
 * cmd.exe driven checks of exit codes, termination and suspension
 */

#![cfg(windows)]

use pretty_assertions::assert_eq;
use subprocess_core::{select, ExitStatus, Pipe, ProcessState, SpawnConfig, StdioKind};

const CMD: &str = "C:\\Windows\\System32\\cmd.exe";

fn cmd(script: &str) -> Vec<String> {
    vec![CMD.to_string(), "/c".to_string(), script.to_string()]
}

#[test]
fn test_exit_code() {
    let process = SpawnConfig::new().exec(cmd("exit 7"), None).unwrap();
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(7));
}

#[test]
fn test_stdout_pipe() {
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config.redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config.exec(cmd("echo hello"), None).unwrap();

    let output = pipe.open_read().unwrap().read_all().unwrap();
    assert_eq!(String::from_utf8(output).unwrap().trim_end(), "hello");
    process.wait().unwrap();
}

#[test]
fn test_kill_reports_signaled() {
    let process = SpawnConfig::new()
        .exec(cmd("ping -n 30 127.0.0.1 >NUL"), None)
        .unwrap();
    assert!(process.kill(None));
    assert_eq!(process.wait().unwrap(), ExitStatus::Signaled(15));
}

#[test]
fn test_suspended_then_resumed() {
    let mut config = SpawnConfig::new();
    config.suspended();
    let process = config.exec(cmd("exit 2"), None).unwrap();
    assert_eq!(process.state(), ProcessState::Suspended);
    assert!(process.is_running());
    assert!(process.resume());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(2));
}

#[test]
fn test_select_first_exit() {
    let long = SpawnConfig::new()
        .exec(cmd("ping -n 30 127.0.0.1 >NUL"), None)
        .unwrap();
    let short = SpawnConfig::new().exec(cmd("exit 0"), None).unwrap();
    assert_eq!(select(&[&long, &short]).unwrap(), Some(1));
    assert!(long.kill(None));
    long.wait().unwrap();
    short.wait().unwrap();
}
