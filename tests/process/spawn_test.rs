/*!
 * Spawn Tests
 * exec, stdio wiring, environment and launch failures
 */

#![cfg(unix)]

use super::common::{capture, sh};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use subprocess_core::{
    EnvBuilder, ExitStatus, LaunchStage, Pipe, SpawnConfig, StdioKind, SubprocessError,
};

fn launch_stage(err: &SubprocessError) -> (LaunchStage, Option<i32>) {
    match err {
        SubprocessError::LaunchFailure { stage, code, .. } => (*stage, *code),
        other => panic!("expected a launch failure, got {:?}", other),
    }
}

#[test]
fn test_exit_code_round_trips() {
    for code in [0, 1, 7, 255] {
        let process = SpawnConfig::new()
            .exec(sh(&format!("exit {}", code)), None)
            .unwrap();
        assert!(process.id() > 0);
        assert_eq!(process.wait().unwrap(), ExitStatus::Exited(code));
    }
}

#[test]
fn test_stdout_pipe_carries_output() {
    let (process, mut reader) = capture("printf hello");
    assert_eq!(reader.read_all().unwrap(), b"hello".to_vec());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn test_stdin_pipe_reaches_child() {
    let mut input = Pipe::open().unwrap();
    let mut output = Pipe::open().unwrap();

    let mut config = SpawnConfig::new();
    config
        .redirect(StdioKind::Input, input.take_read().unwrap())
        .redirect(StdioKind::Output, output.take_write().unwrap());
    let process = config.exec(["/bin/cat"], None).unwrap();

    let mut writer = input.open_write().unwrap();
    writer.write_all(b"ping\n").unwrap();
    drop(writer);

    let mut reader = output.open_read().unwrap();
    assert_eq!(reader.read_all().unwrap(), b"ping\n".to_vec());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn test_stderr_redirect_is_separate() {
    let mut out = Pipe::open().unwrap();
    let mut err = Pipe::open().unwrap();

    let mut config = SpawnConfig::new();
    config
        .redirect(StdioKind::Output, out.take_write().unwrap())
        .redirect(StdioKind::Error, err.take_write().unwrap());
    let process = config.exec(sh("printf out; printf err >&2"), None).unwrap();

    assert_eq!(out.open_read().unwrap().read_all().unwrap(), b"out".to_vec());
    assert_eq!(err.open_read().unwrap().read_all().unwrap(), b"err".to_vec());
    process.wait().unwrap();
}

#[test]
fn test_env_set_then_delete_is_absent() {
    let mut env = EnvBuilder::new();
    env.set("SUBPROCESS_CORE_A", "1")
        .del("SUBPROCESS_CORE_A")
        .set("SUBPROCESS_CORE_B", "two");

    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config
        .env(env.release())
        .redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config
        .exec(
            sh(r#"printf '%s,%s' "${SUBPROCESS_CORE_A-unset}" "$SUBPROCESS_CORE_B""#),
            None,
        )
        .unwrap();

    let output = pipe.open_read().unwrap().read_all().unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "unset,two");
    process.wait().unwrap();

    // The diff never leaks into this process
    assert!(std::env::var("SUBPROCESS_CORE_B").is_err());
}

#[test]
#[serial]
fn test_env_delete_hides_inherited_variable() {
    subprocess_core::process::set_current("SUBPROCESS_CORE_INHERITED", "yes").unwrap();
    let script = sh(r#"printf '%s' "${SUBPROCESS_CORE_INHERITED-unset}""#);

    let (process, mut reader) = capture(&script[2]);
    assert_eq!(reader.read_all().unwrap(), b"yes".to_vec());
    process.wait().unwrap();

    let mut env = EnvBuilder::new();
    env.del("SUBPROCESS_CORE_INHERITED");
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config
        .env(env.release())
        .redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config.exec(script, None).unwrap();

    assert_eq!(pipe.open_read().unwrap().read_all().unwrap(), b"unset".to_vec());
    process.wait().unwrap();
    std::env::remove_var("SUBPROCESS_CORE_INHERITED");
}

#[test]
fn test_cwd_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config.redirect(StdioKind::Output, pipe.take_write().unwrap());
    let process = config.exec(sh("pwd -P"), Some(dir.path())).unwrap();

    let output = pipe.open_read().unwrap().read_all().unwrap();
    process.wait().unwrap();
    let printed = String::from_utf8(output).unwrap();
    assert_eq!(
        std::path::PathBuf::from(printed.trim_end()),
        dir.path().canonicalize().unwrap()
    );
}

#[test]
fn test_search_path_finds_shell() {
    let mut config = SpawnConfig::new();
    config.search_path();
    let process = config.exec(["sh", "-c", "exit 4"], None).unwrap();
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(4));
}

#[test]
fn test_missing_executable_fails_at_exec() {
    let err = SpawnConfig::new()
        .exec(["/nonexistent/subprocess-core-missing"], None)
        .unwrap_err();
    assert_eq!(launch_stage(&err), (LaunchStage::Exec, Some(libc::ENOENT)));
}

#[test]
fn test_literal_name_is_not_searched() {
    let err = SpawnConfig::new().exec(["sh", "-c", "exit 0"], None).unwrap_err();
    assert_eq!(launch_stage(&err).0, LaunchStage::Exec);
}

#[test]
fn test_search_miss_fails_at_resolve() {
    let mut config = SpawnConfig::new();
    config.search_path();
    let err = config
        .exec(["subprocess-core-no-such-tool"], None)
        .unwrap_err();
    assert_eq!(launch_stage(&err).0, LaunchStage::Resolve);
}

#[test]
fn test_bad_cwd_fails_at_chdir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone");
    let err = SpawnConfig::new()
        .exec(sh("exit 0"), Some(&missing))
        .unwrap_err();
    assert_eq!(launch_stage(&err), (LaunchStage::Chdir, Some(libc::ENOENT)));
}

#[test]
fn test_failed_launch_closes_redirected_pipe() {
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config.redirect(StdioKind::Output, pipe.take_write().unwrap());
    assert!(config.exec(["/nonexistent/prog"], None).is_err());

    // No writer survives, so the reader sees end of stream
    assert_eq!(pipe.open_read().unwrap().read_all().unwrap(), Vec::<u8>::new());
}

#[test]
fn test_shared_descriptor_is_exported() {
    let mut pipe = Pipe::open().unwrap();
    let mut config = SpawnConfig::new();
    config.share("RESULT_FD", pipe.take_write().unwrap());
    let process = config
        .exec(sh(r#"printf shared > "/dev/fd/$RESULT_FD""#), None)
        .unwrap();

    assert_eq!(pipe.open_read().unwrap().read_all().unwrap(), b"shared".to_vec());
    assert_eq!(process.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn test_detached_child_runs_in_new_session() {
    let mut config = SpawnConfig::new();
    config.detached();
    let process = config.exec(["/bin/sleep", "30"], None).unwrap();

    // setsid made the child a session leader
    let pid = process.id() as libc::pid_t;
    assert!(super::common::eventually(Duration::from_secs(5), || unsafe {
        libc::getsid(pid) == pid
    }));
    assert_ne!(unsafe { libc::getsid(0) }, pid);

    assert!(process.kill(None));
    assert_eq!(process.wait().unwrap(), ExitStatus::Signaled(libc::SIGTERM));
}

#[test]
fn test_capture_helper_large_output() {
    let (process, mut reader) = capture("i=0; while [ $i -lt 2000 ]; do printf 0123456789; i=$((i+1)); done");
    assert_eq!(reader.read_all().unwrap().len(), 20_000);
    process.wait().unwrap();
}
