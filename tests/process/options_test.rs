/*!
 * Spawn Options Tests
 */

#![cfg(unix)]

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::Write;
use subprocess_core::{spawn, ExitStatus, SpawnOptions, StdioOption};

#[test]
fn test_spawn_merges_stderr_into_stdout() {
    let mut options = SpawnOptions::new(["/bin/sh", "-c", "printf out; printf err >&2"]);
    options.stdout = StdioOption::Pipe;
    options.stderr = StdioOption::Stdout;

    let mut spawned = spawn(options).unwrap();
    assert!(spawned.stderr.is_none());

    let output = spawned.stdout.take().unwrap().read_all().unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "outerr");
    assert_eq!(spawned.process.wait().unwrap(), ExitStatus::Exited(0));
}

#[test]
fn test_spawn_with_stdin_and_stdout_pipes() {
    let mut options = SpawnOptions::new(["/bin/cat"]);
    options.stdin = StdioOption::Pipe;
    options.stdout = StdioOption::Pipe;

    let mut spawned = spawn(options).unwrap();
    let mut stdin = spawned.stdin.take().unwrap();
    stdin.write_all(b"through cat").unwrap();
    drop(stdin);

    let output = spawned.stdout.take().unwrap().read_all().unwrap();
    assert_eq!(output, b"through cat".to_vec());
    spawned.process.wait().unwrap();
}

#[test]
fn test_spawn_env_map_deletes_with_null() {
    let mut env = BTreeMap::new();
    env.insert("SUBPROCESS_CORE_SET".to_string(), Some("on".to_string()));
    env.insert("HOME".to_string(), None);

    let mut options = SpawnOptions::new([
        "/bin/sh",
        "-c",
        r#"printf '%s:%s' "$SUBPROCESS_CORE_SET" "${HOME-unset}""#,
    ]);
    options.env = env;
    options.stdout = StdioOption::Pipe;

    let mut spawned = spawn(options).unwrap();
    let output = spawned.stdout.take().unwrap().read_all().unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "on:unset");
    spawned.process.wait().unwrap();
}

#[test]
fn test_spawn_from_json() {
    let options = SpawnOptions::from_json(
        r#"{"args": ["sh", "-c", "printf json; exit 11"], "stdout": "pipe", "searchPath": true}"#,
    )
    .unwrap();

    let mut spawned = spawn(options).unwrap();
    let output = spawned.stdout.take().unwrap().read_all().unwrap();
    assert_eq!(output, b"json".to_vec());
    assert_eq!(spawned.process.wait().unwrap(), ExitStatus::Exited(11));
}

#[test]
fn test_spawn_failure_surfaces_error() {
    let mut options = SpawnOptions::new(["/nonexistent/subprocess-core-options"]);
    options.stdout = StdioOption::Pipe;
    assert!(spawn(options).is_err());
}
