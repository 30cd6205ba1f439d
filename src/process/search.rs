/*!
 * Executable Search
 * PATH lookup against the child's materialized environment
 */

use super::env::lookup;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Search path used when the child environment has no PATH
#[cfg(unix)]
const DEFAULT_SEARCH_PATH: &str = "/bin:/usr/bin";

/// Extensions tried after the bare name
#[cfg(windows)]
const EXECUTABLE_EXTENSIONS: [&str; 4] = [".exe", ".com", ".bat", ".cmd"];

/// A program name with a separator is a path, not a search term
pub(crate) fn has_path(program: &OsStr) -> bool {
    Path::new(program).components().count() > 1
}

/// Locate `program` the way a shell would, using `env`'s PATH
///
/// Names that already carry a directory are returned unchanged.
pub(crate) fn resolve(program: &OsStr, env: &[(OsString, OsString)]) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if has_path(program) {
        return Some(PathBuf::from(program));
    }

    let path = search_path(env)?;
    std::env::split_paths(&path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| resolve_in_dir(&dir, program))
}

#[cfg(unix)]
fn search_path(env: &[(OsString, OsString)]) -> Option<OsString> {
    Some(
        lookup(env, "PATH")
            .map(|p| p.to_os_string())
            .unwrap_or_else(|| OsString::from(DEFAULT_SEARCH_PATH)),
    )
}

#[cfg(windows)]
fn search_path(env: &[(OsString, OsString)]) -> Option<OsString> {
    lookup(env, "PATH").map(|p| p.to_os_string())
}

#[cfg(unix)]
fn resolve_in_dir(dir: &Path, program: &OsStr) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let candidate = dir.join(program);
    let meta = std::fs::metadata(&candidate).ok()?;
    (meta.is_file() && meta.permissions().mode() & 0o111 != 0).then_some(candidate)
}

#[cfg(windows)]
fn resolve_in_dir(dir: &Path, program: &OsStr) -> Option<PathBuf> {
    let direct = dir.join(program);
    if direct.is_file() {
        return Some(direct);
    }

    EXECUTABLE_EXTENSIONS
        .into_iter()
        .map(|ext| {
            let mut name = program.to_os_string();
            name.push(ext);
            dir.join(name)
        })
        .find(|candidate| candidate.is_file())
}
