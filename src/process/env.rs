/*!
 * Environment Builder
 * Sparse set/delete diff over the current environment
 *
 * A diff never touches the environment of the calling process. It is
 * overlaid on a snapshot when a child is launched.
 */

use crate::core::errors::{SubprocessError, SubprocessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use tracing::debug;

/// Pending change to one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvOp {
    Set(String),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvEntry {
    name: String,
    op: EnvOp,
}

/// Accumulated environment changes keyed by variable name
///
/// Names compare case-insensitively on Windows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDiff {
    entries: BTreeMap<OsString, EnvEntry>,
}

impl EnvDiff {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending change for `name`, if any
    pub fn get(&self, name: &str) -> Option<&EnvOp> {
        self.entries.get(&env_key(OsStr::new(name))).map(|e| &e.op)
    }

    /// Changes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvOp)> {
        self.entries.values().map(|e| (e.name.as_str(), &e.op))
    }

    /// Overlay the diff onto `base`
    ///
    /// Variables set by the diff replace same-named base entries, deleted
    /// ones are dropped, everything else passes through untouched.
    pub fn materialize<I>(&self, base: I) -> Vec<(OsString, OsString)>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut merged: BTreeMap<OsString, (OsString, OsString)> = base
            .into_iter()
            .map(|(name, value)| (env_key(&name), (name, value)))
            .collect();

        for (key, entry) in &self.entries {
            match &entry.op {
                EnvOp::Set(value) => {
                    merged.insert(
                        key.clone(),
                        (OsString::from(&entry.name), OsString::from(value)),
                    );
                }
                EnvOp::Delete => {
                    merged.remove(key);
                }
            }
        }

        merged.into_values().collect()
    }

    /// Overlay the diff onto a snapshot of the current environment
    pub fn materialize_current(&self) -> Vec<(OsString, OsString)> {
        self.materialize(std::env::vars_os())
    }
}

/// One-shot builder for an [`EnvDiff`]
#[derive(Debug, Default)]
pub struct EnvBuilder {
    diff: EnvDiff,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value` in the child; overrides an earlier `del`
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.record(name.into(), EnvOp::Set(value.into()));
        self
    }

    /// Remove `name` from the child; overrides an earlier `set`
    pub fn del(&mut self, name: impl Into<String>) -> &mut Self {
        self.record(name.into(), EnvOp::Delete);
        self
    }

    /// Move the accumulated diff out, consuming the builder
    pub fn release(self) -> EnvDiff {
        debug!(changes = self.diff.len(), "Released environment diff");
        self.diff
    }

    fn record(&mut self, name: String, op: EnvOp) {
        let key = env_key(OsStr::new(&name));
        self.diff.entries.insert(key, EnvEntry { name, op });
    }
}

impl FromIterator<(String, Option<String>)> for EnvDiff {
    /// `None` values mean delete
    fn from_iter<T: IntoIterator<Item = (String, Option<String>)>>(iter: T) -> Self {
        let mut builder = EnvBuilder::new();
        for (name, value) in iter {
            match value {
                Some(value) => builder.set(name, value),
                None => builder.del(name),
            };
        }
        builder.release()
    }
}

/// Look a variable up in a materialized environment
pub(crate) fn lookup<'a>(env: &'a [(OsString, OsString)], name: &str) -> Option<&'a OsStr> {
    let key = env_key(OsStr::new(name));
    env.iter()
        .find(|(n, _)| env_key(n) == key)
        .map(|(_, v)| v.as_os_str())
}

/// Set one variable in a materialized environment, replacing any same-named entry
pub(crate) fn overlay(env: &mut Vec<(OsString, OsString)>, name: &str, value: OsString) {
    let key = env_key(OsStr::new(name));
    env.retain(|(n, _)| env_key(n) != key);
    env.push((OsString::from(name), value));
}

/// Reject names the OS cannot store
pub(crate) fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("environment variable name is empty".to_string());
    }
    if name.contains('=') {
        return Err(format!("environment variable name '{}' contains '='", name));
    }
    if name.contains('\0') {
        return Err(format!("environment variable name '{}' contains NUL", name));
    }
    Ok(())
}

/// Set a variable in the calling process itself
///
/// Unlike [`EnvBuilder`], this mutates the current environment and is
/// visible to every later spawn that does not override it.
pub fn set_current(name: &str, value: &str) -> SubprocessResult<()> {
    validate_name(name).map_err(SubprocessError::InvalidArgument)?;
    if value.contains('\0') {
        return Err(SubprocessError::InvalidArgument(format!(
            "value of '{}' contains NUL",
            name
        )));
    }
    std::env::set_var(name, value);
    debug!(name, "Set variable in current environment");
    Ok(())
}

#[cfg(windows)]
fn env_key(name: &OsStr) -> OsString {
    OsString::from(name.to_string_lossy().to_uppercase())
}

#[cfg(not(windows))]
fn env_key(name: &OsStr) -> OsString {
    name.to_os_string()
}
