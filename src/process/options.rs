/*!
 * Spawn Options
 * Declarative spawn record and a convenience that wires up pipes
 */

use super::env::EnvDiff;
use super::executor::SpawnConfig;
use super::handle::Process;
use super::types::Console;
use crate::core::errors::{SubprocessError, SubprocessResult};
use crate::core::types::{Descriptor, StdioKind};
use crate::pipe::{borrow, dup, Pipe, PipeReader, PipeWriter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How one standard stream of the child is set up
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioOption {
    /// Platform default (the parent's stream)
    #[default]
    Default,
    /// The parent's stream, explicitly
    Inherit,
    /// A fresh pipe; the parent end is returned in [`Spawned`]
    Pipe,
    /// stderr only: share whatever stdout is connected to
    Stdout,
    /// A descriptor supplied by the caller
    #[serde(skip)]
    Descriptor(Descriptor),
}

/// Declarative description of one spawn
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpawnOptions {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// `None` deletes the variable in the child
    pub env: BTreeMap<String, Option<String>>,
    pub stdin: StdioOption,
    pub stdout: StdioOption,
    pub stderr: StdioOption,
    pub suspended: bool,
    pub detached: bool,
    pub console: Console,
    pub hide_window: bool,
    pub search_path: bool,
}

impl SpawnOptions {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse options from JSON
    pub fn from_json(json: &str) -> SubprocessResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SubprocessError::InvalidArgument(format!("spawn options: {}", e)))
    }
}

/// A created child and the parent ends of its pipes
#[derive(Debug)]
pub struct Spawned {
    pub process: Process,
    pub stdin: Option<PipeWriter>,
    pub stdout: Option<PipeReader>,
    /// Absent when stderr was merged into stdout
    pub stderr: Option<PipeReader>,
}

/// Child-side descriptor and, for pipes, the parent-side end
struct Wired {
    child: Option<Descriptor>,
    parent: Option<Descriptor>,
}

fn wire(option: StdioOption, kind: StdioKind) -> SubprocessResult<Wired> {
    match option {
        StdioOption::Default | StdioOption::Inherit | StdioOption::Stdout => Ok(Wired {
            child: None,
            parent: None,
        }),
        StdioOption::Descriptor(descriptor) => Ok(Wired {
            child: Some(descriptor),
            parent: None,
        }),
        StdioOption::Pipe => {
            let mut pipe = Pipe::open()?;
            let (child, parent) = match kind {
                StdioKind::Input => (pipe.take_read(), pipe.take_write()),
                StdioKind::Output | StdioKind::Error => (pipe.take_write(), pipe.take_read()),
            };
            Ok(Wired { child, parent })
        }
    }
}

/// Create a child from `options`
///
/// Pipes requested with [`StdioOption::Pipe`] are created here; their parent
/// ends come back in [`Spawned`]. `stderr: Stdout` points the child's stderr
/// at the same target as its stdout.
pub fn spawn(options: SpawnOptions) -> SubprocessResult<Spawned> {
    let SpawnOptions {
        args,
        cwd,
        env,
        stdin,
        stdout,
        stderr,
        suspended,
        detached,
        console,
        hide_window,
        search_path,
    } = options;

    let merge_stderr = matches!(stderr, StdioOption::Stdout);

    let mut config = SpawnConfig::new();
    let stdin = wire(stdin, StdioKind::Input)?;
    let stdout = wire(stdout, StdioKind::Output)?;
    let stderr = wire(stderr, StdioKind::Error)?;

    let merged = if merge_stderr {
        Some(match &stdout.child {
            Some(target) => dup(borrow(target))?,
            None => dup(borrow(&std::io::stdout()))?,
        })
    } else {
        None
    };

    if let Some(fd) = stdin.child {
        config.redirect(StdioKind::Input, fd);
    }
    if let Some(fd) = stdout.child {
        config.redirect(StdioKind::Output, fd);
    }
    if let Some(fd) = merged.or(stderr.child) {
        config.redirect(StdioKind::Error, fd);
    }

    if !env.is_empty() {
        config.env(env.into_iter().collect::<EnvDiff>());
    }
    if suspended {
        config.suspended();
    }
    if detached {
        config.detached();
    }
    if hide_window {
        config.hide_window();
    }
    if search_path {
        config.search_path();
    }
    config.console(console);

    let process = config.exec(&args, cwd.as_deref())?;

    Ok(Spawned {
        process,
        stdin: stdin.parent.map(PipeWriter::from_descriptor),
        stdout: stdout.parent.map(PipeReader::from_descriptor),
        stderr: stderr.parent.map(PipeReader::from_descriptor),
    })
}
