/*!
 * Unix Backend
 * fork/execve with a close-on-exec handshake, waitid/waitpid reaping
 *
 * Launch protocol:
 * - The parent allocates every C string and pointer table before fork.
 * - The child only makes async-signal-safe libc calls. Each setup step
 *   that fails writes an 8-byte report (stage tag, errno) to the status
 *   pipe and exits with 127.
 * - A successful execve closes the status pipe; the parent sees EOF.
 * - A suspended child reports `PARKED` instead and blocks reading the
 *   resume pipe. One byte lets it continue to execve; EOF (the parent
 *   is gone) makes it exit without running the target.
 */

use super::{LaunchPlan, Launched};
use crate::core::errors::{LaunchStage, SubprocessError, SubprocessResult};
use crate::core::types::{NativeHandle, Pid};
use crate::pipe::unix::cloexec_pipe;
use crate::process::env::overlay;
use crate::process::types::{ExitStatus, StdioTarget};
use nix::errno::Errno;
use nix::sys::signal::{self, pthread_sigmask, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult};
use parking_lot::Mutex;
use std::ffi::{CString, OsStr, OsString};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::ptr;
use std::time::Duration;
use tracing::{debug, warn};

/// Report tag of a child parked before execve
const PARKED: u32 = u32::MAX;

/// Exit status of a child that never reached the target program
const LAUNCH_FAILED_EXIT: libc::c_int = 127;

/// Back-off bounds for the polling select fallback
pub(crate) const PROBE_MIN_DELAY: Duration = Duration::from_millis(1);
pub(crate) const PROBE_MAX_DELAY: Duration = Duration::from_millis(50);

/// Serializes pipe allocation and fork so a sibling launched on another
/// thread never inherits this child's handshake ends
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Id of the calling process
pub(crate) fn current_id() -> Pid {
    std::process::id()
}

/// Raw identity used by blocking waits; copied out of the lifecycle lock
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaitTarget {
    pid: libc::pid_t,
    #[cfg_attr(not(any(target_os = "linux", target_os = "android")), allow(dead_code))]
    pidfd: Option<RawFd>,
}

/// Handshake ends kept while a child is parked
#[derive(Debug)]
struct Parked {
    resume: File,
    status: File,
}

/// Platform state of one child
#[derive(Debug)]
pub(crate) struct Child {
    pid: nix::unistd::Pid,
    pidfd: Option<OwnedFd>,
    parked: Option<Parked>,
}

impl Child {
    pub(crate) fn id(&self) -> Pid {
        self.pid.as_raw() as Pid
    }

    pub(crate) fn native_handle(&self) -> NativeHandle {
        self.pid.as_raw()
    }

    pub(crate) fn wait_target(&self) -> WaitTarget {
        WaitTarget {
            pid: self.pid.as_raw(),
            pidfd: self.pidfd.as_ref().map(|fd| fd.as_raw_fd()),
        }
    }

    /// Whether the child has exited, without reaping it
    pub(crate) fn probe_exited(&self) -> SubprocessResult<bool> {
        probe_exited(self.pid.as_raw())
    }

    /// Collect the exit status, blocking until the child terminates
    pub(crate) fn reap(&mut self) -> SubprocessResult<ExitStatus> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus::Exited(code)),
                Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitStatus::Signaled(sig as i32)),
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(SubprocessError::from_io("waitpid", io::Error::from(errno)))
                }
            }
        }
    }

    /// Deliver `sig`; false if the OS refused or the child is gone
    pub(crate) fn signal(&self, sig: i32) -> bool {
        let sig = match Signal::try_from(sig) {
            Ok(sig) => sig,
            Err(_) => {
                warn!(pid = self.id(), signal = sig, "Refusing unknown signal number");
                return false;
            }
        };
        // An exited but unreaped child still accepts signals as a zombie
        if let Ok(true) = self.probe_exited() {
            return false;
        }
        match signal::kill(self.pid, sig) {
            Ok(()) => true,
            Err(Errno::ESRCH) => false,
            Err(e) => {
                warn!(pid = self.id(), signal = ?sig, "kill failed: {}", e);
                false
            }
        }
    }

    /// Let a parked child continue to execve
    ///
    /// Returns false if the child failed before or during execve. Blocks
    /// only until the child has replaced its image.
    pub(crate) fn resume(&mut self, program: &str) -> SubprocessResult<bool> {
        let Some(mut parked) = self.parked.take() else {
            return Ok(true);
        };

        if let Ok(true) = self.probe_exited() {
            debug!(pid = self.id(), "Parked child died before resume");
            return Ok(false);
        }
        if let Err(e) = write_without_sigpipe(&mut parked.resume, &[1]) {
            debug!(pid = self.id(), "Parked child vanished before resume: {}", e);
            return Ok(false);
        }
        drop(parked.resume);

        match read_report(&mut parked.status)? {
            Report::Eof => Ok(true),
            Report::Failed(stage, errno) => {
                warn!(
                    pid = self.id(),
                    stage = stage.as_str(),
                    "Resumed child failed to launch '{}': {}",
                    program,
                    io::Error::from_raw_os_error(errno)
                );
                Ok(false)
            }
            Report::Parked | Report::Truncated => Ok(false),
        }
    }

    pub(crate) fn is_parked(&self) -> bool {
        self.parked.is_some()
    }

    /// Kill a child that never ran user code
    pub(crate) fn kill_parked(&mut self) {
        if self.parked.take().is_some() {
            let _ = signal::kill(self.pid, Signal::SIGKILL);
        }
    }
}

/// Create a child according to `plan`
pub(crate) fn launch(plan: LaunchPlan) -> SubprocessResult<Launched> {
    let LaunchPlan {
        display,
        program,
        args,
        mut env,
        cwd,
        stdio,
        shared,
        suspended,
        detached,
        ..
    } = plan;

    let reject = |stage, what: &str| {
        SubprocessError::rejected(&display, stage, format!("{} contains a NUL byte", what))
    };

    for (name, fd) in &shared {
        overlay(&mut env, name, OsString::from(fd.as_raw_fd().to_string()));
    }

    let c_program = c_string(program.as_os_str()).ok_or_else(|| reject(LaunchStage::Prepare, "program path"))?;
    let c_args = args
        .iter()
        .map(|a| c_string(a))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| reject(LaunchStage::Prepare, "an argument"))?;
    let c_env = env
        .iter()
        .map(|(name, value)| {
            let mut entry = name.clone();
            entry.push("=");
            entry.push(value);
            c_string(&entry)
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| reject(LaunchStage::Prepare, "an environment entry"))?;
    let c_cwd = match &cwd {
        Some(dir) => Some(c_string(dir.as_os_str()).ok_or_else(|| reject(LaunchStage::Prepare, "cwd"))?),
        None => None,
    };

    let argv = null_terminated(&c_args);
    let envp = null_terminated(&c_env);

    let mut redirect: [RawFd; 3] = [-1; 3];
    for (slot, target) in redirect.iter_mut().zip(stdio.iter()) {
        if let Some(StdioTarget::Redirect(fd)) = target {
            *slot = fd.as_raw_fd();
        }
    }
    let shared_fds: Vec<RawFd> = shared.iter().map(|(_, fd)| fd.as_raw_fd()).collect();

    let guard = SPAWN_LOCK.lock();

    let (status_read, status_write) = cloexec_pipe()?;
    let resume_pipe = if suspended { Some(cloexec_pipe()?) } else { None };

    let setup = ChildSetup {
        program: c_program.as_ptr(),
        argv: argv.as_ptr(),
        envp: envp.as_ptr(),
        cwd: c_cwd.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
        redirect,
        shared: &shared_fds,
        detached,
        status: status_write.as_raw_fd(),
        status_peer: status_read.as_raw_fd(),
        resume: resume_pipe.as_ref().map_or(-1, |(r, _)| r.as_raw_fd()),
        resume_peer: resume_pipe.as_ref().map_or(-1, |(_, w)| w.as_raw_fd()),
    };

    // SAFETY: the child branch only calls async-signal-safe functions on
    // memory prepared above, then execs or exits
    let pid = match unsafe { fork() } {
        Ok(ForkResult::Child) => unsafe { run_child(&setup) },
        Ok(ForkResult::Parent { child }) => child,
        Err(errno) => {
            drop(guard);
            return Err(SubprocessError::launch(&display, LaunchStage::Create, io::Error::from(errno)));
        }
    };

    // Child-side ends and handed-over descriptors belong to the child now
    drop(status_write);
    let resume = resume_pipe.map(|(read_end, write_end)| {
        drop(read_end);
        File::from(write_end)
    });
    drop(stdio);
    drop(shared);
    drop(guard);

    let pidfd = open_pidfd(pid.as_raw());
    let mut status = File::from(status_read);

    match read_report(&mut status) {
        Ok(Report::Eof) => Ok(Launched {
            child: Child { pid, pidfd, parked: None },
            suspended: false,
        }),
        Ok(Report::Parked) => match resume {
            Some(resume) => Ok(Launched {
                child: Child {
                    pid,
                    pidfd,
                    parked: Some(Parked { resume, status }),
                },
                suspended: true,
            }),
            None => {
                reap_failed(pid);
                Err(SubprocessError::rejected(&display, LaunchStage::Create, "unexpected handshake"))
            }
        },
        Ok(Report::Failed(stage, errno)) => {
            reap_failed(pid);
            Err(SubprocessError::launch(&display, stage, io::Error::from_raw_os_error(errno)))
        }
        Ok(Report::Truncated) => {
            reap_failed(pid);
            Err(SubprocessError::rejected(&display, LaunchStage::Create, "truncated handshake"))
        }
        Err(e) => {
            let _ = signal::kill(pid, Signal::SIGKILL);
            reap_failed(pid);
            Err(e)
        }
    }
}

/// Raw pointers and descriptors the child works from after fork
struct ChildSetup<'a> {
    program: *const libc::c_char,
    argv: *const *const libc::c_char,
    envp: *const *const libc::c_char,
    cwd: *const libc::c_char,
    redirect: [RawFd; 3],
    shared: &'a [RawFd],
    detached: bool,
    status: RawFd,
    status_peer: RawFd,
    resume: RawFd,
    resume_peer: RawFd,
}

/// Child side of the launch; never returns
unsafe fn run_child(setup: &ChildSetup<'_>) -> ! {
    libc::close(setup.status_peer);
    if setup.resume_peer >= 0 {
        libc::close(setup.resume_peer);
    }

    let mut empty: libc::sigset_t = std::mem::zeroed();
    libc::sigemptyset(&mut empty);
    libc::pthread_sigmask(libc::SIG_SETMASK, &empty, ptr::null_mut());
    libc::signal(libc::SIGPIPE, libc::SIG_DFL);

    if setup.detached && libc::setsid() == -1 {
        child_fail(setup.status, LaunchStage::Session);
    }

    // Move sources above 2 first so one dup2 cannot clobber another's source
    let mut lifted: [RawFd; 3] = [-1; 3];
    for (slot, &source) in lifted.iter_mut().zip(setup.redirect.iter()) {
        if source >= 0 {
            let fd = libc::fcntl(source, libc::F_DUPFD_CLOEXEC, 3);
            if fd == -1 {
                child_fail(setup.status, LaunchStage::Redirect);
            }
            *slot = fd;
        }
    }
    for (target, &source) in lifted.iter().enumerate() {
        if source >= 0 && libc::dup2(source, target as libc::c_int) == -1 {
            child_fail(setup.status, LaunchStage::Redirect);
        }
    }

    for &fd in setup.shared {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
            child_fail(setup.status, LaunchStage::Share);
        }
    }

    if !setup.cwd.is_null() && libc::chdir(setup.cwd) == -1 {
        child_fail(setup.status, LaunchStage::Chdir);
    }

    if setup.resume >= 0 {
        child_report(setup.status, PARKED, 0);
        let mut byte = 0u8;
        loop {
            let n = libc::read(setup.resume, &mut byte as *mut u8 as *mut libc::c_void, 1);
            if n == -1 && Errno::last_raw() == libc::EINTR {
                continue;
            }
            if n != 1 {
                libc::_exit(LAUNCH_FAILED_EXIT);
            }
            break;
        }
    }

    libc::execve(setup.program, setup.argv, setup.envp);
    child_fail(setup.status, LaunchStage::Exec)
}

unsafe fn child_fail(status: RawFd, stage: LaunchStage) -> ! {
    let errno = Errno::last_raw();
    child_report(status, stage.tag(), errno);
    libc::_exit(LAUNCH_FAILED_EXIT)
}

unsafe fn child_report(status: RawFd, tag: u32, errno: i32) {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&tag.to_ne_bytes());
    buf[4..].copy_from_slice(&errno.to_ne_bytes());
    let mut written = 0;
    while written < buf.len() {
        let n = libc::write(
            status,
            buf[written..].as_ptr() as *const libc::c_void,
            buf.len() - written,
        );
        if n == -1 {
            if Errno::last_raw() == libc::EINTR {
                continue;
            }
            return;
        }
        written += n as usize;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Report {
    /// Status pipe closed by a successful execve
    Eof,
    Parked,
    Failed(LaunchStage, i32),
    Truncated,
}

fn read_report(status: &mut File) -> SubprocessResult<Report> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match status.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SubprocessError::from_io("read(handshake)", e)),
        }
    }
    Ok(decode_report(&buf[..filled]))
}

fn decode_report(bytes: &[u8]) -> Report {
    if bytes.is_empty() {
        return Report::Eof;
    }
    if bytes.len() != 8 {
        return Report::Truncated;
    }
    let mut tag = [0u8; 4];
    let mut errno = [0u8; 4];
    tag.copy_from_slice(&bytes[..4]);
    errno.copy_from_slice(&bytes[4..]);

    let tag = u32::from_ne_bytes(tag);
    if tag == PARKED {
        return Report::Parked;
    }
    match LaunchStage::from_tag(tag) {
        Some(stage) => Report::Failed(stage, i32::from_ne_bytes(errno)),
        None => Report::Truncated,
    }
}

fn write_retrying(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    loop {
        match file.write_all(bytes) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Write with SIGPIPE blocked on this thread
///
/// A reader that vanished yields `EPIPE`; the signal it raised is consumed
/// so a host that does not ignore SIGPIPE survives.
fn write_without_sigpipe(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    let mut block = SigSet::empty();
    block.add(Signal::SIGPIPE);
    let mut previous = SigSet::empty();
    pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&block), Some(&mut previous))?;

    let already_pending = sigpipe_pending();
    let result = write_retrying(file, bytes);
    if let Err(e) = &result {
        if e.raw_os_error() == Some(libc::EPIPE) && !already_pending && sigpipe_pending() {
            let _ = block.wait();
        }
    }

    pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&previous), None)?;
    result
}

fn sigpipe_pending() -> bool {
    let mut pending = std::mem::MaybeUninit::<libc::sigset_t>::uninit();
    // SAFETY: sigemptyset initializes the set before sigpending fills it
    unsafe {
        libc::sigemptyset(pending.as_mut_ptr());
        if libc::sigpending(pending.as_mut_ptr()) != 0 {
            return false;
        }
        libc::sigismember(pending.as_ptr(), libc::SIGPIPE) == 1
    }
}

/// Reap a child that exits on its own right after a failed launch
fn reap_failed(pid: nix::unistd::Pid) {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            _ => return,
        }
    }
}

fn c_string(s: &OsStr) -> Option<CString> {
    CString::new(s.as_bytes()).ok()
}

fn null_terminated(strings: &[CString]) -> Vec<*const libc::c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect()
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn open_pidfd(pid: libc::pid_t) -> Option<OwnedFd> {
    // SAFETY: pidfd_open takes a pid and flags and returns a new descriptor
    let fd = unsafe { libc::syscall(libc::SYS_pidfd_open, pid, 0) };
    if fd < 0 {
        debug!(pid, "pidfd_open unavailable: {}", io::Error::last_os_error());
        return None;
    }
    // SAFETY: the kernel handed us a fresh close-on-exec descriptor
    Some(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn open_pidfd(_pid: libc::pid_t) -> Option<OwnedFd> {
    None
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
    // SAFETY: waitid filled the SIGCHLD layout
    unsafe { info.si_pid() }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn siginfo_pid(info: &libc::siginfo_t) -> libc::pid_t {
    info.si_pid
}

fn waitid_nowait(pid: libc::pid_t, flags: libc::c_int) -> io::Result<Option<libc::pid_t>> {
    loop {
        // SAFETY: a zeroed siginfo_t is a valid out-buffer
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT | flags,
            )
        };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        let reported = siginfo_pid(&info);
        return Ok((reported != 0).then_some(reported));
    }
}

fn probe_exited(pid: libc::pid_t) -> SubprocessResult<bool> {
    match waitid_nowait(pid, libc::WNOHANG) {
        Ok(reported) => Ok(reported.is_some()),
        // Already reaped elsewhere
        Err(e) if e.raw_os_error() == Some(libc::ECHILD) => Ok(true),
        Err(e) => Err(SubprocessError::from_io("waitid", e)),
    }
}

/// Block until `target` exits, leaving it unreaped
pub(crate) fn wait_one(target: WaitTarget) -> SubprocessResult<()> {
    waitid_nowait(target.pid, 0)
        .map(|_| ())
        .map_err(|e| SubprocessError::from_io("waitid", e))
}

/// Reap `pid` if it has exited; true once it is gone
pub(crate) fn try_reap(pid: Pid) -> bool {
    match waitpid(nix::unistd::Pid::from_raw(pid as libc::pid_t), Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => false,
        Ok(status) => {
            debug!(pid, ?status, "Reaped orphan");
            true
        }
        Err(Errno::EINTR) => false,
        Err(_) => true,
    }
}

/// Whether exited children are reaped by the kernel without our help
pub(crate) fn auto_reaps() -> bool {
    // SAFETY: a null new-action only queries the current disposition
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(libc::SIGCHLD, ptr::null(), &mut current) == -1 {
            return false;
        }
        current.sa_sigaction == libc::SIG_IGN || current.sa_flags & libc::SA_NOCLDWAIT != 0
    }
}

/// Block until one of `targets` exits; returns its index
pub(crate) fn wait_any(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    if let Some(index) = first_exited(targets)? {
        return Ok(index);
    }
    multiplex(targets)
}

fn first_exited(targets: &[WaitTarget]) -> SubprocessResult<Option<usize>> {
    for (index, target) in targets.iter().enumerate() {
        if probe_exited(target.pid)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn multiplex(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::BorrowedFd;

    let Some(pidfds) = targets.iter().map(|t| t.pidfd).collect::<Option<Vec<RawFd>>>() else {
        return probe_loop(targets);
    };

    // SAFETY: every pidfd is owned by a Process borrowed for this call
    let mut fds: Vec<PollFd<'_>> = pidfds
        .iter()
        .map(|&fd| PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN))
        .collect();

    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(Errno::EINVAL) => {
                return Err(SubprocessError::Resource {
                    op: "poll".to_string(),
                    code: Some(libc::EINVAL),
                    message: format!("cannot poll {} descriptors", fds.len()),
                })
            }
            Err(errno) => return Err(SubprocessError::from_io("poll", io::Error::from(errno))),
        }
        if let Some(index) = fds
            .iter()
            .position(|fd| fd.revents().map_or(false, |r| !r.is_empty()))
        {
            return Ok(index);
        }
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn multiplex(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    use nix::sys::event::{EventFilter, EventFlag, FilterFlag, KEvent, Kqueue};

    let kq = Kqueue::new().map_err(|e| SubprocessError::from_io("kqueue", io::Error::from(e)))?;
    for (index, target) in targets.iter().enumerate() {
        let change = KEvent::new(
            target.pid as usize,
            EventFilter::EVFILT_PROC,
            EventFlag::EV_ADD | EventFlag::EV_ONESHOT,
            FilterFlag::NOTE_EXIT,
            0,
            0,
        );
        match kq.kevent(&[change], &mut [], None) {
            Ok(_) => {}
            // Gone before we could register
            Err(Errno::ESRCH) => return Ok(index),
            Err(errno) => {
                return Err(SubprocessError::from_io("kevent", io::Error::from(errno)))
            }
        }
    }

    // An exit between the first probe and registration raises no event
    if let Some(index) = first_exited(targets)? {
        return Ok(index);
    }

    let mut events = [KEvent::new(0, EventFilter::EVFILT_PROC, EventFlag::empty(), FilterFlag::empty(), 0, 0)];
    loop {
        match kq.kevent(&[], &mut events, None) {
            Ok(0) => continue,
            Ok(_) => {
                let ident = events[0].ident();
                if let Some(index) = targets.iter().position(|t| t.pid as usize == ident) {
                    return Ok(index);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                return Err(SubprocessError::from_io("kevent", io::Error::from(errno)))
            }
        }
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn multiplex(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    probe_loop(targets)
}

/// Poll every target with exponential back-off
#[cfg_attr(
    any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ),
    allow(dead_code)
)]
fn probe_loop(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    let mut delay = PROBE_MIN_DELAY;
    loop {
        if let Some(index) = first_exited(targets)? {
            return Ok(index);
        }
        std::thread::sleep(delay);
        delay = (delay * 2).min(PROBE_MAX_DELAY);
    }
}
