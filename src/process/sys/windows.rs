/*!
 * Windows Backend
 * CreateProcessW, kill-on-close job, handle-based waits
 *
 * Children are always created suspended. Unless detached they are placed
 * in a process-wide job object that kills them when this process exits,
 * then resumed unless the caller asked for a suspended start.
 */

use super::{cmdline, LaunchPlan, Launched};
use crate::core::errors::{LaunchStage, SubprocessError, SubprocessResult};
use crate::core::types::{NativeHandle, Pid};
use crate::process::env::overlay;
use crate::process::types::{Console, ExitStatus, StdioTarget};
use parking_lot::Mutex;
use std::ffi::{c_void, OsStr, OsString};
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::ptr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{
    CloseHandle, DuplicateHandle, DUPLICATE_SAME_ACCESS, ERROR_DIRECTORY, HANDLE,
    INVALID_HANDLE_VALUE, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Console::{
    GetStdHandle, STD_ERROR_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JobObjectExtendedLimitInformation,
    SetInformationJobObject, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
    JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
};
use windows_sys::Win32::System::Threading::{
    CreateProcessW, GetCurrentProcess, GetExitCodeProcess, ResumeThread, TerminateProcess,
    WaitForMultipleObjects, WaitForSingleObject, CREATE_NEW_CONSOLE, CREATE_NEW_PROCESS_GROUP,
    CREATE_NO_WINDOW, CREATE_SUSPENDED, CREATE_UNICODE_ENVIRONMENT, DETACHED_PROCESS, INFINITE,
    PROCESS_INFORMATION, STARTF_USESHOWWINDOW, STARTF_USESTDHANDLES, STARTUPINFOW,
};

/// Upper bound of handles in one WaitForMultipleObjects call
pub(crate) const MAX_WAIT_OBJECTS: usize = 64;

/// `SW_HIDE` show command
const SW_HIDE: u16 = 0;

/// Serializes inheritable handle duplication with CreateProcessW so a
/// concurrent spawn never picks up this child's handles
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

/// Sentinel for "not terminated by kill"
const NOT_TERMINATED: i64 = -1;

pub(crate) fn current_id() -> Pid {
    std::process::id()
}

/// Raw process handle used by blocking waits
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaitTarget {
    handle: HANDLE,
}

/// Platform state of one child
#[derive(Debug)]
pub(crate) struct Child {
    pid: Pid,
    process: OwnedHandle,
    /// Primary thread, held while the child is suspended
    thread: Option<OwnedHandle>,
    /// Exit code passed to TerminateProcess, or NOT_TERMINATED
    terminated_with: AtomicI64,
}

impl Child {
    pub(crate) fn id(&self) -> Pid {
        self.pid
    }

    pub(crate) fn native_handle(&self) -> NativeHandle {
        self.process.as_raw_handle()
    }

    pub(crate) fn wait_target(&self) -> WaitTarget {
        WaitTarget {
            handle: self.raw(),
        }
    }

    fn raw(&self) -> HANDLE {
        self.process.as_raw_handle() as HANDLE
    }

    pub(crate) fn probe_exited(&self) -> SubprocessResult<bool> {
        probe_exited(self.raw())
    }

    pub(crate) fn reap(&mut self) -> SubprocessResult<ExitStatus> {
        wait_one(self.wait_target())?;

        let mut code: u32 = 0;
        // SAFETY: the handle is live and the out-pointer valid
        if unsafe { GetExitCodeProcess(self.raw(), &mut code) } == 0 {
            return Err(SubprocessError::last_os_error("GetExitCodeProcess"));
        }

        let terminated = self.terminated_with.load(Ordering::Acquire);
        if terminated != NOT_TERMINATED && terminated == code as i64 {
            return Ok(ExitStatus::Signaled(code as i32));
        }
        Ok(ExitStatus::Exited(code as i32))
    }

    /// TerminateProcess with `code` as the exit code
    pub(crate) fn signal(&self, code: i32) -> bool {
        match probe_exited(self.raw()) {
            Ok(false) => {}
            _ => return false,
        }

        self.terminated_with.store(code as u32 as i64, Ordering::Release);
        // SAFETY: the handle is live
        if unsafe { TerminateProcess(self.raw(), code as u32) } == 0 {
            self.terminated_with.store(NOT_TERMINATED, Ordering::Release);
            warn!(pid = self.pid, "TerminateProcess failed: {}", io::Error::last_os_error());
            return false;
        }
        true
    }

    pub(crate) fn resume(&mut self, _program: &str) -> SubprocessResult<bool> {
        let Some(thread) = self.thread.take() else {
            return Ok(true);
        };
        Ok(resume_thread(&thread))
    }

    pub(crate) fn is_parked(&self) -> bool {
        self.thread.is_some()
    }

    pub(crate) fn kill_parked(&mut self) {
        if self.thread.take().is_some() {
            // SAFETY: the handle is live
            unsafe { TerminateProcess(self.raw(), 1) };
        }
    }
}

fn resume_thread(thread: &OwnedHandle) -> bool {
    // SAFETY: the thread handle is live
    unsafe { ResumeThread(thread.as_raw_handle() as HANDLE) != u32::MAX }
}

fn probe_exited(handle: HANDLE) -> SubprocessResult<bool> {
    // SAFETY: the handle is live for the caller's borrow
    match unsafe { WaitForSingleObject(handle, 0) } {
        WAIT_OBJECT_0 => Ok(true),
        WAIT_TIMEOUT => Ok(false),
        _ => Err(SubprocessError::last_os_error("WaitForSingleObject")),
    }
}

/// Block until `target` exits
pub(crate) fn wait_one(target: WaitTarget) -> SubprocessResult<()> {
    // SAFETY: the handle outlives the wait; see Process::wait
    match unsafe { WaitForSingleObject(target.handle, INFINITE) } {
        WAIT_OBJECT_0 => Ok(()),
        _ => Err(SubprocessError::last_os_error("WaitForSingleObject")),
    }
}

/// Block until one of `targets` exits; returns its index
pub(crate) fn wait_any(targets: &[WaitTarget]) -> SubprocessResult<usize> {
    if targets.len() > MAX_WAIT_OBJECTS {
        return Err(SubprocessError::Resource {
            op: "WaitForMultipleObjects".to_string(),
            code: None,
            message: format!(
                "cannot wait on {} processes at once (limit {})",
                targets.len(),
                MAX_WAIT_OBJECTS
            ),
        });
    }

    let handles: Vec<HANDLE> = targets.iter().map(|t| t.handle).collect();
    // SAFETY: every handle is owned by a Process borrowed for this call
    let rc = unsafe { WaitForMultipleObjects(handles.len() as u32, handles.as_ptr(), 0, INFINITE) };
    if rc == WAIT_FAILED {
        return Err(SubprocessError::last_os_error("WaitForMultipleObjects"));
    }
    let index = rc.wrapping_sub(WAIT_OBJECT_0) as usize;
    if index < handles.len() {
        Ok(index)
    } else {
        Err(SubprocessError::System {
            op: "WaitForMultipleObjects".to_string(),
            code: rc as i32,
            message: "unexpected wait result".to_string(),
        })
    }
}

/// Nothing to reap: closing the handle releases the process object
pub(crate) fn try_reap(_pid: Pid) -> bool {
    true
}

pub(crate) fn auto_reaps() -> bool {
    true
}

/// Job that kills every attached child when the last handle closes
///
/// Never closed; it goes away with this process.
fn kill_on_close_job() -> Option<HANDLE> {
    static JOB: OnceLock<Option<usize>> = OnceLock::new();
    let job = *JOB.get_or_init(|| {
        // SAFETY: plain job creation with default security
        let job = unsafe { CreateJobObjectW(ptr::null(), ptr::null()) };
        if job.is_null() {
            warn!("CreateJobObjectW failed: {}", io::Error::last_os_error());
            return None;
        }

        // SAFETY: zeroed is a valid starting value for this plain-data struct
        let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = unsafe { mem::zeroed() };
        info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        let ok = unsafe {
            SetInformationJobObject(
                job,
                JobObjectExtendedLimitInformation,
                &info as *const _ as *const c_void,
                mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        };
        if ok == 0 {
            warn!("SetInformationJobObject failed: {}", io::Error::last_os_error());
            unsafe { CloseHandle(job) };
            return None;
        }
        Some(job as usize)
    });
    job.map(|job| job as HANDLE)
}

/// Inheritable duplicate of `source`, closed when dropped
fn inheritable(source: HANDLE, op: &str) -> SubprocessResult<OwnedHandle> {
    let mut dup: HANDLE = ptr::null_mut();
    // SAFETY: both process handles are the current-process pseudo handle
    let ok = unsafe {
        DuplicateHandle(
            GetCurrentProcess(),
            source,
            GetCurrentProcess(),
            &mut dup,
            0,
            1,
            DUPLICATE_SAME_ACCESS,
        )
    };
    if ok == 0 {
        return Err(SubprocessError::last_os_error(op));
    }
    // SAFETY: DuplicateHandle returned a fresh handle we own
    Ok(unsafe { OwnedHandle::from_raw_handle(dup as _) })
}

fn std_handle(index: usize) -> HANDLE {
    let which = [STD_INPUT_HANDLE, STD_OUTPUT_HANDLE, STD_ERROR_HANDLE][index];
    // SAFETY: GetStdHandle has no preconditions
    unsafe { GetStdHandle(which) }
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// UTF-16 `NAME=VALUE\0...\0\0` block, sorted case-insensitively
fn environment_block(env: &[(OsString, OsString)]) -> Vec<u16> {
    let mut sorted: Vec<&(OsString, OsString)> = env.iter().collect();
    sorted.sort_by_cached_key(|(name, _)| name.to_string_lossy().to_uppercase());

    let mut block = Vec::new();
    for (name, value) in sorted {
        block.extend(name.encode_wide());
        block.push('=' as u16);
        block.extend(value.encode_wide());
        block.push(0);
    }
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);
    block
}

fn creation_flags(plan: &LaunchPlan) -> u32 {
    let mut flags = CREATE_SUSPENDED | CREATE_UNICODE_ENVIRONMENT;
    flags |= match plan.console {
        Console::Inherit => 0,
        Console::Disable => CREATE_NO_WINDOW,
        Console::New | Console::Hide => CREATE_NEW_CONSOLE,
        Console::Detached => DETACHED_PROCESS,
    };
    if plan.detached {
        flags |= CREATE_NEW_PROCESS_GROUP;
    }
    flags
}

/// Create a child according to `plan`
pub(crate) fn launch(mut plan: LaunchPlan) -> SubprocessResult<Launched> {
    let display = plan.display.clone();
    let args = plan
        .args
        .iter()
        .map(|a| a.to_str().map(str::to_owned))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| {
            SubprocessError::rejected(&display, LaunchStage::Prepare, "argument is not valid Unicode")
        })?;
    let mut command_line: Vec<u16> = wide(OsStr::new(&cmdline::join(&display, &args)?));
    if plan.env.iter().any(|(n, v)| n.encode_wide().chain(v.encode_wide()).any(|c| c == 0)) {
        return Err(SubprocessError::rejected(
            &display,
            LaunchStage::Prepare,
            "environment entry contains a NUL",
        ));
    }
    let application = wide(plan.program.as_os_str());
    let cwd = plan.cwd.as_ref().map(|dir| wide(dir.as_os_str()));
    let flags = creation_flags(&plan);

    // SAFETY: zeroed is a valid starting value for this plain-data struct
    let mut startup: STARTUPINFOW = unsafe { mem::zeroed() };
    startup.cb = mem::size_of::<STARTUPINFOW>() as u32;
    startup.dwFlags = STARTF_USESTDHANDLES;
    if plan.hide_window || plan.console == Console::Hide {
        startup.dwFlags |= STARTF_USESHOWWINDOW;
        startup.wShowWindow = SW_HIDE;
    }

    // SAFETY: zeroed is the documented initial state of PROCESS_INFORMATION
    let mut info: PROCESS_INFORMATION = unsafe { mem::zeroed() };

    {
        let _guard = SPAWN_LOCK.lock();

        let mut inherited: Vec<OwnedHandle> = Vec::with_capacity(3 + plan.shared.len());
        let mut std_handles: [HANDLE; 3] = [ptr::null_mut(); 3];
        for (index, target) in plan.stdio.iter().enumerate() {
            let source = match target {
                Some(StdioTarget::Redirect(handle)) => handle.as_raw_handle() as HANDLE,
                Some(StdioTarget::Inherit) | None => std_handle(index),
            };
            if source.is_null() || source == INVALID_HANDLE_VALUE {
                continue;
            }
            let dup = inheritable(source, "DuplicateHandle(stdio)")
                .map_err(|e| launch_error(&display, LaunchStage::Redirect, e))?;
            std_handles[index] = dup.as_raw_handle() as HANDLE;
            inherited.push(dup);
        }
        startup.hStdInput = std_handles[0];
        startup.hStdOutput = std_handles[1];
        startup.hStdError = std_handles[2];

        for (name, handle) in &plan.shared {
            let dup = inheritable(handle.as_raw_handle() as HANDLE, "DuplicateHandle(share)")
                .map_err(|e| launch_error(&display, LaunchStage::Share, e))?;
            let value = (dup.as_raw_handle() as usize).to_string();
            overlay(&mut plan.env, name, OsString::from(value));
            inherited.push(dup);
        }
        let env_block = environment_block(&plan.env);

        // SAFETY: every pointer refers to a buffer that outlives the call
        let ok = unsafe {
            CreateProcessW(
                application.as_ptr(),
                command_line.as_mut_ptr(),
                ptr::null(),
                ptr::null(),
                1,
                flags,
                env_block.as_ptr() as *const c_void,
                cwd.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                &startup,
                &mut info,
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            let stage = if plan.cwd.is_some() && err.raw_os_error() == Some(ERROR_DIRECTORY as i32) {
                LaunchStage::Chdir
            } else {
                LaunchStage::Create
            };
            return Err(SubprocessError::launch(&display, stage, err));
        }
        // Inheritable duplicates close here, after the child holds its copies
        drop(inherited);
    }

    // SAFETY: CreateProcessW succeeded and handed us both handles
    let process = unsafe { OwnedHandle::from_raw_handle(info.hProcess as _) };
    let thread = unsafe { OwnedHandle::from_raw_handle(info.hThread as _) };

    if !plan.detached {
        if let Some(job) = kill_on_close_job() {
            // SAFETY: both handles are live
            if unsafe { AssignProcessToJobObject(job, info.hProcess) } == 0 {
                let err = io::Error::last_os_error();
                unsafe { TerminateProcess(info.hProcess, 1) };
                return Err(SubprocessError::launch(&display, LaunchStage::Job, err));
            }
        }
    }

    let mut child = Child {
        pid: info.dwProcessId,
        process,
        thread: Some(thread),
        terminated_with: AtomicI64::new(NOT_TERMINATED),
    };

    if !plan.suspended {
        if let Some(thread) = child.thread.take() {
            if !resume_thread(&thread) {
                let err = io::Error::last_os_error();
                // SAFETY: the process handle is live
                unsafe { TerminateProcess(child.raw(), 1) };
                return Err(SubprocessError::launch(&display, LaunchStage::Create, err));
            }
        }
    } else {
        debug!(pid = child.pid, "Child created suspended");
    }

    Ok(Launched {
        child,
        suspended: plan.suspended,
    })
}

fn launch_error(program: &str, stage: LaunchStage, err: SubprocessError) -> SubprocessError {
    SubprocessError::LaunchFailure {
        program: program.to_string(),
        stage,
        code: err.os_code(),
        message: err.to_string(),
    }
}
