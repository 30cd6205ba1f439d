/*!
 * Windows Pipe Backend
 * CreatePipe allocation and PeekNamedPipe probing
 */

use crate::core::errors::{SubprocessError, SubprocessResult};
use std::io;
use std::os::windows::io::{AsRawHandle, BorrowedHandle, FromRawHandle, OwnedHandle};
use std::ptr;
use windows_sys::Win32::Foundation::{ERROR_BROKEN_PIPE, HANDLE};
use windows_sys::Win32::Storage::FileSystem::{GetFileType, FILE_TYPE_PIPE};
use windows_sys::Win32::System::Pipes::{CreatePipe, PeekNamedPipe};

/// Allocate an anonymous pipe; null security attributes keep both ends non-inheritable
pub(super) fn anonymous_pipe() -> SubprocessResult<(OwnedHandle, OwnedHandle)> {
    let mut read: HANDLE = ptr::null_mut();
    let mut write: HANDLE = ptr::null_mut();

    // SAFETY: out-pointers are valid for the duration of the call
    if unsafe { CreatePipe(&mut read, &mut write, ptr::null(), 0) } == 0 {
        return Err(SubprocessError::last_os_error("CreatePipe"));
    }

    // SAFETY: CreatePipe returned two fresh handles we now own
    unsafe { Ok((OwnedHandle::from_raw_handle(read), OwnedHandle::from_raw_handle(write))) }
}

/// Bytes waiting in an anonymous pipe
pub(super) fn available(handle: BorrowedHandle<'_>) -> SubprocessResult<usize> {
    let raw = handle.as_raw_handle() as HANDLE;

    // SAFETY: raw is a live handle borrowed for this call
    if unsafe { GetFileType(raw) } != FILE_TYPE_PIPE {
        return Err(SubprocessError::InvalidHandle(format!(
            "handle {:?} is not a pipe",
            raw
        )));
    }

    let mut total: u32 = 0;
    // SAFETY: only the total-available out-pointer is requested
    let ok = unsafe {
        PeekNamedPipe(
            raw,
            ptr::null_mut(),
            0,
            ptr::null_mut(),
            &mut total,
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        let err = io::Error::last_os_error();
        // Writer gone: nothing more will ever be readable
        if err.raw_os_error() == Some(ERROR_BROKEN_PIPE as i32) {
            return Ok(0);
        }
        return Err(SubprocessError::from_io("PeekNamedPipe", err));
    }
    Ok(total as usize)
}
