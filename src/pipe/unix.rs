/*!
 * Unix Pipe Backend
 * pipe2(O_CLOEXEC) allocation and FIONREAD probing
 */

use crate::core::errors::{SubprocessError, SubprocessResult};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};

/// Allocate a pipe with both ends close-on-exec
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos",
    target_os = "solaris"
))]
pub(crate) fn cloexec_pipe() -> SubprocessResult<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
        .map_err(|e| SubprocessError::from_io("pipe2", e.into()))
}

/// Allocate a pipe with both ends close-on-exec
///
/// No pipe2 on this target, so the flag is set right after creation.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos",
    target_os = "solaris"
)))]
pub(crate) fn cloexec_pipe() -> SubprocessResult<(OwnedFd, OwnedFd)> {
    let (read_end, write_end) =
        nix::unistd::pipe().map_err(|e| SubprocessError::from_io("pipe", e.into()))?;
    set_cloexec(&read_end)?;
    set_cloexec(&write_end)?;
    Ok((read_end, write_end))
}

#[allow(dead_code)]
fn set_cloexec(fd: &OwnedFd) -> SubprocessResult<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: raw is a live descriptor owned by `fd`
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
    if flags == -1 || unsafe { libc::fcntl(raw, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(SubprocessError::last_os_error("fcntl(FD_CLOEXEC)"));
    }
    Ok(())
}

pub(super) fn anonymous_pipe() -> SubprocessResult<(OwnedFd, OwnedFd)> {
    cloexec_pipe()
}

/// Bytes waiting in a pipe or socket
pub(super) fn available(fd: BorrowedFd<'_>) -> SubprocessResult<usize> {
    let raw = fd.as_raw_fd();

    let mut stat = MaybeUninit::<libc::stat>::uninit();
    // SAFETY: fstat fills the buffer on success
    if unsafe { libc::fstat(raw, stat.as_mut_ptr()) } == -1 {
        return Err(SubprocessError::last_os_error("fstat"));
    }
    // SAFETY: initialized by the successful fstat above
    let stat = unsafe { stat.assume_init() };
    let kind = stat.st_mode & libc::S_IFMT;
    if kind != libc::S_IFIFO && kind != libc::S_IFSOCK {
        return Err(SubprocessError::InvalidHandle(format!(
            "descriptor {} is not a pipe",
            raw
        )));
    }

    let mut pending: libc::c_int = 0;
    // SAFETY: FIONREAD writes a single c_int
    if unsafe { libc::ioctl(raw, libc::FIONREAD, &mut pending as *mut libc::c_int) } == -1 {
        return Err(SubprocessError::last_os_error("ioctl(FIONREAD)"));
    }
    Ok(pending.max(0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    fn is_cloexec(fd: &OwnedFd) -> bool {
        let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
        flags & libc::FD_CLOEXEC != 0
    }

    #[test]
    fn test_pipe_ends_are_cloexec() {
        let (r, w) = cloexec_pipe().unwrap();
        assert!(is_cloexec(&r));
        assert!(is_cloexec(&w));
    }

    #[test]
    fn test_available_rejects_regular_file() {
        let file = tempfile::tempfile().unwrap();
        let err = available(file.as_fd()).unwrap_err();
        assert!(matches!(err, SubprocessError::InvalidHandle(_)));
    }

    #[test]
    fn test_available_on_empty_pipe() {
        let (r, _w) = cloexec_pipe().unwrap();
        assert_eq!(available(r.as_fd()).unwrap(), 0);
    }
}
