/*!
 * Pipe Module
 * Anonymous OS pipes for wiring child standard streams
 *
 * Every endpoint is created non-inheritable. The spawn path makes a
 * descriptor visible to exactly the one child it is handed to, so pipes
 * opened for one child never leak into an unrelated sibling.
 */

use crate::core::errors::{SubprocessError, SubprocessResult};
use crate::core::types::{BorrowedDescriptor, Descriptor};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use tracing::debug;

#[cfg(unix)]
pub(crate) mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
pub(crate) mod windows;
#[cfg(windows)]
use windows as sys;

/// Anything that can lend out its OS descriptor
#[cfg(unix)]
pub use std::os::fd::AsFd as AsDescriptor;
#[cfg(windows)]
pub use std::os::windows::io::AsHandle as AsDescriptor;

#[cfg(unix)]
#[inline]
pub(crate) fn borrow<S: AsDescriptor + ?Sized>(stream: &S) -> BorrowedDescriptor<'_> {
    stream.as_fd()
}

#[cfg(windows)]
#[inline]
pub(crate) fn borrow<S: AsDescriptor + ?Sized>(stream: &S) -> BorrowedDescriptor<'_> {
    stream.as_handle()
}

/// Anonymous unidirectional pipe
///
/// Both endpoints start out owned by the `Pipe`. Each can be converted into
/// a buffered stream (`open_read` / `open_write`) or taken raw to hand to a
/// [`SpawnConfig`](crate::process::SpawnConfig). Whatever is left is closed
/// when the `Pipe` drops.
#[derive(Debug)]
pub struct Pipe {
    read_end: Option<Descriptor>,
    write_end: Option<Descriptor>,
}

impl Pipe {
    /// Allocate a fresh OS pipe
    pub fn open() -> SubprocessResult<Self> {
        let (read_end, write_end) = sys::anonymous_pipe()?;
        debug!("Opened anonymous pipe");
        Ok(Self {
            read_end: Some(read_end),
            write_end: Some(write_end),
        })
    }

    /// Both endpoints are still held
    pub fn is_open(&self) -> bool {
        self.read_end.is_some() && self.write_end.is_some()
    }

    pub fn read_end(&self) -> Option<BorrowedDescriptor<'_>> {
        self.read_end.as_ref().map(|fd| borrow(fd))
    }

    pub fn write_end(&self) -> Option<BorrowedDescriptor<'_>> {
        self.write_end.as_ref().map(|fd| borrow(fd))
    }

    /// Take the raw read endpoint
    pub fn take_read(&mut self) -> Option<Descriptor> {
        self.read_end.take()
    }

    /// Take the raw write endpoint
    pub fn take_write(&mut self) -> Option<Descriptor> {
        self.write_end.take()
    }

    /// Convert the read endpoint into a buffered stream
    ///
    /// Returns `None` if the endpoint was already taken.
    pub fn open_read(&mut self) -> Option<PipeReader> {
        self.read_end.take().map(PipeReader::from_descriptor)
    }

    /// Convert the write endpoint into a buffered stream
    ///
    /// Returns `None` if the endpoint was already taken.
    pub fn open_write(&mut self) -> Option<PipeWriter> {
        self.write_end.take().map(PipeWriter::from_descriptor)
    }
}

/// Duplicate a descriptor
///
/// The copy refers to the same channel, is non-inheritable, and has its own
/// close lifetime.
pub fn dup(existing: BorrowedDescriptor<'_>) -> SubprocessResult<Descriptor> {
    existing
        .try_clone_to_owned()
        .map_err(|e| SubprocessError::from_io("dup", e))
}

/// Number of bytes readable from `stream` without blocking
///
/// Nothing is consumed. Fails with `InvalidHandle` if `stream` is not a
/// pipe.
pub fn peek<S: AsDescriptor + ?Sized>(stream: &S) -> SubprocessResult<usize> {
    sys::available(borrow(stream))
}

/// Buffered read side of a pipe
#[derive(Debug)]
pub struct PipeReader {
    inner: BufReader<File>,
}

impl PipeReader {
    pub fn from_descriptor(descriptor: Descriptor) -> Self {
        Self {
            inner: BufReader::new(File::from(descriptor)),
        }
    }

    /// Bytes available without blocking, including ones already buffered
    pub fn peek(&self) -> SubprocessResult<usize> {
        let buffered = self.inner.buffer().len();
        let pending = sys::available(borrow(self.inner.get_ref()))?;
        Ok(buffered + pending)
    }

    /// Read everything until the writer side is closed
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.inner.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Unwrap into the raw descriptor, dropping any buffered bytes
    pub fn into_descriptor(self) -> Descriptor {
        Descriptor::from(self.inner.into_inner())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

#[cfg(unix)]
impl std::os::fd::AsFd for PipeReader {
    fn as_fd(&self) -> BorrowedDescriptor<'_> {
        self.inner.get_ref().as_fd()
    }
}

#[cfg(windows)]
impl std::os::windows::io::AsHandle for PipeReader {
    fn as_handle(&self) -> BorrowedDescriptor<'_> {
        self.inner.get_ref().as_handle()
    }
}

/// Buffered write side of a pipe
///
/// Data reaches the reader on `flush` or drop.
#[derive(Debug)]
pub struct PipeWriter {
    inner: BufWriter<File>,
}

impl PipeWriter {
    pub fn from_descriptor(descriptor: Descriptor) -> Self {
        Self {
            inner: BufWriter::new(File::from(descriptor)),
        }
    }

    /// Flush and unwrap into the raw descriptor
    pub fn into_descriptor(self) -> io::Result<Descriptor> {
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        Ok(Descriptor::from(file))
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(unix)]
impl std::os::fd::AsFd for PipeWriter {
    fn as_fd(&self) -> BorrowedDescriptor<'_> {
        self.inner.get_ref().as_fd()
    }
}

#[cfg(windows)]
impl std::os::windows::io::AsHandle for PipeWriter {
    fn as_handle(&self) -> BorrowedDescriptor<'_> {
        self.inner.get_ref().as_handle()
    }
}
