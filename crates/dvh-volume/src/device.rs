//! Positioned I/O against the volume device.
//!
//! [`BlockDevice`] mirrors `pread`/`pwrite`: each call names its own byte
//! offset and reports how many bytes moved. Files and in-memory
//! `Cursor<Vec<u8>>` images are devices; anything else seekable can use
//! [`seek_read_at`] and [`seek_write_at`] to implement the trait. The helpers
//! at the bottom turn a short transfer into [`VolumeError::ShortRead`] /
//! [`VolumeError::ShortWrite`].

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::{Result, VolumeError};

/// Byte-addressed device supporting positioned reads and writes.
pub trait BlockDevice {
    /// Read into `buf` starting at `offset`.
    ///
    /// Returns fewer bytes than requested at end of device, or when an error
    /// interrupts a transfer that already moved some bytes.
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Write `buf` starting at `offset`.
    ///
    /// Returns fewer bytes than requested if the device stops accepting
    /// data part way.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Make everything written so far durable.
    fn sync(&mut self) -> io::Result<()>;
}

impl BlockDevice for File {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        seek_read_at(self, buf, offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        seek_write_at(self, buf, offset)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl BlockDevice for Cursor<Vec<u8>> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        seek_read_at(self, buf, offset)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        seek_write_at(self, buf, offset)
    }

    // Nothing below memory
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Seek to `offset` and read until `buf` is full or the source runs dry.
///
/// An error after some bytes arrived ends the transfer with the partial
/// count; an error before any did is returned as is.
pub fn seek_read_at<T: Read + Seek + ?Sized>(
    source: &mut T,
    buf: &mut [u8],
    offset: u64,
) -> io::Result<usize> {
    source.seek(SeekFrom::Start(offset))?;

    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(_) if filled > 0 => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Seek to `offset` and write until `buf` is consumed or the sink stops.
///
/// Partial progress is reported the same way as [`seek_read_at`].
pub fn seek_write_at<T: Write + Seek + ?Sized>(
    sink: &mut T,
    buf: &[u8],
    offset: u64,
) -> io::Result<usize> {
    sink.seek(SeekFrom::Start(offset))?;

    let mut written = 0;
    while written < buf.len() {
        match sink.write(&buf[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(_) if written > 0 => break,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Fill `buf` from `offset` or fail with [`VolumeError::ShortRead`].
pub fn read_exact_at<D: BlockDevice + ?Sized>(
    device: &mut D,
    buf: &mut [u8],
    offset: u64,
) -> Result<()> {
    let actual = device
        .read_at(buf, offset)
        .map_err(|e| VolumeError::io(format!("read of {} bytes at offset {offset}", buf.len()), e))?;

    if actual != buf.len() {
        return Err(VolumeError::ShortRead {
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// Write all of `buf` at `offset` or fail with [`VolumeError::ShortWrite`].
pub fn write_all_at<D: BlockDevice + ?Sized>(device: &mut D, buf: &[u8], offset: u64) -> Result<()> {
    let actual = device
        .write_at(buf, offset)
        .map_err(|e| VolumeError::io(format!("write of {} bytes at offset {offset}", buf.len()), e))?;

    if actual != buf.len() {
        return Err(VolumeError::ShortWrite {
            expected: buf.len(),
            actual,
        });
    }
    Ok(())
}

/// Allocate a zeroed transfer buffer, reporting exhaustion as an error.
pub fn alloc_buffer(len: u64) -> Result<Vec<u8>> {
    let failure = || VolumeError::AllocationFailure { bytes: len };

    let len = usize::try_from(len).map_err(|_| failure())?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| failure())?;
    buf.resize(len, 0);
    Ok(buf)
}
