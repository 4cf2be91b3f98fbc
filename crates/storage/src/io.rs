//! Positional file I/O: the one place in the workspace that touches a real
//! file descriptor.
//!
//! `FileHandle` wraps `std::fs::File` and exposes `read_exactly`/`write_at`
//! over absolute offsets, an advisory whole-file lock via `fs2`, and
//! `fsync`. It also implements `wax_durability::ByteSource` so the footer
//! scanner can run directly against an open file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use fs2::FileExt;
use wax_core::{WaxError, WaxResult};
use wax_durability::ByteSource;

/// An open Wax file plus its current advisory lock state.
///
/// `locked_exclusive` is an `AtomicBool` rather than a plain `bool` so the
/// locking methods can take `&self`: `CommitCoordinator` shares one
/// `FileHandle` behind an `Arc` with `FrameStore` and `WalWriter`, so no
/// caller ever has a unique `&mut FileHandle` to work with.
pub struct FileHandle {
    file: File,
    locked_exclusive: AtomicBool,
}

impl FileHandle {
    /// Create a new file, failing if one already exists at `path`.
    pub fn create_new(path: impl AsRef<Path>) -> WaxResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| WaxError::io(format!("create {}: {e}", path.display())))?;
        Ok(FileHandle {
            file,
            locked_exclusive: AtomicBool::new(false),
        })
    }

    /// Open an existing file for read/write.
    pub fn open_existing(path: impl AsRef<Path>) -> WaxResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| WaxError::io(format!("open {}: {e}", path.display())))?;
        Ok(FileHandle {
            file,
            locked_exclusive: AtomicBool::new(false),
        })
    }

    /// Current length of the file.
    pub fn len(&self) -> WaxResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Truncate (or extend-with-zeros) the file to `len` bytes.
    pub fn set_len(&self, len: u64) -> WaxResult<()> {
        retry_eintr(|| self.file.set_len(len))
    }

    /// Read exactly `len` bytes starting at `offset`; fails rather than
    /// returning a short read.
    pub fn read_exactly(&self, offset: u64, len: u64) -> WaxResult<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        let mut file = self.file.try_clone()?;
        retry_eintr(|| {
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)
        })?;
        Ok(buf)
    }

    /// Write `bytes` at `offset`, overwriting (never appending blindly).
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> WaxResult<()> {
        let mut file = self.file.try_clone()?;
        retry_eintr(|| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(bytes)
        })
    }

    /// Flush data and metadata to the platform's strongest durability
    /// primitive.
    pub fn fsync(&self) -> WaxResult<()> {
        retry_eintr(|| self.file.sync_all())
    }

    /// Acquire the single advisory whole-file lock for the writer. Blocks
    /// until available.
    pub fn lock_exclusive(&self) -> WaxResult<()> {
        self.file
            .lock_exclusive()
            .map_err(|e| WaxError::lock_unavailable(e.to_string()))?;
        self.locked_exclusive.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Attempt to acquire the exclusive lock without blocking.
    pub fn try_lock_exclusive(&self) -> WaxResult<bool> {
        match self.file.try_lock_exclusive() {
            Ok(()) => {
                self.locked_exclusive.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(WaxError::lock_unavailable(e.to_string())),
        }
    }

    /// Acquire the shared (reader) advisory lock. Blocks until available.
    pub fn lock_shared(&self) -> WaxResult<()> {
        FileExt::lock_shared(&self.file)
            .map_err(|e| WaxError::lock_unavailable(e.to_string()))?;
        self.locked_exclusive.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Release whichever advisory lock is currently held.
    pub fn unlock(&self) -> WaxResult<()> {
        self.file
            .unlock()
            .map_err(|e| WaxError::lock_unavailable(e.to_string()))?;
        self.locked_exclusive.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.locked_exclusive.load(Ordering::SeqCst)
    }
}

impl ByteSource for FileHandle {
    fn len(&self) -> WaxResult<u64> {
        FileHandle::len(self)
    }

    fn read_at(&self, offset: u64, len: u64) -> WaxResult<Vec<u8>> {
        self.read_exactly(offset, len)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Retry a syscall-backed closure across `ErrorKind::Interrupted`.
fn retry_eintr<T>(mut op: impl FnMut() -> std::io::Result<T>) -> WaxResult<T> {
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WaxError::from(e)),
        }
    }
}
