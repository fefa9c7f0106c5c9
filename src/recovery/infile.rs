//! Abstracts infile access behind a small trait so the forward/backward
//! recovery state machine in [`super::recover_range`] can be driven by a
//! fault-injecting fake in tests, without needing a real failing device.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use nix::unistd::dup2;

/// A positioned, reopenable source of infile bytes.
pub trait InfileSource: Send {
    /// Reads into `buf`, returning the number of bytes read. Matches
    /// [`std::os::unix::fs::FileExt::read_at`]'s short-read and error
    /// semantics: a partial, non-error result is possible and must be
    /// retried by the caller.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Replaces the underlying file, preserving whatever descriptor number
    /// (or equivalent identity) `self` currently holds, so in-flight readers
    /// never observe a closed handle.
    fn reopen(&mut self, path: &Path) -> io::Result<()>;
}

/// Production implementation: a real file, reopened via `dup2` onto its own
/// descriptor number so the swap is atomic from the point of view of any
/// thread already holding a reference to this source (the shell's `reopen`
/// command).
pub struct PositionedFile {
    file: File,
}

impl PositionedFile {
    pub fn new(file: File) -> Self {
        PositionedFile { file }
    }

    pub fn as_file(&self) -> &File {
        &self.file
    }
}

impl InfileSource for PositionedFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    fn reopen(&mut self, path: &Path) -> io::Result<()> {
        let replacement = File::open(path)?;
        let target_fd = self.file.as_raw_fd();
        dup2(replacement.as_raw_fd(), target_fd)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))?;
        // `replacement`'s own fd is closed on drop here; `self.file` still
        // owns `target_fd`, which now refers to the newly opened file.
        Ok(())
    }
}
