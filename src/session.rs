//! The long-lived recovery session: runtime configuration, the map, and the
//! open file descriptors, all owned by one structure and mutated under a
//! single mutex.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{DEFAULT_SECTOR_SIZE, DIRECTIO_BUFFER_SIZE, OUTFILE_MODE};
use crate::error::RescueError;
use crate::map::{Map, RecoverStates};
use crate::recovery::InfileSource;

/// Verbosity knob controlling whether the recovery engine logs at `Info`
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Default,
    Info,
}

/// Fields mutated under the session lock: everything the control shell can
/// change, plus the `unsaved` dirty flag the recovery engine sets.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub infile_path: PathBuf,
    pub mapfile_path: PathBuf,
    pub offset: u64,
    pub size: u64,
    pub blocksize: usize,
    pub recover_states: RecoverStates,
    pub allowed: bool,
    pub unsaved: bool,
    pub loglevel: LogLevel,
}

/// Everything guarded by the session mutex: the map, the runtime
/// configuration, and the open infile/outfile handles. `infile` is boxed
/// behind [`InfileSource`] so the recovery engine's forward/backward state
/// machine can be exercised against a fault-injecting fake in tests.
pub struct SessionState {
    pub config: RuntimeConfig,
    pub map: Map,
    pub infile: Box<dyn InfileSource>,
    pub outfile: File,
}

/// The shared recovery session. The filesystem adapter's read callback and
/// the control shell thread both hold an `Arc<Session>` and take the lock
/// only for narrow critical sections.
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(state: SessionState) -> Self {
        Session { state: Mutex::new(state) }
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl SessionState {
    /// Replaces the infile in place via [`InfileSource::reopen`] (for the
    /// production source, a descriptor-number-preserving `dup2`). In-flight
    /// reads see either the old or the new file, never a closed handle.
    pub fn reopen(&mut self, path: &Path) -> Result<(), RescueError> {
        self.infile
            .reopen(path)
            .map_err(|e| RescueError::Usage(format!("cannot reopen {}: {}", path.display(), e)))?;
        self.config.infile_path = path.to_path_buf();
        Ok(())
    }
}

/// Opens the infile read-only, with direct I/O when the platform and the
/// underlying file support it (falls back silently to buffered reads
/// otherwise — a plain regular file used in place of a block device, for
/// instance, commonly rejects `O_DIRECT`).
pub fn open_infile(path: &Path) -> io::Result<File> {
    #[cfg(target_os = "linux")]
    {
        let mut opts = OpenOptions::new();
        opts.read(true).custom_flags(libc::O_DIRECT);
        if let Ok(f) = opts.open(path) {
            return Ok(f);
        }
    }
    OpenOptions::new().read(true).open(path)
}

pub fn open_outfile(path: &Path, min_size: u64) -> io::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(OUTFILE_MODE)
        .open(path)?;
    let current_len = file.metadata()?.len();
    if current_len < min_size {
        file.set_len(min_size)?;
    }
    Ok(file)
}

/// Discovers the infile's logical sector size via `ioctl(BLKSSZGET)` on
/// Linux, falling back to [`DEFAULT_SECTOR_SIZE`] everywhere else or on
/// ioctl failure (e.g. when the infile is a plain regular file, not a block
/// device). The result is capped at [`DIRECTIO_BUFFER_SIZE`].
pub fn discover_blocksize(file: &File) -> usize {
    let raw = sector_size(file).unwrap_or(DEFAULT_SECTOR_SIZE);
    raw.min(DIRECTIO_BUFFER_SIZE)
}

#[cfg(target_os = "linux")]
fn sector_size(file: &File) -> Option<usize> {
    use std::os::unix::io::AsRawFd;

    nix::ioctl_read_bad!(blkssz_get, 0x1268 /* BLKSSZGET */, libc::c_int);
    let mut size: libc::c_int = 0;
    // SAFETY: `file`'s fd is valid for the lifetime of this call and `size`
    // is a valid, aligned out-parameter of the type the ioctl expects.
    let rc = unsafe { blkssz_get(file.as_raw_fd(), &mut size) };
    if rc.is_ok() && size > 0 {
        Some(size as usize)
    } else {
        None
    }
}

#[cfg(not(target_os = "linux"))]
fn sector_size(_file: &File) -> Option<usize> {
    None
}
