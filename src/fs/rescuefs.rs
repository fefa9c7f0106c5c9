//! Binds the recovery engine to a single-file, read-only FUSE mount. The
//! mount point itself is a regular file (not a directory); the FUSE root
//! inode (`1`) *is* the exposed file, so only `getattr`/`open`/`read` on
//! that inode are meaningful — there is no directory tree to walk.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyOpen, Request};
use libc::ENOENT;
use log::{debug, warn};

use crate::recovery;
use crate::session::Session;

const ROOT_INO: u64 = 1;

/// `getattr` never expires from the kernel's cache; the file's metadata is
/// fixed for the lifetime of the mount.
const ATTR_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

pub struct RescueFs {
    session: Arc<Session>,
}

impl RescueFs {
    pub fn new(session: Arc<Session>) -> Self {
        RescueFs { session }
    }

    fn file_attr(&self) -> FileAttr {
        let size = self.session.lock().config.size;
        let now = UNIX_EPOCH;
        FileAttr {
            ino: ROOT_INO,
            size,
            blocks: size.div_ceil(512),
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: FileType::RegularFile,
            perm: 0o440,
            nlink: 1,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }
}

impl Filesystem for RescueFs {
    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        if ino != ROOT_INO {
            reply.error(ENOENT);
            return;
        }
        reply.attr(&ATTR_TTL, &self.file_attr());
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        if ino != ROOT_INO {
            reply.error(ENOENT);
            return;
        }
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if ino != ROOT_INO || offset < 0 {
            reply.error(ENOENT);
            return;
        }

        let user_offset = offset as u64;
        let total_size = self.session.lock().config.size;
        if user_offset >= total_size {
            reply.data(&[]);
            return;
        }
        let user_size = (size as u64).min(total_size - user_offset) as usize;

        let mut buf = vec![0u8; user_size];
        match recovery::read(&self.session, user_offset, user_size, &mut buf) {
            Ok(outcome) => {
                if outcome.incomplete {
                    debug!("read {user_offset}+{user_size} served with unresolved bytes left as zero");
                }
                reply.data(&buf);
            }
            Err(e) => {
                warn!("fatal error serving read at {user_offset}+{user_size}: {e}");
                reply.error(libc::EIO);
            }
        }
    }
}

fn mount_options() -> Vec<MountOption> {
    vec![
        MountOption::RO,
        MountOption::FSName("fuserescue".to_string()),
        MountOption::AutoUnmount,
        MountOption::CUSTOM("hard_remove".to_string()),
        MountOption::CUSTOM("max_readahead=0".to_string()),
        MountOption::CUSTOM("sync_read".to_string()),
        MountOption::CUSTOM("direct_io".to_string()),
    ]
}

/// Blocking mount-and-serve call. Returns once the filesystem is unmounted
/// (by `fusermount -u`, process signal, or the shell's `exit` command).
/// `mount2` itself dispatches requests one at a time on the calling thread,
/// giving the single-threaded cooperative behavior without a separate flag.
pub fn mount(session: Arc<Session>, mountpoint: &std::path::Path) -> std::io::Result<()> {
    fuser::mount2(RescueFs::new(session), mountpoint, &mount_options())
}

/// Mounts on a background thread and returns immediately, so the calling
/// thread is free to run the control shell. Dropping (or explicitly
/// unmounting) the returned session tears the mount down; this is how the
/// shell's `exit` command ends the FUSE side of the process.
pub fn spawn(session: Arc<Session>, mountpoint: &std::path::Path) -> std::io::Result<fuser::BackgroundSession> {
    fuser::spawn_mount2(RescueFs::new(session), mountpoint, &mount_options())
}
