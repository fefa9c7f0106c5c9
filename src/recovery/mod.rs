//! The read-path recovery engine: turns a user read into a minimum set of
//! outfile copies plus bidirectional infile recovery attempts, updating the
//! map under the session lock while staying consistent with a concurrent
//! control-shell thread.

mod infile;

pub use infile::{InfileSource, PositionedFile};

use std::io;
use std::os::unix::fs::FileExt;

use log::{info, warn};

use crate::config::MAX_SLICES;
use crate::error::RescueError;
use crate::map::{SegmentState, Segment};
use crate::session::Session;

/// Outcome of [`read`]: `bytes` is always the full requested length — the
/// caller's buffer is zero-filled up front and any range that could not be
/// served is left zero — while `incomplete` flags whether every byte was
/// actually recovered.
pub struct ReadOutcome {
    pub bytes: usize,
    pub incomplete: bool,
}

/// Serves a user read of `user_size` bytes starting at `user_offset` into
/// `out`, consulting and updating the map as needed. `out.len()` must be at
/// least `user_size`.
///
/// Phase 1 (plan) runs under the session lock. Phase 2 (recover) performs
/// the infile/outfile I/O with the lock released except for the narrow
/// per-chunk map update. Phase 3 (finalize) saves the map if it was dirtied.
pub fn read(session: &Session, user_offset: u64, user_size: usize, out: &mut [u8]) -> Result<ReadOutcome, RescueError> {
    debug_assert!(out.len() >= user_size);
    for b in &mut out[..user_size] {
        *b = 0;
    }

    let (to_recover, mut incomplete, base_offset, blocksize, allowed) = plan(session, user_offset, user_size, out)?;

    if to_recover.is_empty() {
        return Ok(ReadOutcome { bytes: user_size, incomplete });
    }

    if !allowed {
        warn!("recovery disabled; returning zeros for {} unresolved range(s)", to_recover.len());
        return Ok(ReadOutcome { bytes: user_size, incomplete: true });
    }

    for (start, end) in to_recover {
        info!("trying to recover {base_offset}+{start} - {end}");
        let failed = recover_range(session, base_offset, blocksize, start, end, user_offset, out)?;
        incomplete |= failed;
    }

    finalize(session)?;
    Ok(ReadOutcome { bytes: user_size, incomplete })
}

/// Phase 1: walks the map under the lock, serving `Finished` ranges from the
/// outfile and computing the still-unresolved sub-ranges of the user
/// request. Returns `(to_recover, had_policy_error, session.offset,
/// session.blocksize, session.allowed)`, releasing the lock before returning.
fn plan(
    session: &Session,
    user_offset: u64,
    user_size: usize,
    out: &mut [u8],
) -> Result<(Vec<(u64, u64)>, bool, u64, usize, bool), RescueError> {
    let mut state = session.lock();

    let user_end = user_offset + user_size as u64;
    let mut active = (user_offset, user_end);
    let mut pieces: Vec<(u64, u64)> = Vec::new();
    let mut had_error = false;

    let intersecting: Vec<Segment> = state
        .map
        .intervals
        .segments()
        .iter()
        .filter(|s| s.intersects(user_offset, user_end))
        .copied()
        .collect();

    for seg in intersecting {
        if active.0 >= active.1 {
            break;
        }
        let ov_start = seg.offset.max(active.0);
        let ov_end = seg.end().min(active.1);
        if ov_start >= ov_end {
            continue;
        }

        if seg.state == SegmentState::Finished {
            let len = (ov_end - ov_start) as usize;
            let dst = &mut out[(ov_start - user_offset) as usize..(ov_end - user_offset) as usize];
            let n = state
                .outfile
                .read_at(dst, ov_start)
                .map_err(RescueError::Outfile)?;
            if n != len {
                return Err(RescueError::Outfile(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read from outfile for a Finished range",
                )));
            }
            info!("read {ov_start} - {ov_end}");

            if ov_start > active.0 {
                pieces.push((active.0, ov_start));
                if pieces.len() > MAX_SLICES {
                    return Ok((pieces, true, state.config.offset, state.config.blocksize, state.config.allowed));
                }
            }
            active = (ov_end, active.1);
        } else if state.config.recover_states.is_set(seg.state) {
            // Set bit: "treat as recoverable on demand" — leave it folded
            // into `active` so Phase 2 attempts it, do not subtract.
            continue;
        } else {
            // Clear bit: policy refuses this range outright.
            had_error = true;
            if ov_start > active.0 {
                pieces.push((active.0, ov_start));
                if pieces.len() > MAX_SLICES {
                    return Ok((pieces, true, state.config.offset, state.config.blocksize, state.config.allowed));
                }
            }
            active = (ov_end, active.1);
        }
    }

    if active.0 < active.1 {
        pieces.push(active);
    }

    Ok((pieces, had_error, state.config.offset, state.config.blocksize, state.config.allowed))
}

/// Phase 2 for a single unresolved range: two cursors converge from
/// opposite ends in `blocksize` chunks, flipping direction on an `EIO`. This
/// both establishes the bad span's boundaries before descending into its
/// `NonTried` core (ddrescue's trimming strategy) and sidesteps the
/// documented `i == j` skip hazard of indexing directly into the range list
/// (see DESIGN.md) by converging within one range rather than across many.
///
/// Returns `true` if any byte in `[start, end)` was left unserved.
fn recover_range(
    session: &Session,
    base_offset: u64,
    blocksize: usize,
    start: u64,
    end: u64,
    user_offset: u64,
    out: &mut [u8],
) -> Result<bool, RescueError> {
    #[derive(Clone, Copy)]
    enum Direction {
        Forward,
        Backward,
    }

    let mut lo = start;
    let mut hi = end;
    let mut direction = Direction::Forward;
    let mut failed = false;
    let mut chunk = vec![0u8; blocksize];

    while lo < hi {
        match direction {
            Direction::Forward => {
                let chunk_end = (lo + blocksize as u64).min(hi);
                let len = (chunk_end - lo) as usize;
                match read_infile_retrying(session, base_offset + lo, &mut chunk[..len]) {
                    Ok(()) => {
                        commit_chunk(session, lo, chunk_end, &chunk[..len], user_offset, out)?;
                        lo = chunk_end;
                    }
                    Err(RangeReadError::Eio) => {
                        mark_range(session, lo, chunk_end, SegmentState::NonScraped)?;
                        if chunk_end < hi {
                            mark_range(session, chunk_end, hi, SegmentState::NonTried)?;
                        }
                        lo = chunk_end;
                        direction = Direction::Backward;
                        failed = true;
                    }
                    Err(RangeReadError::Fatal(e)) => return Err(RescueError::InfileSeek(e)),
                }
            }
            Direction::Backward => {
                let chunk_start = hi.saturating_sub(blocksize as u64).max(lo);
                let len = (hi - chunk_start) as usize;
                match read_infile_retrying(session, base_offset + chunk_start, &mut chunk[..len]) {
                    Ok(()) => {
                        commit_chunk(session, chunk_start, hi, &chunk[..len], user_offset, out)?;
                        hi = chunk_start;
                    }
                    Err(RangeReadError::Eio) => {
                        mark_range(session, chunk_start, hi, SegmentState::NonScraped)?;
                        if chunk_start > lo {
                            mark_range(session, lo, chunk_start, SegmentState::NonTried)?;
                        }
                        hi = chunk_start;
                        direction = Direction::Forward;
                        failed = true;
                    }
                    Err(RangeReadError::Fatal(e)) => return Err(RescueError::InfileSeek(e)),
                }
            }
        }
    }

    Ok(failed)
}

enum RangeReadError {
    Eio,
    Fatal(io::Error),
}

/// Reads exactly `buf.len()` bytes at `offset`, retrying on `EINTR` and
/// classifying `EIO` separately from every other (fatal) errno.
fn read_infile_retrying(session: &Session, offset: u64, buf: &mut [u8]) -> Result<(), RangeReadError> {
    loop {
        let state = session.lock();
        match state.infile.read_at(buf, offset) {
            Ok(n) if n == buf.len() => return Ok(()),
            Ok(0) => {
                return Err(RangeReadError::Fatal(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "infile read returned zero bytes before the requested length was reached",
                )))
            }
            Ok(_) => continue, // short, non-zero, non-error read: retry for the remainder
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.raw_os_error() == Some(libc::EIO) => return Err(RangeReadError::Eio),
            Err(e) => return Err(RangeReadError::Fatal(e)),
        }
    }
}

/// Commits a successfully recovered chunk: writes it to the outfile at its
/// logical offset, copies it into the caller's buffer, and marks the map
/// range `Finished` under a freshly (re-)acquired lock.
fn commit_chunk(
    session: &Session,
    start: u64,
    end: u64,
    data: &[u8],
    user_offset: u64,
    out: &mut [u8],
) -> Result<(), RescueError> {
    let mut state = session.lock();
    state
        .outfile
        .write_all_at(data, start)
        .map_err(RescueError::Outfile)?;
    state.map.intervals.update(start, end, SegmentState::Finished)?;
    state.config.unsaved = true;
    drop(state);

    let dst = &mut out[(start - user_offset) as usize..(end - user_offset) as usize];
    dst.copy_from_slice(data);
    Ok(())
}

fn mark_range(session: &Session, start: u64, end: u64, new_state: SegmentState) -> Result<(), RescueError> {
    let mut state = session.lock();
    state.map.intervals.update(start, end, new_state)?;
    state.config.unsaved = true;
    Ok(())
}

/// Phase 3: persists the map if it was dirtied during recovery.
fn finalize(session: &Session) -> Result<(), RescueError> {
    let mut state = session.lock();
    if !state.config.unsaved {
        return Ok(());
    }
    let path = state.config.mapfile_path.clone();
    state.map.save(&path)?;
    state.config.unsaved = false;
    Ok(())
}

/// `write_all_at` is not part of stable `FileExt`; this small shim loops
/// `write_at` the way `Write::write_all` loops `write`.
trait WriteAllAt {
    fn write_all_at(&mut self, buf: &[u8], offset: u64) -> io::Result<()>;
}

impl WriteAllAt for std::fs::File {
    fn write_all_at(&mut self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            let n = std::os::unix::fs::FileExt::write_at(self, buf, offset)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write whole buffer to outfile"));
            }
            buf = &buf[n..];
            offset += n as u64;
        }
        Ok(())
    }
}
