//! End-to-end scenario tests for the recovery engine, driven through the
//! public `fuserescue::recovery::read` entry point against a fault-injecting
//! `InfileSource` — no real failing hardware required.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::sync::Mutex;

use fuserescue::map::{Map, RecoverStates, SegmentState};
use fuserescue::recovery::{self, InfileSource};
use fuserescue::session::{LogLevel, RuntimeConfig, Session, SessionState};

/// Reads succeed except at offsets listed in `eio_at`, which fail with
/// `EIO` exactly once, then succeed on retry.
struct FaultInjectingSource {
    data: Mutex<Vec<u8>>,
    eio_at: Mutex<Vec<u64>>,
}

impl FaultInjectingSource {
    fn new(data: Vec<u8>, eio_at: Vec<u64>) -> Self {
        FaultInjectingSource { data: Mutex::new(data), eio_at: Mutex::new(eio_at) }
    }
}

impl InfileSource for FaultInjectingSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut eio_at = self.eio_at.lock().unwrap();
        if let Some(pos) = eio_at.iter().position(|&o| o == offset) {
            eio_at.remove(pos);
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        drop(eio_at);

        let data = self.data.lock().unwrap();
        let start = offset as usize;
        let end = (start + buf.len()).min(data.len());
        if start >= end {
            return Ok(0);
        }
        let n = end - start;
        buf[..n].copy_from_slice(&data[start..end]);
        Ok(n)
    }

    fn reopen(&mut self, _path: &std::path::Path) -> io::Result<()> {
        Ok(())
    }
}

fn session_over(data: Vec<u8>, eio_at: Vec<u64>, blocksize: usize, allowed: bool) -> (Session, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().unwrap();
    let outfile = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(dir.path().join("out.img"))
        .unwrap();
    outfile.set_len(data.len() as u64).unwrap();

    let state = SessionState {
        config: RuntimeConfig {
            infile_path: dir.path().join("in.img"),
            mapfile_path: dir.path().join("rescue.map"),
            offset: 0,
            size: data.len() as u64,
            blocksize,
            recover_states: RecoverStates::NONE,
            allowed,
            unsaved: false,
            loglevel: LogLevel::Default,
        },
        map: Map::empty(),
        infile: Box::new(FaultInjectingSource::new(data, eio_at)),
        outfile,
    };
    (Session::new(state), dir)
}

/// Empty map, recovery allowed, clean infile.
#[test]
fn empty_map_allowed_clean_infile_recovers_and_marks_finished() {
    let data: Vec<u8> = (0u32..8192).map(|i| (i % 256) as u8).collect();
    let (session, _dir) = session_over(data.clone(), vec![], 4096, true);

    let mut buf = vec![0u8; 8192];
    let outcome = recovery::read(&session, 0, 8192, &mut buf).unwrap();
    assert!(!outcome.incomplete);
    assert_eq!(buf, data);

    let state = session.lock();
    assert_eq!(state.map.intervals.segments().len(), 1);
    assert_eq!(state.map.intervals.query(0), SegmentState::Finished);
    assert_eq!(state.map.intervals.query(8191), SegmentState::Finished);
}

/// Map already Finished, outfile has content — infile must never be touched.
#[test]
fn already_finished_range_is_served_from_outfile_only() {
    let (session, _dir) = session_over(vec![0u8; 1024], vec![0, 512], 4096, true);
    {
        let mut state = session.lock();
        state.outfile.write_all_at(&[0xAAu8; 1024], 0).unwrap();
        state.map.intervals.update(0, 1024, SegmentState::Finished).unwrap();
    }

    let mut buf = vec![0u8; 512];
    let outcome = recovery::read(&session, 0, 512, &mut buf).unwrap();
    assert!(!outcome.incomplete);
    assert_eq!(buf, vec![0xAAu8; 512]);

    // The map is untouched: still exactly the one Finished segment.
    let state = session.lock();
    assert_eq!(state.map.intervals.segments().len(), 1);
    assert_eq!(state.map.intervals.segments()[0].state, SegmentState::Finished);
}

/// Recovery disabled entirely.
#[test]
fn recovery_disabled_returns_zeros_and_reports_incomplete() {
    let (session, _dir) = session_over(vec![0x42u8; 4096], vec![], 4096, false);

    let mut buf = vec![0xFFu8; 4096];
    let outcome = recovery::read(&session, 0, 4096, &mut buf).unwrap();
    assert!(outcome.incomplete);
    assert_eq!(buf, vec![0u8; 4096]);
    assert!(session.lock().map.intervals.is_empty());
}

/// EIO at byte 8192 of a 16 KiB read — forward pass establishes
/// `[0, 8192) Finished`, brackets the failure as `NonScraped`/`NonTried`,
/// then the backward pass recovers the tail.
#[test]
fn eio_in_the_middle_brackets_the_failure_and_backward_pass_recovers_the_tail() {
    let data: Vec<u8> = (0u32..16384).map(|i| (i % 251) as u8).collect();
    let (session, _dir) = session_over(data.clone(), vec![8192], 4096, true);

    let mut buf = vec![0u8; 16384];
    let outcome = recovery::read(&session, 0, 16384, &mut buf).unwrap();
    assert!(outcome.incomplete);

    let state = session.lock();
    assert_eq!(state.map.intervals.query(0), SegmentState::Finished);
    assert_eq!(state.map.intervals.query(8191), SegmentState::Finished);
    assert_eq!(state.map.intervals.query(8192), SegmentState::NonScraped);
    assert_eq!(state.map.intervals.query(12287), SegmentState::NonScraped);
    assert_eq!(state.map.intervals.query(12288), SegmentState::Finished);
    assert_eq!(state.map.intervals.query(16383), SegmentState::Finished);
    drop(state);

    assert_eq!(&buf[0..8192], &data[0..8192]);
    assert_eq!(&buf[12288..16384], &data[12288..16384]);
}

/// A successful recovery read leaves the outfile bytes equal to the infile
/// bytes at the corresponding offset.
#[test]
fn recovered_bytes_are_persisted_to_the_outfile() {
    let data: Vec<u8> = vec![0x77u8; 2048];
    let (session, _dir) = session_over(data.clone(), vec![], 4096, true);

    let mut buf = vec![0u8; 2048];
    recovery::read(&session, 0, 2048, &mut buf).unwrap();

    let mut roundtrip = vec![0u8; 2048];
    session.lock().outfile.read_exact_at(&mut roundtrip, 0).unwrap();
    assert_eq!(roundtrip, data);
}
