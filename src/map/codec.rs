//! Mapfile codec: reads and writes the ddrescue-compatible textual mapfile
//! format.
//!
//! Format: line-oriented, `#`-prefixed lines are comments, blank lines are
//! skipped. The first non-comment line is the status line (`<total>
//! <status-char>`); subsequent non-comment lines are entries (`<offset>
//! <size> <state-char>`). No line may exceed
//! [`MAX_MAPFILE_LINE`](crate::config::MAX_MAPFILE_LINE) bytes.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::config::{MAPFILE_MODE, MAX_MAPFILE_LINE};
use crate::error::RescueError;
use crate::util::{format_hex_u64, parse_u64, skip_spaces, Cursor};

use super::intervalmap::IntervalMap;
use super::segment::Segment;
use super::state::{MapState, SegmentState};

/// The in-memory map: the device's declared total size, the map-header
/// state, and the segment table itself.
#[derive(Debug, Clone)]
pub struct Map {
    pub total: u64,
    pub header_state: MapState,
    pub intervals: IntervalMap,
}

impl Map {
    pub fn empty() -> Self {
        Map {
            total: 0,
            header_state: MapState::NonTried,
            intervals: IntervalMap::new(),
        }
    }

    /// Loads a mapfile. A missing file is treated as success with an empty
    /// map. The result is normalized before being returned; a normalization
    /// failure fails the load.
    pub fn load(path: &Path) -> Result<Self, RescueError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => {
                return Err(RescueError::Usage(format!(
                    "cannot open mapfile {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let reader = BufReader::new(file);
        let mut header: Option<(u64, MapState)> = None;
        let mut segments = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                RescueError::Usage(format!("mapfile read error at line {}: {}", lineno + 1, e))
            })?;

            if line.len() > MAX_MAPFILE_LINE {
                return Err(RescueError::Usage(format!(
                    "mapfile line {} exceeds {} bytes",
                    lineno + 1,
                    MAX_MAPFILE_LINE
                )));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if header.is_none() {
                header = Some(parse_status_line(trimmed, lineno + 1)?);
            } else {
                segments.push(parse_entry_line(trimmed, lineno + 1)?);
            }
        }

        let (total, header_state) = header.unwrap_or((0, MapState::NonTried));
        let mut map = Map {
            total,
            header_state,
            intervals: IntervalMap::from_segments(segments),
        };
        map.intervals
            .normalize()
            .map_err(|e| RescueError::Usage(format!("mapfile is structurally invalid: {}", e)))?;
        Ok(map)
    }

    /// Normalizes, then writes the fixed header block, the status line
    /// (always `0  +`, per the reference format), and one entry line per
    /// segment to `path`. Creates the file with [`MAPFILE_MODE`] if absent.
    ///
    /// A normalization failure at save time is reported rather than causing
    /// the process to exit directly — the binary entry point is responsible
    /// for dumping the map and calling `process::exit(5)`, keeping this
    /// library function free of process-level side effects.
    pub fn save(&mut self, path: &Path) -> Result<(), RescueError> {
        self.intervals
            .normalize()
            .map_err(|e| RescueError::MapSave(format!("refusing to save an invalid map: {}", e)))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(MAPFILE_MODE)
            .open(path)
            .map_err(|e| RescueError::MapSave(format!("cannot open {}: {}", path.display(), e)))?;

        self.write_to(&mut file)
            .map_err(|e| RescueError::MapSave(format!("write to {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Renders the map into `w`, used by both [`Map::save`] and the shell's
    /// `show map` command (which writes to the pager's pipe instead of a file).
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "# Mapfile. Created by fuserescue")?;
        writeln!(w, "# Command line: fuserescue")?;
        writeln!(w, "# Start time: unspecified")?;
        writeln!(w, "# current_pos  current_status")?;
        writeln!(w, "0  {}", MapState::Finished.to_char())?;
        writeln!(w, "#      pos        size  status")?;
        for seg in self.intervals.segments() {
            writeln!(
                w,
                "{}  {}  {}",
                format_hex_u64(seg.offset),
                format_hex_u64(seg.size),
                seg.state.to_char()
            )?;
        }
        Ok(())
    }
}

fn parse_status_line(line: &str, lineno: usize) -> Result<(u64, MapState), RescueError> {
    let mut cur = Cursor::new(line);
    let total = parse_u64(&mut cur)
        .map_err(|e| RescueError::Usage(format!("mapfile line {}: bad total: {}", lineno, e)))?;
    skip_spaces(&mut cur);
    let state_char = cur
        .rest()
        .chars()
        .next()
        .ok_or_else(|| RescueError::Usage(format!("mapfile line {}: missing status char", lineno)))?;
    let state = MapState::from_char(state_char)
        .map_err(|e| RescueError::Usage(format!("mapfile line {}: {}", lineno, e)))?;
    Ok((total, state))
}

fn parse_entry_line(line: &str, lineno: usize) -> Result<Segment, RescueError> {
    let mut cur = Cursor::new(line);
    let offset = parse_u64(&mut cur)
        .map_err(|e| RescueError::Usage(format!("mapfile line {}: bad offset: {}", lineno, e)))?;
    skip_spaces(&mut cur);
    let size = parse_u64(&mut cur)
        .map_err(|e| RescueError::Usage(format!("mapfile line {}: bad size: {}", lineno, e)))?;
    skip_spaces(&mut cur);
    let state_char = cur
        .rest()
        .chars()
        .next()
        .ok_or_else(|| RescueError::Usage(format!("mapfile line {}: missing state char", lineno)))?;
    let state = SegmentState::from_char(state_char)
        .map_err(|e| RescueError::Usage(format!("mapfile line {}: {}", lineno, e)))?;
    if size == 0 {
        return Err(RescueError::Usage(format!(
            "mapfile line {}: zero-sized segment",
            lineno
        )));
    }
    Ok(Segment::new(offset, size, state))
}
