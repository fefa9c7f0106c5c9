use std::path::PathBuf;

use clap::Parser;

use crate::util::{Cursor, ParseError};

/// `fuserescue infile outfile mapfile mountpoint [offset] [size]`
#[derive(Debug, Parser)]
#[command(name = "fuserescue", about = "Lazy, on-demand data recovery for failing block devices")]
pub struct Args {
    /// The failing source device or image to recover from.
    pub infile: PathBuf,

    /// Destination image receiving recovered bytes.
    pub outfile: PathBuf,

    /// ddrescue-compatible mapfile recording recovery progress.
    pub mapfile: PathBuf,

    /// Existing regular file the rescued data is mounted over.
    pub mountpoint: PathBuf,

    /// Fixed base offset into the infile; every infile access adds this.
    #[arg(value_parser = parse_offset_or_size, default_value_t = 0)]
    pub offset: u64,

    /// Length exposed via the mount, capped against the infile's remaining length.
    /// Defaults to the infile's full length from `offset` onward (resolved after
    /// the infile is opened, since it depends on the infile's seekable size).
    #[arg(value_parser = parse_offset_or_size)]
    pub size: Option<u64>,
}

/// `clap` value parser wired to the same `parse_u64` used by the mapfile
/// codec and the shell, so CLI numbers accept the same `0x`/`0`-prefixed
/// base-16/8 notation rather than clap's plain-decimal default.
pub fn parse_offset_or_size(s: &str) -> Result<u64, String> {
    let mut cur = Cursor::new(s);
    let value = parse_u64_strict(&mut cur).map_err(|e| e.to_string())?;
    if !cur.is_empty() {
        return Err(format!("unexpected trailing characters: {:?}", cur.rest()));
    }
    Ok(value)
}

fn parse_u64_strict(cur: &mut Cursor) -> Result<u64, ParseError> {
    crate::util::parse_u64(cur)
}
