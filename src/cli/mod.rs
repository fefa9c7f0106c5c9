//! Command-line argument parsing: `fuserescue infile outfile mapfile
//! mountpoint [offset] [size]`.

mod args;

pub use args::{parse_offset_or_size, Args};
