//! Compile-time configuration constants: tunables that in a C codebase
//! would live in a handful of `#define`s, collected into one module.

/// Maximum number of segments an [`IntervalMap`](crate::map::IntervalMap) may hold.
pub const ENTRIES_MAX: usize = 10_485_760;

/// Upper bound on `blocksize`: the largest single read attempted against the
/// infile in one recovery chunk.
pub const DIRECTIO_BUFFER_SIZE: usize = 10_240;

/// Fallback blocksize when the infile's logical sector size cannot be
/// determined via `BLKSSZGET`.
pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// Hard cap on the number of ranges the read-planning phase may produce
/// before it gives up and reports what it has.
pub const MAX_SLICES: usize = 1_048_576;

/// Longest line the mapfile codec will accept; a longer line aborts the load.
pub const MAX_MAPFILE_LINE: usize = 256;

/// Permission bits applied to a newly created outfile.
pub const OUTFILE_MODE: u32 = 0o660;

/// Permission bits applied to a newly created mapfile. An explicit mode is
/// passed here rather than relying on whatever `O_CREAT` defaults to.
pub const MAPFILE_MODE: u32 = 0o640;
