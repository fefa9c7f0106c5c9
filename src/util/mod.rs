//! Cross-cutting utility functions used by the map codec, the recovery
//! engine, and CLI argument parsing.
//!
//! Submodules:
//! - [`parse`] — unsigned-integer parsing / hex formatting shared by the
//!   mapfile codec and the `offset`/`size` command-line arguments.
//! - [`cursor`] — a tiny byte-cursor helper `parse` advances over.

pub mod cursor;
pub mod parse;

pub use cursor::Cursor;
pub use parse::{format_hex_u64, parse_u64, skip_spaces, ParseError};
