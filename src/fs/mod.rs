//! The filesystem adapter: binds the recovery engine to a FUSE mount.

mod rescuefs;

pub use rescuefs::{mount, spawn, RescueFs};
