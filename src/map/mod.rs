//! The interval map and the ddrescue-compatible mapfile codec.

pub mod codec;
pub mod intervalmap;
pub mod segment;
pub mod state;

pub use codec::Map;
pub use intervalmap::{IntervalMap, MapError};
pub use segment::Segment;
pub use state::{MapState, RecoverStates, SegmentState, UnknownStateChar};
