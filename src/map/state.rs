//! Segment and map-header state enumerations, and the `recover_states`
//! bitmask over the four non-finished segment states.
//!
//! These are closed enumerations, expressed as tagged variants rather than
//! trait objects.

use thiserror::Error;

/// State of a single map segment. Only `Finished` means the corresponding
/// bytes in the outfile are valid recovered data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentState {
    NonTried,
    NonTrimmed,
    NonScraped,
    BadSector,
    Finished,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized state character {0:?}")]
pub struct UnknownStateChar(pub char);

impl SegmentState {
    pub fn to_char(self) -> char {
        match self {
            SegmentState::NonTried => '?',
            SegmentState::NonTrimmed => '*',
            SegmentState::NonScraped => '/',
            SegmentState::BadSector => '-',
            SegmentState::Finished => '+',
        }
    }

    pub fn from_char(c: char) -> Result<Self, UnknownStateChar> {
        match c {
            '?' => Ok(SegmentState::NonTried),
            '*' => Ok(SegmentState::NonTrimmed),
            '/' => Ok(SegmentState::NonScraped),
            '-' => Ok(SegmentState::BadSector),
            '+' => Ok(SegmentState::Finished),
            other => Err(UnknownStateChar(other)),
        }
    }

    /// Bit position of this state in a [`RecoverStates`] mask. `Finished`
    /// has no bit — the bitmask is only meaningful over non-finished states.
    fn bit(self) -> Option<u8> {
        match self {
            SegmentState::NonTried => Some(0),
            SegmentState::NonTrimmed => Some(1),
            SegmentState::NonScraped => Some(2),
            SegmentState::BadSector => Some(3),
            SegmentState::Finished => None,
        }
    }
}

/// Map-header state, annotating the mapfile as a whole. Read from the
/// status line; the core always writes `Finished` on save and otherwise
/// does not act on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    NonTried,
    NonTrimmed,
    NonScraped,
    BadSector,
    SpecifiedBlocks,
    Approximate,
    Finished,
}

impl MapState {
    pub fn to_char(self) -> char {
        match self {
            MapState::NonTried => '?',
            MapState::NonTrimmed => '*',
            MapState::NonScraped => '/',
            MapState::BadSector => '-',
            MapState::SpecifiedBlocks => 'F',
            MapState::Approximate => 'G',
            MapState::Finished => '+',
        }
    }

    pub fn from_char(c: char) -> Result<Self, UnknownStateChar> {
        match c {
            '?' => Ok(MapState::NonTried),
            '*' => Ok(MapState::NonTrimmed),
            '/' => Ok(MapState::NonScraped),
            '-' => Ok(MapState::BadSector),
            'F' => Ok(MapState::SpecifiedBlocks),
            'G' => Ok(MapState::Approximate),
            '+' => Ok(MapState::Finished),
            other => Err(UnknownStateChar(other)),
        }
    }
}

/// Bitmask over the four non-finished [`SegmentState`] variants. A set bit
/// means "treat this state as recoverable on demand" — the engine leaves
/// matching ranges in the recovery plan instead of refusing them outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverStates(u8);

impl RecoverStates {
    pub const NONE: RecoverStates = RecoverStates(0);

    pub fn set(&mut self, state: SegmentState) {
        if let Some(bit) = state.bit() {
            self.0 |= 1 << bit;
        }
    }

    pub fn clear(&mut self, state: SegmentState) {
        if let Some(bit) = state.bit() {
            self.0 &= !(1 << bit);
        }
    }

    /// `true` when `state` is configured as recoverable on demand.
    pub fn is_set(&self, state: SegmentState) -> bool {
        match state.bit() {
            Some(bit) => self.0 & (1 << bit) != 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_char_roundtrip() {
        for s in [
            SegmentState::NonTried,
            SegmentState::NonTrimmed,
            SegmentState::NonScraped,
            SegmentState::BadSector,
            SegmentState::Finished,
        ] {
            assert_eq!(SegmentState::from_char(s.to_char()).unwrap(), s);
        }
    }

    #[test]
    fn map_state_char_roundtrip() {
        for s in [
            MapState::NonTried,
            MapState::NonTrimmed,
            MapState::NonScraped,
            MapState::BadSector,
            MapState::SpecifiedBlocks,
            MapState::Approximate,
            MapState::Finished,
        ] {
            assert_eq!(MapState::from_char(s.to_char()).unwrap(), s);
        }
    }

    #[test]
    fn recover_states_bitmask() {
        let mut r = RecoverStates::NONE;
        assert!(!r.is_set(SegmentState::NonTried));
        r.set(SegmentState::NonTried);
        assert!(r.is_set(SegmentState::NonTried));
        assert!(!r.is_set(SegmentState::BadSector));
        r.clear(SegmentState::NonTried);
        assert!(!r.is_set(SegmentState::NonTried));
    }

    #[test]
    fn finished_has_no_bit() {
        let mut r = RecoverStates::NONE;
        r.set(SegmentState::Finished);
        assert!(!r.is_set(SegmentState::Finished));
    }
}
