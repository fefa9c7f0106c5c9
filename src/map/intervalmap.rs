//! The ordered, non-overlapping, state-tagged segmentation of a device
//! address space.
//!
//! Backed by a flat `Vec<Segment>` rather than a balanced tree: real-world
//! rescue jobs fragment into hundreds to low thousands of segments, so a
//! linear scan during `update` and binary search during point queries are
//! both cheap, and serialization is a straight iteration.
//!
//! A byte not covered by any segment is implicitly [`SegmentState::NonTried`]
//! — the map is never required to cover the whole device range.

use std::cmp::Ordering;

use thiserror::Error;

use super::segment::Segment;
use super::state::SegmentState;
use crate::config::ENTRIES_MAX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("segment [{a_offset}, {a_end}) overlaps following segment [{b_offset}, {b_end})")]
    Overlap {
        a_offset: u64,
        a_end: u64,
        b_offset: u64,
        b_end: u64,
    },
    #[error("map would hold {0} segments, exceeding the {max} limit", max = ENTRIES_MAX)]
    TooManySegments(usize),
}

/// An ordered, non-overlapping, state-tagged segmentation of `[0, total)`.
#[derive(Debug, Clone, Default)]
pub struct IntervalMap {
    segments: Vec<Segment>,
}

impl IntervalMap {
    pub fn new() -> Self {
        IntervalMap { segments: Vec::new() }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        IntervalMap { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sorts segments by offset, verifies disjointness, then coalesces any
    /// adjacent-and-touching pair that ended up sharing a state.
    ///
    /// Complexity is dominated by the sort; an implementer is free to pick a
    /// better algorithm than the reference C source's naive insertion sort.
    pub fn normalize(&mut self) -> Result<(), MapError> {
        self.segments.sort_by_key(|s| s.offset);

        for w in self.segments.windows(2) {
            if w[0].end() > w[1].offset {
                return Err(MapError::Overlap {
                    a_offset: w[0].offset,
                    a_end: w[0].end(),
                    b_offset: w[1].offset,
                    b_end: w[1].end(),
                });
            }
        }

        self.coalesce();

        if self.segments.len() > ENTRIES_MAX {
            return Err(MapError::TooManySegments(self.segments.len()));
        }
        Ok(())
    }

    /// Merges adjacent segments that touch (`a.end() == b.offset`) and share
    /// a state. Assumes the segments are already sorted and disjoint.
    fn coalesce(&mut self) {
        if self.segments.is_empty() {
            return;
        }
        let old = std::mem::take(&mut self.segments);
        let mut merged: Vec<Segment> = Vec::with_capacity(old.len());
        for seg in old {
            if let Some(last) = merged.last_mut() {
                if last.end() == seg.offset && last.state == seg.state {
                    last.size += seg.size;
                    continue;
                }
            }
            merged.push(seg);
        }
        self.segments = merged;
    }

    /// Returns the state covering `point`, or `NonTried` if `point` is not
    /// covered by any segment.
    pub fn query(&self, point: u64) -> SegmentState {
        match self.segments.binary_search_by(|s| {
            if point < s.offset {
                Ordering::Greater
            } else if point >= s.end() {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        }) {
            Ok(i) => self.segments[i].state,
            Err(_) => SegmentState::NonTried,
        }
    }

    /// Replaces the state of `[start, end)` with `new_state`, preserving
    /// sortedness, disjointness, and the no-touching-equal-state invariant.
    /// A no-op if `end <= start`; never inserts a zero-sized segment.
    ///
    /// Segments already at `new_state` are extended rather than replaced, so
    /// repeated updates converge on a single merged segment covering
    /// `[start, end)` plus whatever adjacent same-state neighbors it touches.
    pub fn update(&mut self, start: u64, end: u64, new_state: SegmentState) -> Result<(), MapError> {
        if end <= start {
            return Ok(());
        }

        let old = std::mem::take(&mut self.segments);
        let mut result: Vec<Segment> = Vec::with_capacity(old.len() + 2);
        let mut new_seg_pushed = false;

        for seg in old {
            if seg.end() <= start {
                result.push(seg);
                continue;
            }
            if seg.offset >= end {
                if !new_seg_pushed {
                    result.push(Segment::new(start, end - start, new_state));
                    new_seg_pushed = true;
                }
                result.push(seg);
                continue;
            }

            // seg intersects [start, end)
            if seg.offset < start {
                result.push(Segment::new(seg.offset, start - seg.offset, seg.state));
            }
            if !new_seg_pushed {
                result.push(Segment::new(start, end - start, new_state));
                new_seg_pushed = true;
            }
            if seg.end() > end {
                result.push(Segment::new(end, seg.end() - end, seg.state));
            }
        }

        if !new_seg_pushed {
            result.push(Segment::new(start, end - start, new_state));
        }

        self.segments = result;
        self.coalesce();

        if self.segments.len() > ENTRIES_MAX {
            return Err(MapError::TooManySegments(self.segments.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(offset: u64, size: u64, state: SegmentState) -> Segment {
        Segment::new(offset, size, state)
    }

    #[test]
    fn empty_point_is_non_tried() {
        let m = IntervalMap::new();
        assert_eq!(m.query(42), SegmentState::NonTried);
    }

    #[test]
    fn update_into_empty_map() {
        let mut m = IntervalMap::new();
        m.update(10, 20, SegmentState::Finished).unwrap();
        assert_eq!(m.segments(), &[seg(10, 10, SegmentState::Finished)]);
        assert_eq!(m.query(9), SegmentState::NonTried);
        assert_eq!(m.query(10), SegmentState::Finished);
        assert_eq!(m.query(19), SegmentState::Finished);
        assert_eq!(m.query(20), SegmentState::NonTried);
    }

    #[test]
    fn update_merges_at_left_boundary_only() {
        // Invariant 3 forces the merge at the left boundary only.
        let mut m = IntervalMap::from_segments(vec![
            seg(0, 100, SegmentState::Finished),
            seg(200, 100, SegmentState::NonTried),
        ]);
        m.update(100, 200, SegmentState::Finished).unwrap();
        assert_eq!(
            m.segments(),
            &[seg(0, 200, SegmentState::Finished), seg(200, 100, SegmentState::NonTried)]
        );
    }

    #[test]
    fn update_splits_segment_strictly_inside() {
        let mut m = IntervalMap::from_segments(vec![seg(0, 100, SegmentState::NonTried)]);
        m.update(40, 60, SegmentState::BadSector).unwrap();
        assert_eq!(
            m.segments(),
            &[
                seg(0, 40, SegmentState::NonTried),
                seg(40, 20, SegmentState::BadSector),
                seg(60, 40, SegmentState::NonTried),
            ]
        );
    }

    #[test]
    fn update_absorbs_fully_contained_segments() {
        let mut m = IntervalMap::from_segments(vec![
            seg(0, 10, SegmentState::NonTried),
            seg(10, 10, SegmentState::BadSector),
            seg(20, 10, SegmentState::NonScraped),
            seg(30, 10, SegmentState::NonTried),
        ]);
        m.update(5, 35, SegmentState::Finished).unwrap();
        assert_eq!(
            m.segments(),
            &[seg(0, 5, SegmentState::NonTried), seg(5, 30, SegmentState::Finished)]
        );
    }

    #[test]
    fn update_extends_segment_already_at_new_state() {
        let mut m = IntervalMap::from_segments(vec![seg(0, 50, SegmentState::Finished)]);
        m.update(25, 75, SegmentState::Finished).unwrap();
        assert_eq!(m.segments(), &[seg(0, 75, SegmentState::Finished)]);
    }

    #[test]
    fn update_zero_length_range_is_noop() {
        let mut m = IntervalMap::from_segments(vec![seg(0, 10, SegmentState::NonTried)]);
        m.update(5, 5, SegmentState::Finished).unwrap();
        assert_eq!(m.segments(), &[seg(0, 10, SegmentState::NonTried)]);
    }

    #[test]
    fn normalize_rejects_overlap() {
        let mut m = IntervalMap::from_segments(vec![
            seg(0, 10, SegmentState::NonTried),
            seg(5, 10, SegmentState::Finished),
        ]);
        assert!(matches!(m.normalize(), Err(MapError::Overlap { .. })));
    }

    #[test]
    fn normalize_sorts_and_coalesces() {
        let mut m = IntervalMap::from_segments(vec![
            seg(10, 10, SegmentState::Finished),
            seg(0, 10, SegmentState::Finished),
        ]);
        m.normalize().unwrap();
        assert_eq!(m.segments(), &[seg(0, 20, SegmentState::Finished)]);
    }

    #[test]
    fn update_never_touches_bytes_outside_range() {
        let mut m = IntervalMap::from_segments(vec![seg(0, 1000, SegmentState::NonTried)]);
        m.update(100, 200, SegmentState::BadSector).unwrap();
        for p in [0u64, 50, 99, 200, 500, 999] {
            assert_eq!(m.query(p), SegmentState::NonTried, "point {p}");
        }
        for p in 100u64..200 {
            assert_eq!(m.query(p), SegmentState::BadSector, "point {p}");
        }
    }
}
