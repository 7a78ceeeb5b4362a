// src/block/bounded.rs

use crate::block::Range;

/// A request window clipped to the segment boundaries of one module.
///
/// The computed [`Range`] always starts on a segment boundary (or on the
/// module's initial block), even when the requested start falls in the
/// middle of a segment. Store building walks contiguous segments, so the
/// literal requested start is not preserved; callers needing it must clip
/// again downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRange {
    module_initial_block: u64,
    interval: u64,
    request_start_block: u64,
    request_exclusive_end_block: u64,
    range: Option<Range>,
}

impl BoundedRange {
    pub fn new(
        module_initial_block: u64,
        interval: u64,
        request_start_block: u64,
        request_exclusive_end_block: u64,
    ) -> Self {
        let interval = interval.max(1);
        let range = initial_bounds(
            module_initial_block,
            interval,
            request_start_block,
            request_exclusive_end_block,
        );
        Self {
            module_initial_block,
            interval,
            request_start_block,
            request_exclusive_end_block,
            range,
        }
    }

    /// The clipped range, or `None` when the module has not started within
    /// the requested window or the request itself is empty.
    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn module_initial_block(&self) -> u64 {
        self.module_initial_block
    }

    pub fn request_start_block(&self) -> u64 {
        self.request_start_block
    }

    pub fn request_exclusive_end_block(&self) -> u64 {
        self.request_exclusive_end_block
    }

    /// The clipped range followed by every later segment-aligned chunk up to
    /// the end of the request.
    pub fn iter(&self) -> BoundedRangeIter {
        BoundedRangeIter {
            next: self.range,
            interval: self.interval,
            end: self.request_exclusive_end_block,
        }
    }
}

fn initial_bounds(
    module_initial_block: u64,
    interval: u64,
    request_start_block: u64,
    request_exclusive_end_block: u64,
) -> Option<Range> {
    if request_exclusive_end_block <= module_initial_block
        || request_start_block >= request_exclusive_end_block
    {
        return None;
    }

    let effective_start = request_start_block.max(module_initial_block);
    let segment_start = (effective_start / interval * interval).max(module_initial_block);
    let segment_end = (segment_start / interval + 1) * interval;

    Some(Range::new(
        segment_start,
        request_exclusive_end_block.min(segment_end),
    ))
}

/// Iterator over the segment-aligned chunks of a [`BoundedRange`].
#[derive(Debug, Clone)]
pub struct BoundedRangeIter {
    next: Option<Range>,
    interval: u64,
    end: u64,
}

impl Iterator for BoundedRangeIter {
    type Item = Range;

    fn next(&mut self) -> Option<Range> {
        let current = self.next?;
        let start = current.exclusive_end_block;
        self.next = if start < self.end {
            let boundary = (start / self.interval + 1) * self.interval;
            Some(Range::new(start, boundary.min(self.end)))
        } else {
            None
        };
        Some(current)
    }
}
