// src/block/segmenter.rs

use crate::block::Range;

/// Maps absolute block numbers to fixed-width segment indices.
///
/// Indices are absolute (`block / interval`) so that every segmenter derived
/// through [`Segmenter::with_initial_block`] shares one coordinate system.
/// The first segment of a window starts at `initial_block` and may therefore
/// be shorter than `interval`; likewise the last one stops at
/// `exclusive_end_block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    interval: u64,
    initial_block: u64,
    exclusive_end_block: u64,
}

impl Segmenter {
    /// `interval` must be non-zero; config validation guarantees this for
    /// every segmenter built by the crate.
    pub fn new(interval: u64, initial_block: u64, exclusive_end_block: u64) -> Self {
        Self {
            interval: interval.max(1),
            initial_block,
            exclusive_end_block,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn initial_block(&self) -> u64 {
        self.initial_block
    }

    pub fn exclusive_end_block(&self) -> u64 {
        self.exclusive_end_block
    }

    /// Same interval and window end, anchored at another module's initial block.
    pub fn with_initial_block(&self, initial_block: u64) -> Self {
        Self {
            initial_block,
            ..*self
        }
    }

    pub fn index_for_start_block(&self, block: u64) -> usize {
        (block / self.interval) as usize
    }

    pub fn index_for_end_block(&self, exclusive_end_block: u64) -> usize {
        (exclusive_end_block.saturating_sub(1) / self.interval) as usize
    }

    pub fn first_index(&self) -> usize {
        self.index_for_start_block(self.initial_block)
    }

    pub fn last_index(&self) -> usize {
        self.index_for_end_block(self.exclusive_end_block)
    }

    /// Number of segments in the window (zero when the window is empty).
    pub fn count(&self) -> usize {
        if self.exclusive_end_block <= self.initial_block {
            return 0;
        }
        self.last_index() - self.first_index() + 1
    }

    /// Block range covered by segment `index`, clipped to the window.
    pub fn range(&self, index: usize) -> Option<Range> {
        let index = index as u64;
        let start = (index * self.interval).max(self.initial_block);
        let end = ((index + 1) * self.interval).min(self.exclusive_end_block);
        if end <= start {
            return None;
        }
        Some(Range::new(start, end))
    }

    /// Whether segment `index` stops before its full boundary.
    pub fn is_partial(&self, index: usize) -> bool {
        match self.range(index) {
            Some(r) => r.exclusive_end_block % self.interval != 0,
            None => false,
        }
    }
}
