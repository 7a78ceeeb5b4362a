// src/block/range.rs

use std::fmt;
use std::str::FromStr;

/// Half-open interval of blocks: `[start_block, exclusive_end_block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Range {
    pub start_block: u64,
    pub exclusive_end_block: u64,
}

impl Range {
    pub fn new(start_block: u64, exclusive_end_block: u64) -> Self {
        Self {
            start_block,
            exclusive_end_block,
        }
    }

    pub fn len(&self) -> u64 {
        self.exclusive_end_block.saturating_sub(self.start_block)
    }

    pub fn is_empty(&self) -> bool {
        self.exclusive_end_block <= self.start_block
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start_block && block < self.exclusive_end_block
    }

    /// Whether the two ranges share at least one block.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start_block < other.exclusive_end_block
            && other.start_block < self.exclusive_end_block
    }

    /// Split at every multiple of `interval` falling strictly inside the range.
    ///
    /// `[5, 32)` split by 10 gives `[5,10) [10,20) [20,30) [30,32)`.
    pub fn split(&self, interval: u64) -> Vec<Range> {
        if interval == 0 || self.is_empty() {
            return vec![*self];
        }

        let mut out = Vec::new();
        let mut start = self.start_block;
        while start < self.exclusive_end_block {
            let boundary = (start / interval + 1) * interval;
            let end = boundary.min(self.exclusive_end_block);
            out.push(Range::new(start, end));
            start = end;
        }
        out
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_block, self.exclusive_end_block)
    }
}

impl FromStr for Range {
    type Err = String;

    /// Parse the `"start-end"` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid range {s:?} (expected \"start-end\")"))?;

        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid range start in {s:?}: {e}"))?;
        let end = end
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid range end in {s:?}: {e}"))?;

        if end < start {
            return Err(format!("invalid range {s:?}: end before start"));
        }
        Ok(Range::new(start, end))
    }
}

/// Ordered list of ranges, sorted ascending by start block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ranges(Vec<Range>);

impl Ranges {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Range> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range> {
        self.0.iter()
    }

    /// Insert keeping the list sorted by start block.
    pub fn insert(&mut self, range: Range) {
        let pos = self
            .0
            .partition_point(|r| r.start_block <= range.start_block);
        self.0.insert(pos, range);
    }

    /// First already-held range that overlaps `range`, if any.
    pub fn find_overlap(&self, range: &Range) -> Option<&Range> {
        self.0.iter().find(|r| r.overlaps(range))
    }

    pub fn pop_first(&mut self) -> Option<Range> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// Merge adjacent ranges (`[a,b)` followed by `[b,c)` becomes `[a,c)`).
    pub fn merged(&self) -> Ranges {
        let mut out: Vec<Range> = Vec::with_capacity(self.0.len());
        for r in &self.0 {
            match out.last_mut() {
                Some(last) if last.exclusive_end_block == r.start_block => {
                    last.exclusive_end_block = r.exclusive_end_block;
                }
                _ => out.push(*r),
            }
        }
        Ranges(out)
    }
}

impl From<Vec<Range>> for Ranges {
    fn from(mut ranges: Vec<Range>) -> Self {
        ranges.sort();
        Ranges(ranges)
    }
}

impl fmt::Display for Ranges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|r| r.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
