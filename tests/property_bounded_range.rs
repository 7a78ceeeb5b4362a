// tests/property_bounded_range.rs

use proptest::prelude::*;

use blockorch::block::{BoundedRange, Range};

proptest! {
    #[test]
    fn bounded_range_follows_the_segment_formula(
        initial in 0..1_000u64,
        interval in 1..100u64,
        start in 0..2_000u64,
        end in 0..2_000u64,
    ) {
        let bounded = BoundedRange::new(initial, interval, start, end);

        if end <= initial || start >= end {
            prop_assert_eq!(bounded.range(), None);
            prop_assert_eq!(bounded.iter().count(), 0);
            return Ok(());
        }

        let effective = start.max(initial);
        let expected_start = (effective / interval * interval).max(initial);
        let expected_end = end.min((expected_start / interval + 1) * interval);
        prop_assert_eq!(bounded.range(), Some(Range::new(expected_start, expected_end)));

        let chunks: Vec<Range> = bounded.iter().collect();
        prop_assert_eq!(chunks.first().copied(), bounded.range());
        prop_assert_eq!(chunks.last().map(|r| r.exclusive_end_block), Some(end));
        for chunk in &chunks {
            prop_assert!(chunk.start_block < chunk.exclusive_end_block);
            // Never crosses a segment boundary.
            let last_block = chunk.exclusive_end_block - 1;
            prop_assert_eq!(chunk.start_block / interval, last_block / interval);
        }
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].exclusive_end_block, pair[1].start_block);
        }
    }
}
