// tests/block_ranges.rs

use blockorch::block::{BoundedRange, Range, Ranges, Segmenter};

fn r(start: u64, end: u64) -> Range {
    Range::new(start, end)
}

#[test]
fn bounded_range_scenarios() {
    // (module initial block, interval, request start, request end, expected)
    let cases: &[(u64, u64, u64, u64, Option<Range>)] = &[
        (8, 10, 10, 20, Some(r(10, 20))),
        (8, 10, 12, 20, Some(r(10, 20))),
        (8, 10, 12, 18, Some(r(10, 18))),
        (8, 10, 2, 20, Some(r(8, 10))),
        (8, 10, 9, 20, Some(r(8, 10))),
        (32, 10, 2, 8, None),
        (32, 10, 2, 12, None),
        (32, 10, 2, 32, None),
        (0, 100, 0, 1000, Some(r(0, 100))),
        // Empty and inverted requests.
        (8, 10, 20, 20, None),
        (8, 10, 20, 12, None),
    ];

    for &(initial, interval, start, end, expected) in cases {
        let bounded = BoundedRange::new(initial, interval, start, end);
        assert_eq!(
            bounded.range(),
            expected,
            "initial={initial} interval={interval} request={start}-{end}"
        );
    }
}

#[test]
fn bounded_range_iterates_aligned_chunks() {
    let bounded = BoundedRange::new(8, 10, 2, 35);
    let chunks: Vec<Range> = bounded.iter().collect();
    assert_eq!(chunks, vec![r(8, 10), r(10, 20), r(20, 30), r(30, 35)]);

    let empty = BoundedRange::new(32, 10, 2, 12);
    assert_eq!(empty.iter().count(), 0);
}

#[test]
fn segmenter_uses_absolute_indices() {
    let seg = Segmenter::new(10, 15, 42);

    assert_eq!(seg.first_index(), 1);
    assert_eq!(seg.last_index(), 4);
    assert_eq!(seg.count(), 4);

    assert_eq!(seg.range(0), None);
    assert_eq!(seg.range(1), Some(r(15, 20)));
    assert_eq!(seg.range(2), Some(r(20, 30)));
    assert_eq!(seg.range(4), Some(r(40, 42)));
    assert_eq!(seg.range(5), None);

    assert!(!seg.is_partial(2));
    assert!(seg.is_partial(4));
}

#[test]
fn segmenter_end_index_is_inclusive_of_last_block() {
    let seg = Segmenter::new(10, 0, 30);
    assert_eq!(seg.index_for_start_block(29), 2);
    assert_eq!(seg.index_for_end_block(30), 2);
    assert_eq!(seg.index_for_end_block(31), 3);
    assert_eq!(seg.last_index(), 2);
}

#[test]
fn segmenter_with_initial_block_keeps_coordinates() {
    let global = Segmenter::new(10, 0, 50);
    let module = global.with_initial_block(23);

    assert_eq!(module.first_index(), 2);
    assert_eq!(module.last_index(), global.last_index());
    assert_eq!(module.range(2), Some(r(23, 30)));
    assert_eq!(global.range(2), Some(r(20, 30)));
}

#[test]
fn empty_window_has_no_segments() {
    let seg = Segmenter::new(10, 20, 20);
    assert_eq!(seg.count(), 0);
    assert_eq!(seg.range(seg.first_index()), None);
}

#[test]
fn range_split_at_interval_boundaries() {
    assert_eq!(
        r(5, 32).split(10),
        vec![r(5, 10), r(10, 20), r(20, 30), r(30, 32)]
    );
    assert_eq!(r(10, 20).split(10), vec![r(10, 20)]);
    assert_eq!(r(10, 20).split(100), vec![r(10, 20)]);
}

#[test]
fn range_parse_and_display() {
    let range: Range = "10-20".parse().unwrap();
    assert_eq!(range, r(10, 20));
    assert_eq!(range.to_string(), "10-20");

    assert!("10".parse::<Range>().is_err());
    assert!("20-10".parse::<Range>().is_err());
    assert!("a-10".parse::<Range>().is_err());
}

#[test]
fn ranges_stay_sorted_and_detect_overlap() {
    let mut ranges = Ranges::new();
    ranges.insert(r(20, 30));
    ranges.insert(r(0, 10));
    ranges.insert(r(10, 20));

    assert_eq!(ranges.to_string(), "[0-10, 10-20, 20-30]");
    assert_eq!(ranges.find_overlap(&r(25, 35)), Some(&r(20, 30)));
    assert_eq!(ranges.find_overlap(&r(30, 40)), None);
    assert_eq!(ranges.merged().to_string(), "[0-30]");

    assert_eq!(ranges.pop_first(), Some(r(0, 10)));
    assert_eq!(ranges.len(), 2);
}
