use crate::etl::extractor::SwapExtractor;
use crate::graph::models::RawPairRef;
use crate::tests::helpers::{raw_swap, raw_transaction, PAIR_A};

#[test]
fn replayed_page_yields_no_duplicates() {
    let mut extractor = SwapExtractor::new(100);
    let page = vec![
        raw_transaction(100, 1, vec![raw_swap(1, 0, PAIR_A, true, 5)]),
        raw_transaction(101, 2, vec![raw_swap(2, 0, PAIR_A, false, 3)]),
    ];

    let first = extractor.parse_page(&page);
    assert_eq!(first.len(), 2);
    assert_eq!(extractor.next_block(), Some(102));

    // The boundary block gets re-fetched; nothing may come out twice.
    let second = extractor.parse_page(&page);
    assert!(second.is_empty());
}

#[test]
fn full_page_excludes_possibly_incomplete_last_block() {
    let mut extractor = SwapExtractor::new(3);
    let page = vec![
        raw_transaction(10, 1, vec![raw_swap(1, 0, PAIR_A, true, 1)]),
        raw_transaction(11, 2, vec![raw_swap(2, 0, PAIR_A, true, 1)]),
        raw_transaction(12, 3, vec![raw_swap(3, 0, PAIR_A, true, 1)]),
    ];

    let rows = extractor.parse_page(&page);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.block_number < 12));
    // Next fetch starts at the excluded block.
    assert_eq!(extractor.next_block(), Some(12));

    // The re-fetch covers block 12 in full this time.
    let next_page = vec![
        raw_transaction(12, 3, vec![raw_swap(3, 0, PAIR_A, true, 1)]),
        raw_transaction(13, 4, vec![raw_swap(4, 0, PAIR_A, true, 1)]),
    ];
    let rows = extractor.parse_page(&next_page);
    assert_eq!(rows.len(), 2);
    assert_eq!(extractor.next_block(), Some(14));
}

#[test]
fn short_page_keeps_every_block() {
    let mut extractor = SwapExtractor::new(100);
    let page = vec![raw_transaction(10, 1, vec![raw_swap(1, 0, PAIR_A, true, 1)])];
    let rows = extractor.parse_page(&page);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].block_number, 10);
}

#[test]
fn invalid_signs_are_dropped() {
    let mut extractor = SwapExtractor::new(100);
    // Both sides flowing in at once.
    let mut bad = raw_swap(1, 0, PAIR_A, true, 5);
    bad.amount1_in = "2".to_string();
    let page = vec![raw_transaction(100, 1, vec![bad, raw_swap(1, 1, PAIR_A, true, 5)])];

    let rows = extractor.parse_page(&page);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].swap_number, 1);
}

#[test]
fn unparseable_swap_id_is_dropped() {
    let mut extractor = SwapExtractor::new(100);
    let mut swap = raw_swap(1, 0, PAIR_A, true, 5);
    swap.id = "no-composite-number".to_string();
    let page = vec![raw_transaction(100, 1, vec![swap])];
    assert!(extractor.parse_page(&page).is_empty());
}

#[test]
fn unparseable_amounts_are_dropped() {
    let mut extractor = SwapExtractor::new(100);
    let mut swap = raw_swap(1, 0, PAIR_A, true, 5);
    swap.amount_usd = "not-a-number".to_string();
    let page = vec![raw_transaction(100, 1, vec![swap])];
    assert!(extractor.parse_page(&page).is_empty());
}

#[test]
fn pair_id_is_normalized_to_lowercase() {
    let mut extractor = SwapExtractor::new(100);
    let mut swap = raw_swap(1, 0, PAIR_A, true, 5);
    swap.pair = RawPairRef {
        id: PAIR_A.to_uppercase().replace("0X", "0x"),
    };
    let page = vec![raw_transaction(100, 1, vec![swap])];
    let rows = extractor.parse_page(&page);
    assert_eq!(rows[0].pair_id, PAIR_A);
}

#[test]
fn no_data_means_no_cursor() {
    let mut extractor = SwapExtractor::new(100);
    assert!(extractor.next_block().is_none());
    assert!(extractor.parse_page(&[]).is_empty());
    assert!(extractor.next_block().is_none());
}
