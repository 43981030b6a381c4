//! End-to-end read path tests: chunks in, one merged stream out.

use corsac::{Chunk, Cursor, CursorPlanner, Record, StoreError};

fn chunk_from(times_values: &[(u64, f64)]) -> Chunk {
    let mut it = times_values.iter();
    let &(t0, v0) = it.next().expect("chunk needs at least one record");
    let mut chunk = Chunk::create(1024, Record::new(7, t0, 0, v0));
    for &(t, v) in it {
        chunk.append(Record::new(7, t, 0, v)).unwrap();
    }
    chunk.close();
    chunk
}

fn drain(mut cursor: Cursor) -> Vec<Record> {
    let mut out = Vec::new();
    while let Some(r) = cursor.read_next() {
        out.push(r);
    }
    out
}

#[test]
fn test_overlapping_chunks_merge_with_first_wins() {
    // Both chunks carry t=7; the planner merges them and the reader built
    // from the earlier chunk wins the tie.
    let a = chunk_from(&[(1, 0.1), (2, 0.2), (4, 0.4), (7, 0.7)]);
    let b = chunk_from(&[(3, 1.3), (5, 1.5), (6, 1.6), (7, 1.7)]);

    let plan = CursorPlanner::plan(vec![
        a.get_reader().unwrap(),
        b.get_reader().unwrap(),
    ])
    .unwrap();
    assert!(matches!(plan, Cursor::Merge(_)));

    let records = drain(plan);
    assert_eq!(
        records.iter().map(|r| r.time).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6, 7]
    );
    assert_eq!(records[6].value, 0.7);
}

#[test]
fn test_disjoint_chunks_chain_without_merging() {
    let a = chunk_from(&[(100, 1.0), (110, 1.1)]);
    let b = chunk_from(&[(10, 2.0), (20, 2.1)]);
    let c = chunk_from(&[(500, 3.0), (510, 3.1)]);

    let plan = CursorPlanner::plan(vec![
        a.get_reader().unwrap(),
        b.get_reader().unwrap(),
        c.get_reader().unwrap(),
    ])
    .unwrap();
    assert!(matches!(plan, Cursor::Linear(_)));

    let times: Vec<u64> = drain(plan).iter().map(|r| r.time).collect();
    assert_eq!(times, vec![10, 20, 100, 110, 500, 510]);
}

#[test]
fn test_mixed_plan_merges_only_overlapping_groups() {
    let a = chunk_from(&[(1, 0.0), (10, 0.0)]);
    let b = chunk_from(&[(5, 0.0), (12, 0.0)]); // overlaps a
    let c = chunk_from(&[(100, 0.0), (110, 0.0)]); // disjoint

    let plan = CursorPlanner::plan(vec![
        a.get_reader().unwrap(),
        b.get_reader().unwrap(),
        c.get_reader().unwrap(),
    ])
    .unwrap();

    let times: Vec<u64> = drain(plan).iter().map(|r| r.time).collect();
    assert_eq!(times, vec![1, 5, 10, 12, 100, 110]);
}

#[test]
fn test_plan_of_nothing_fails() {
    assert!(matches!(
        CursorPlanner::plan(Vec::new()),
        Err(StoreError::EmptyPlan)
    ));
}

#[test]
fn test_merged_stream_is_strictly_increasing() {
    // Three interleaved chunks over the same window: the merged stream must
    // be strictly increasing with each timestamp emitted once.
    let a: Vec<(u64, f64)> = (0..50).map(|i| (i * 3, 0.0)).collect();
    let b: Vec<(u64, f64)> = (0..50).map(|i| (i * 3 + 1, 1.0)).collect();
    let c: Vec<(u64, f64)> = (0..50).map(|i| (i * 3 + 2, 2.0)).collect();

    let chunks = [chunk_from(&a), chunk_from(&b), chunk_from(&c)];
    let readers = chunks
        .iter()
        .map(|ch| ch.get_reader().unwrap())
        .collect::<Vec<_>>();

    let records = drain(CursorPlanner::plan(readers).unwrap());
    assert_eq!(records.len(), 150);
    assert!(records.windows(2).all(|w| w[0].time < w[1].time));
}

#[test]
fn test_count_tracks_remaining_records() {
    let a = chunk_from(&[(1, 0.0), (2, 0.0), (3, 0.0)]);
    let mut cursor = a.get_reader().unwrap();
    assert_eq!(cursor.count(), 3);
    cursor.read_next();
    assert_eq!(cursor.count(), 2);
    drain(cursor);
}
