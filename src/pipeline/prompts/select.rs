use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::ChatRow;

/// Keep rows tagged with `source` (all rows when `None`).
pub fn filter_source(rows: Vec<ChatRow>, source: Option<&str>) -> Vec<ChatRow> {
    match source {
        None => rows,
        Some(want) => rows.into_iter().filter(|r| r.source.as_deref() == Some(want)).collect(),
    }
}

/// Seeded shuffle + truncate when there are more rows than `sample_size`;
/// otherwise rows are returned untouched, in input order.
pub fn sample_rows(mut rows: Vec<ChatRow>, sample_size: usize, seed: u64) -> Vec<ChatRow> {
    if sample_size >= rows.len() { return rows; }
    let mut rng = StdRng::seed_from_u64(seed);
    rows.shuffle(&mut rng);
    rows.truncate(sample_size);
    rows
}
