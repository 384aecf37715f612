//! Rinse - Duplicate row detection
//!
//! Two rows are duplicates when every column holds an equal value (two nulls
//! are equal). The first row of each group is kept; later copies are
//! flagged and can be removed without reordering the survivors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │   Dataset   │────▶│  rayon par   │────▶│  row hash     │
//! │  (columns)  │     │  per row     │     │  (FNV-1a 64)  │
//! └─────────────┘     └──────────────┘     └───────┬───────┘
//!                                                   │
//!                      ┌──────────────┐     ┌───────▼───────┐
//!                      │   BitMask    │◀────│ first-seen    │
//!                      │ (duplicates) │     │ index + verify│
//!                      └──────────────┘     └───────────────┘
//! ```
//!
//! Phase 1 hashes rows in parallel. Phase 2 is sequential so the first
//! occurrence always wins, and every hash hit is confirmed by comparing the
//! rows cell by cell, so a hash collision can never drop a distinct row.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::data::{fnv1a, FNV_OFFSET};
use crate::model::Dataset;

// ─── BitMask ────────────────────────────────────────────────────────────────

/// Compact per-row flag set, 64 rows per word.
pub struct BitMask {
    words: Vec<u64>,
    len: usize,
}

impl BitMask {
    /// Create a new bitmask with all bits cleared.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64)],
            len,
        }
    }

    #[inline(always)]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    /// Out-of-range indices read as unset.
    #[inline(always)]
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.words[index >> 6] & (1u64 << (index & 63)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Keep-mask for [`Dataset::retain_rows`]: true where the bit is clear.
    pub fn to_keep_mask(&self) -> Vec<bool> {
        (0..self.len).map(|i| !self.get(i)).collect()
    }
}

// ─── Row hashing ────────────────────────────────────────────────────────────

/// `std::hash::Hasher` over FNV-1a, so cells hash through their `Hash` impl.
struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        Self(FNV_OFFSET)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0 = fnv1a(self.0, bytes);
    }
}

fn row_hash(dataset: &Dataset, row: usize) -> u64 {
    let mut hasher = FnvHasher::default();
    for column in dataset.columns() {
        column.values[row].hash(&mut hasher);
    }
    hasher.finish()
}

// ─── Scan ───────────────────────────────────────────────────────────────────

/// Full result of a duplicate scan.
pub struct DedupResult {
    /// Bit `i` is set if row `i` repeats an earlier row.
    pub duplicates: BitMask,
    /// Maps each row to the first row equal to it; `canonical_map[i] == i`
    /// for rows that are kept.
    pub canonical_map: Vec<usize>,
    pub total_rows: usize,
    pub duplicate_count: usize,
    pub elapsed_us: u64,
}

impl DedupResult {
    pub fn unique_count(&self) -> usize {
        self.total_rows - self.duplicate_count
    }

    pub fn is_duplicate(&self, row: usize) -> bool {
        self.duplicates.get(row)
    }
}

/// Outcome of removing duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub rows_before: usize,
    pub rows_removed: usize,
    pub rows_after: usize,
}

/// Flag every row that repeats an earlier row.
pub fn scan(dataset: &Dataset) -> DedupResult {
    let start = std::time::Instant::now();
    let row_count = dataset.row_count();

    // A zero-column table has no values to tell rows apart; pandas treats
    // such rows as distinct, and so do we.
    if row_count == 0 || dataset.column_count() == 0 {
        return DedupResult {
            duplicates: BitMask::new(row_count),
            canonical_map: (0..row_count).collect(),
            total_rows: row_count,
            duplicate_count: 0,
            elapsed_us: 0,
        };
    }

    // ── Phase 1: parallel row hashing ─────────────────────────────────
    let hashes: Vec<u64> = (0..row_count)
        .into_par_iter()
        .map(|row| row_hash(dataset, row))
        .collect();

    // ── Phase 2: first-seen index ─────────────────────────────────────
    let (duplicates, canonical_map) = first_seen(dataset, &hashes);

    let duplicate_count = duplicates.count_ones();
    let elapsed_us = start.elapsed().as_micros() as u64;
    debug!(rows = row_count, duplicate_count, elapsed_us, "duplicate scan");

    DedupResult {
        duplicates,
        canonical_map,
        total_rows: row_count,
        duplicate_count,
        elapsed_us,
    }
}

/// Walk rows in order, flagging each row equal to an earlier one. Rows that
/// share a hash are compared cell by cell before being flagged.
fn first_seen(dataset: &Dataset, hashes: &[u64]) -> (BitMask, Vec<usize>) {
    let mut duplicates = BitMask::new(hashes.len());
    let mut canonical_map: Vec<usize> = (0..hashes.len()).collect();
    // hash → kept rows with that hash (more than one only on collision)
    let mut seen: HashMap<u64, Vec<usize>> = HashMap::with_capacity(hashes.len());

    for (row, hash) in hashes.iter().enumerate() {
        let bucket = seen.entry(*hash).or_default();
        let existing = bucket
            .iter()
            .copied()
            .find(|&kept| dataset.rows_equal(kept, row));
        match existing {
            Some(kept) => {
                duplicates.set(row);
                canonical_map[row] = kept;
            }
            None => bucket.push(row),
        }
    }

    (duplicates, canonical_map)
}

/// Number of rows that repeat an earlier row.
pub fn count_duplicates(dataset: &Dataset) -> usize {
    scan(dataset).duplicate_count
}

/// Drop every repeated row, keeping first occurrences in their original
/// order. Running it again removes nothing.
pub fn remove_duplicates(dataset: &mut Dataset) -> RemovalReport {
    let rows_before = dataset.row_count();
    let result = scan(dataset);
    if result.duplicate_count > 0 {
        dataset.retain_rows(&result.duplicates.to_keep_mask());
    }
    RemovalReport {
        rows_before,
        rows_removed: result.duplicate_count,
        rows_after: dataset.row_count(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanConfig;
    use crate::loader::load;
    use crate::model::{CellValue, Column, ColumnType};
    use proptest::prelude::*;

    fn load_str(s: &str) -> Dataset {
        load(s.as_bytes(), &CleanConfig::default()).unwrap()
    }

    #[test]
    fn test_bitmask_basic() {
        let mut bm = BitMask::new(128);
        bm.set(0);
        bm.set(63);
        bm.set(64);
        bm.set(127);

        assert!(bm.get(0));
        assert!(bm.get(64));
        assert!(!bm.get(1));
        assert!(!bm.get(500));
        assert_eq!(bm.count_ones(), 4);
        assert_eq!(bm.len(), 128);
    }

    #[test]
    fn test_keep_mask() {
        let mut bm = BitMask::new(3);
        bm.set(1);
        assert_eq!(bm.to_keep_mask(), vec![true, false, true]);
    }

    #[test]
    fn test_scan_maps_to_first_occurrence() {
        let ds = load_str("k,v\na,1\nb,2\na,1\na,1\nb,3\n");
        let result = scan(&ds);

        assert_eq!(result.duplicate_count, 2);
        assert_eq!(result.unique_count(), 3);
        assert!(result.is_duplicate(2));
        assert!(result.is_duplicate(3));
        assert!(!result.is_duplicate(4));
        assert_eq!(result.canonical_map, vec![0, 1, 0, 0, 4]);
    }

    #[test]
    fn test_null_equals_null() {
        let ds = load_str("Name,Age\nBob,\nBob,\nBob,4\n");
        assert_eq!(count_duplicates(&ds), 1);
    }

    #[test]
    fn test_scenario_alice_bob() {
        let mut ds = load_str("Name,Age\nAlice,30\nBob,\nAlice,30\n");
        assert_eq!(count_duplicates(&ds), 1);

        let report = remove_duplicates(&mut ds);
        assert_eq!(
            report,
            RemovalReport {
                rows_before: 3,
                rows_removed: 1,
                rows_after: 2
            }
        );
        assert_eq!(ds.row(0), vec![CellValue::Text("Alice".into()), CellValue::Float(30.0)]);
        assert_eq!(ds.row(1), vec![CellValue::Text("Bob".into()), CellValue::Null]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut once = load_str("a,b\n1,x\n2,y\n1,x\n3,z\n2,y\n");
        remove_duplicates(&mut once);

        let mut twice = once.clone();
        let report = remove_duplicates(&mut twice);
        assert_eq!(report.rows_removed, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_survivors_keep_order() {
        let mut ds = load_str("x\n3\n1\n3\n2\n1\n");
        remove_duplicates(&mut ds);
        assert_eq!(
            ds.column("x").unwrap().values,
            vec![CellValue::Integer(3), CellValue::Integer(1), CellValue::Integer(2)]
        );
    }

    #[test]
    fn test_colliding_hashes_keep_distinct_rows() {
        let ds = load_str("k\na\nb\na\nc\n");
        // Every row lands in the same bucket
        let (duplicates, canonical_map) = first_seen(&ds, &[7, 7, 7, 7]);

        assert_eq!(duplicates.count_ones(), 1);
        assert!(duplicates.get(2));
        assert!(!duplicates.get(1));
        assert!(!duplicates.get(3));
        assert_eq!(canonical_map, vec![0, 1, 0, 3]);
    }

    #[test]
    fn test_zero_columns_has_no_duplicates() {
        let mut ds = load_str("a\n1\n1\n");
        ds.retain_columns(&[false]);
        assert_eq!(count_duplicates(&ds), 0);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Property-based tests
    // ─────────────────────────────────────────────────────────────────────

    /// Small value ranges so random tables contain plenty of repeats.
    fn repetitive_table() -> impl Strategy<Value = Dataset> {
        let row = (
            prop::option::of(0i64..3),
            prop::option::of(prop::sample::select(vec!["x", "y"])),
        );
        prop::collection::vec(row, 0..40).prop_map(|rows| {
            let (numbers, labels): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
            let numbers = numbers
                .into_iter()
                .map(|n| n.map(|v| CellValue::Float(v as f64)).unwrap_or(CellValue::Null))
                .collect();
            let labels = labels
                .into_iter()
                .map(|l| l.map(|s: &str| CellValue::Text(s.into())).unwrap_or(CellValue::Null))
                .collect();
            Dataset::new(vec![
                Column::new("n", ColumnType::Float, numbers),
                Column::new("label", ColumnType::Text, labels),
            ])
            .unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_remove_duplicates_is_idempotent(ds in repetitive_table()) {
            let mut once = ds.clone();
            let first = remove_duplicates(&mut once);
            prop_assert_eq!(first.rows_after + first.rows_removed, ds.row_count());

            let mut twice = once.clone();
            let second = remove_duplicates(&mut twice);
            prop_assert_eq!(second.rows_removed, 0);
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(count_duplicates(&once), 0);
        }

        #[test]
        fn prop_survivors_are_first_occurrences(ds in repetitive_table()) {
            let result = scan(&ds);
            for row in 0..ds.row_count() {
                let canonical = result.canonical_map[row];
                prop_assert!(canonical <= row);
                prop_assert!(ds.rows_equal(canonical, row));
                prop_assert_eq!(result.is_duplicate(row), canonical != row);
            }
        }
    }
}
