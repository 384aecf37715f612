//! Rinse - In-memory tabular model
//!
//! A [`Dataset`] is an ordered list of equally long, typed [`Column`]s.
//! Column names are unique at all times; every mutating helper keeps the
//! row-count invariant across columns.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CleanError, CleanResult};

/// Logical type of a column, mirroring the pandas dtypes the cleaning
/// operations care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers without missing values (pandas `int64`).
    Integer,
    /// Any numeric column, including ones with missing values (`float64`).
    Float,
    /// Free text (`object`).
    Text,
    /// Date/time values (`datetime64[ns]`).
    Timestamp,
    /// A finite label set over the existing values (`category`).
    Categorical,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// The pandas dtype name shown in overviews.
    pub fn label(self) -> &'static str {
        match self {
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
            ColumnType::Text => "object",
            ColumnType::Timestamp => "datetime64[ns]",
            ColumnType::Categorical => "category",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single cell.
#[derive(Debug, Clone)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Wrap a float, mapping NaN to `Null` so NaN is never stored.
    pub fn float(v: f64) -> Self {
        if v.is_nan() {
            CellValue::Null
        } else {
            CellValue::Float(v)
        }
    }

    /// Canonical text form used for exports and for re-parsing a cell under
    /// a different type. `Null` renders as the empty string.
    pub fn render(&self) -> String {
        match self {
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(v) => format_float(*v),
            CellValue::Text(s) => s.clone(),
            CellValue::Timestamp(ts) => format_timestamp(ts, TimePrecision::of(ts)),
            CellValue::Null => String::new(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Integer(_) => 1,
            CellValue::Float(_) => 2,
            CellValue::Text(_) => 3,
            CellValue::Timestamp(_) => 4,
        }
    }
}

// Structural equality: Null == Null, and 0.0 == -0.0. Used by duplicate
// detection and by the mode fill.
impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Integer(a), CellValue::Integer(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => a == b,
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(v) => {
                let v = if *v == 0.0 { 0.0f64 } else { *v };
                v.to_bits().hash(state)
            }
            CellValue::Text(s) => s.hash(state),
            CellValue::Timestamp(ts) => ts.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("<null>"),
            other => f.write_str(&other.render()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Integer(i) => serializer.serialize_i64(*i),
            CellValue::Float(v) => serializer.serialize_f64(*v),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Timestamp(ts) => serializer.serialize_str(&ts.to_string()),
            CellValue::Null => serializer.serialize_none(),
        }
    }
}

/// Shortest round-trip form, always with a fractional part for integral
/// values (`30.0`, `0.1`, `1e-7`).
pub fn format_float(v: f64) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    format!("{v:?}")
}

/// How much of a timestamp has to be written for it to survive a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimePrecision {
    /// Midnight: the date alone.
    Date,
    Seconds,
    /// Non-zero fractional seconds.
    Subsecond,
}

impl TimePrecision {
    pub fn of(ts: &NaiveDateTime) -> Self {
        if ts.nanosecond() != 0 {
            TimePrecision::Subsecond
        } else if ts.hour() == 0 && ts.minute() == 0 && ts.second() == 0 {
            TimePrecision::Date
        } else {
            TimePrecision::Seconds
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            TimePrecision::Date => "%Y-%m-%d",
            TimePrecision::Seconds => "%Y-%m-%d %H:%M:%S",
            TimePrecision::Subsecond => "%Y-%m-%d %H:%M:%S%.f",
        }
    }
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime, precision: TimePrecision) -> String {
    ts.format(precision.pattern()).to_string()
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: ColumnType, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    pub fn has_nulls(&self) -> bool {
        self.values.iter().any(CellValue::is_null)
    }

    /// Distinct non-null values in first-occurrence order. For a
    /// categorical column this is its label set.
    pub fn categories(&self) -> Vec<CellValue> {
        let mut seen = std::collections::HashSet::new();
        self.values
            .iter()
            .filter(|v| !v.is_null() && seen.insert(*v))
            .cloned()
            .collect()
    }

    /// Render one cell the way the exporter writes it. Every timestamp in
    /// a column is written at the column's [`Column::time_precision`].
    pub fn render_cell(&self, row: usize, precision: TimePrecision) -> String {
        match &self.values[row] {
            CellValue::Timestamp(ts) => format_timestamp(ts, precision),
            other => other.render(),
        }
    }

    /// Finest precision any timestamp in the column needs.
    pub fn time_precision(&self) -> TimePrecision {
        self.values
            .iter()
            .filter_map(|v| match v {
                CellValue::Timestamp(ts) => Some(TimePrecision::of(ts)),
                _ => None,
            })
            .max()
            .unwrap_or(TimePrecision::Date)
    }
}

/// The loaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset, checking equal column lengths and unique names.
    pub fn new(columns: Vec<Column>) -> CleanResult<Self> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(CleanError::RaggedColumn {
                column: bad.name.clone(),
                len: bad.values.len(),
                expected: row_count,
            });
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CleanError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`, like `DataFrame.shape`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Clone of one row's cells in column order.
    pub fn row(&self, index: usize) -> Vec<CellValue> {
        self.columns.iter().map(|c| c.values[index].clone()).collect()
    }

    /// Whether row `index` has a null in any column.
    pub fn row_has_null(&self, index: usize) -> bool {
        self.columns.iter().any(|c| c.values[index].is_null())
    }

    /// Whether rows `a` and `b` are equal in every column.
    pub fn rows_equal(&self, a: usize, b: usize) -> bool {
        self.columns.iter().all(|c| c.values[a] == c.values[b])
    }

    /// Keep rows whose `keep[i]` is true, preserving order.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.row_count);
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.values.retain(|_| *flags.next().unwrap_or(&true));
        }
        self.row_count = keep.iter().filter(|k| **k).count();
    }

    /// Keep columns whose `keep[i]` is true, preserving order. The row
    /// count is unchanged even when no column survives.
    pub fn retain_columns(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.columns.len());
        let mut flags = keep.iter();
        self.columns.retain(|_| *flags.next().unwrap_or(&true));
    }

    /// Assign names by position. Callers validate length and uniqueness.
    pub(crate) fn set_column_names(&mut self, names: &[String]) {
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name.clone();
        }
    }

    /// First `n` rows, cells rendered for display.
    pub fn preview(&self, n: usize) -> Vec<Vec<String>> {
        let precision: Vec<TimePrecision> =
            self.columns.iter().map(Column::time_precision).collect();
        (0..self.row_count.min(n))
            .map(|row| {
                self.columns
                    .iter()
                    .zip(&precision)
                    .map(|(c, p)| c.render_cell(row, *p))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new(
                "name",
                ColumnType::Text,
                vec![
                    CellValue::Text("a".into()),
                    CellValue::Null,
                    CellValue::Text("c".into()),
                ],
            ),
            Column::new(
                "n",
                ColumnType::Integer,
                vec![CellValue::Integer(1), CellValue::Integer(2), CellValue::Integer(3)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_null_equals_null() {
        assert_eq!(CellValue::Null, CellValue::Null);
        assert_eq!(CellValue::Float(0.0), CellValue::Float(-0.0));
        assert_ne!(CellValue::Integer(1), CellValue::Float(1.0));
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(30.0), "30.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_nan_becomes_null() {
        assert!(CellValue::float(f64::NAN).is_null());
        assert_eq!(CellValue::float(1.5), CellValue::Float(1.5));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = Dataset::new(vec![
            Column::new("a", ColumnType::Integer, vec![CellValue::Integer(1)]),
            Column::new("a", ColumnType::Integer, vec![CellValue::Integer(2)]),
        ]);
        assert!(matches!(result, Err(CleanError::DuplicateColumn(_))));
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let result = Dataset::new(vec![
            Column::new("a", ColumnType::Integer, vec![CellValue::Integer(1)]),
            Column::new("b", ColumnType::Integer, vec![]),
        ]);
        assert!(matches!(result, Err(CleanError::RaggedColumn { .. })));
    }

    #[test]
    fn test_retain_rows_keeps_order() {
        let mut ds = sample();
        ds.retain_rows(&[true, false, true]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.row(0)[0], CellValue::Text("a".into()));
        assert_eq!(ds.row(1)[0], CellValue::Text("c".into()));
        assert_eq!(ds.row(1)[1], CellValue::Integer(3));
    }

    #[test]
    fn test_retain_all_columns_removed() {
        let mut ds = sample();
        ds.retain_columns(&[false, false]);
        assert_eq!(ds.shape(), (3, 0));
    }

    #[test]
    fn test_categories_first_occurrence_order() {
        let col = Column::new(
            "c",
            ColumnType::Categorical,
            vec![
                CellValue::Text("b".into()),
                CellValue::Null,
                CellValue::Text("a".into()),
                CellValue::Text("b".into()),
            ],
        );
        assert_eq!(
            col.categories(),
            vec![CellValue::Text("b".into()), CellValue::Text("a".into())]
        );
    }

    #[test]
    fn test_time_precision_is_finest_in_column() {
        let date = |h, ns| {
            chrono::NaiveDate::from_ymd_opt(2023, 2, 1)
                .and_then(|d| d.and_hms_nano_opt(h, 0, 0, ns))
                .map(CellValue::Timestamp)
                .unwrap()
        };
        let col = Column::new("t", ColumnType::Timestamp, vec![date(0, 0), CellValue::Null]);
        assert_eq!(col.time_precision(), TimePrecision::Date);

        let col = Column::new("t", ColumnType::Timestamp, vec![date(0, 0), date(10, 0)]);
        assert_eq!(col.time_precision(), TimePrecision::Seconds);
        assert_eq!(col.render_cell(0, col.time_precision()), "2023-02-01 00:00:00");

        let col = Column::new(
            "t",
            ColumnType::Timestamp,
            vec![date(10, 0), date(10, 500_000_000)],
        );
        assert_eq!(col.time_precision(), TimePrecision::Subsecond);
        assert_eq!(col.render_cell(1, col.time_precision()), "2023-02-01 10:00:00.500");
    }

    #[test]
    fn test_preview_limits_rows() {
        let ds = sample();
        let preview = ds.preview(2);
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[1], vec!["".to_string(), "2".to_string()]);
    }
}
