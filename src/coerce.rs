//! Rinse - Type coercion
//!
//! Converts a column to a target type one cell at a time. A cell that does
//! not parse under the target type becomes null; the whole conversion never
//! fails because of cell contents. The number of cells lost this way is
//! returned in the [`CoercionReport`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CleanError, CleanResult};
use crate::model::{CellValue, ColumnType, Dataset};

/// Target of a type conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Numeric,
    Timestamp,
    Categorical,
}

impl TargetType {
    /// Whether a column of type `dtype` already satisfies this target.
    pub fn is_satisfied_by(self, dtype: ColumnType) -> bool {
        match self {
            TargetType::Numeric => dtype.is_numeric(),
            TargetType::Timestamp => dtype == ColumnType::Timestamp,
            TargetType::Categorical => dtype == ColumnType::Categorical,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Numeric => write!(f, "numeric"),
            TargetType::Timestamp => write!(f, "datetime"),
            TargetType::Categorical => write!(f, "categorical"),
        }
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numeric" | "number" => Ok(TargetType::Numeric),
            "datetime" | "timestamp" | "date" => Ok(TargetType::Timestamp),
            "categorical" | "category" => Ok(TargetType::Categorical),
            other => Err(format!("unknown target type: {other}")),
        }
    }
}

/// Outcome of a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoercionReport {
    pub column: String,
    pub from: ColumnType,
    pub to: ColumnType,
    /// Non-null cells that could not be converted and became null.
    pub cells_nulled: usize,
    /// False when the column already had the target type.
    pub changed: bool,
}

fn integer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[+-]?\d+$").expect("valid regex: integer literal"))
}

fn decimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$")
            .expect("valid regex: decimal literal")
    })
}

/// Parse a standard integer or decimal literal. Integers that fit in `i64`
/// stay integers; `inf`/`infinity` (any case, optional sign) are accepted.
pub fn parse_number(raw: &str) -> Option<CellValue> {
    let s = raw.trim();
    if integer_regex().is_match(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(CellValue::Integer(i));
        }
    }
    if decimal_regex().is_match(s) {
        return s.parse::<f64>().ok().map(CellValue::float);
    }
    let unsigned = s.trim_start_matches(&['+', '-'][..]);
    if unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity") {
        let v = if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        return Some(CellValue::Float(v));
    }
    None
}

/// Parse a timestamp under a chrono pattern. Date-only patterns yield
/// midnight.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    NaiveDateTime::parse_from_str(s, format).ok().or_else(|| {
        NaiveDate::parse_from_str(s, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn to_numeric(cell: &CellValue) -> CellValue {
    match cell {
        CellValue::Integer(_) | CellValue::Float(_) | CellValue::Null => cell.clone(),
        CellValue::Text(s) => parse_number(s).unwrap_or(CellValue::Null),
        CellValue::Timestamp(ts) => ts
            .and_utc()
            .timestamp_nanos_opt()
            .map(CellValue::Integer)
            .unwrap_or(CellValue::Null),
    }
}

fn to_timestamp(cell: &CellValue, format: &str) -> CellValue {
    match cell {
        CellValue::Timestamp(_) | CellValue::Null => cell.clone(),
        other => parse_timestamp(&other.render(), format)
            .map(CellValue::Timestamp)
            .unwrap_or(CellValue::Null),
    }
}

/// Pick the numeric dtype for converted values and make the cells uniform:
/// Integer only when every cell is a non-null integer, otherwise Float.
pub(crate) fn settle_numeric(values: &mut [CellValue]) -> ColumnType {
    if values.iter().all(|v| matches!(v, CellValue::Integer(_))) {
        return ColumnType::Integer;
    }
    for v in values.iter_mut() {
        if let CellValue::Integer(i) = v {
            *v = CellValue::Float(*i as f64);
        }
    }
    ColumnType::Float
}

/// Convert `column` to `target` in place.
///
/// Numeric conversion accepts decimal/integer literals, Timestamp
/// conversion uses `timestamp_format`, Categorical only changes the dtype.
/// Requesting the type a column already has is a reported no-op.
pub fn coerce(
    dataset: &mut Dataset,
    column: &str,
    target: TargetType,
    timestamp_format: &str,
) -> CleanResult<CoercionReport> {
    let col = dataset
        .column_mut(column)
        .ok_or_else(|| CleanError::NotFound(column.to_string()))?;
    let from = col.dtype;

    if target.is_satisfied_by(from) {
        return Ok(CoercionReport {
            column: column.to_string(),
            from,
            to: from,
            cells_nulled: 0,
            changed: false,
        });
    }

    let nulls_before = col.null_count();
    let to = match target {
        TargetType::Numeric => {
            let mut values: Vec<CellValue> = col.values.iter().map(to_numeric).collect();
            let dtype = settle_numeric(&mut values);
            col.values = values;
            dtype
        }
        TargetType::Timestamp => {
            col.values = col
                .values
                .iter()
                .map(|v| to_timestamp(v, timestamp_format))
                .collect();
            ColumnType::Timestamp
        }
        TargetType::Categorical => ColumnType::Categorical,
    };
    col.dtype = to;
    let cells_nulled = col.null_count() - nulls_before;

    debug!(column, %from, %to, cells_nulled, "coerced column");

    Ok(CoercionReport {
        column: column.to_string(),
        from,
        to,
        cells_nulled,
        changed: true,
    })
}
