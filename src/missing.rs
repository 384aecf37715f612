//! Rinse - Missing value handling
//!
//! Reports where nulls are, drops the columns or rows that contain them, or
//! fills one column with a [`FillStrategy`]. Every fill derives its value
//! from the column as it was before the fill started.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CleanError, CleanResult};
use crate::model::{CellValue, ColumnType, Dataset};

/// How to replace nulls in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    Zero,
    Mean,
    Median,
    /// Most frequent value; ties go to the value seen first.
    Mode,
    ForwardFill,
    BackwardFill,
}

impl FillStrategy {
    /// Zero, mean and median only make sense on numeric columns.
    pub fn requires_numeric(self) -> bool {
        matches!(self, FillStrategy::Zero | FillStrategy::Mean | FillStrategy::Median)
    }
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillStrategy::Zero => write!(f, "zero"),
            FillStrategy::Mean => write!(f, "mean"),
            FillStrategy::Median => write!(f, "median"),
            FillStrategy::Mode => write!(f, "mode"),
            FillStrategy::ForwardFill => write!(f, "forward"),
            FillStrategy::BackwardFill => write!(f, "backward"),
        }
    }
}

impl FromStr for FillStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero" | "zeros" => Ok(FillStrategy::Zero),
            "mean" => Ok(FillStrategy::Mean),
            "median" => Ok(FillStrategy::Median),
            "mode" => Ok(FillStrategy::Mode),
            "ffill" | "forward" | "forward_fill" => Ok(FillStrategy::ForwardFill),
            "bfill" | "backward" | "backward_fill" => Ok(FillStrategy::BackwardFill),
            other => Err(format!("unknown fill strategy: {other}")),
        }
    }
}

/// Null count for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillReport {
    pub column: String,
    pub strategy: FillStrategy,
    pub cells_filled: usize,
    /// The constant written into the gaps, for zero/mean/median/mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<CellValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDropReport {
    pub removed: Vec<String>,
    pub columns_after: usize,
    /// Positional keep-mask, used to shrink the name set in step.
    #[serde(skip)]
    pub kept: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDropReport {
    pub rows_before: usize,
    pub rows_removed: usize,
    pub rows_after: usize,
}

/// Null count per column, in column order.
pub fn missing_counts(dataset: &Dataset) -> Vec<MissingCount> {
    dataset
        .columns()
        .iter()
        .map(|c| MissingCount {
            column: c.name.clone(),
            missing: c.null_count(),
        })
        .collect()
}

/// Names of the columns holding at least one null.
pub fn columns_with_missing(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| c.has_nulls())
        .map(|c| c.name.clone())
        .collect()
}

/// Remove every column with a null. Removing all columns is allowed.
pub fn drop_columns_with_missing(dataset: &mut Dataset) -> ColumnDropReport {
    let kept: Vec<bool> = dataset.columns().iter().map(|c| !c.has_nulls()).collect();
    let removed: Vec<String> = dataset
        .columns()
        .iter()
        .zip(&kept)
        .filter(|(_, keep)| !**keep)
        .map(|(c, _)| c.name.clone())
        .collect();

    if !removed.is_empty() {
        dataset.retain_columns(&kept);
    }
    ColumnDropReport {
        removed,
        columns_after: dataset.column_count(),
        kept,
    }
}

/// Remove every row with a null in any column, keeping the order of the rest.
pub fn drop_rows_with_missing(dataset: &mut Dataset) -> RowDropReport {
    let rows_before = dataset.row_count();
    let keep: Vec<bool> = (0..rows_before).map(|i| !dataset.row_has_null(i)).collect();
    let rows_removed = keep.iter().filter(|k| !**k).count();

    if rows_removed > 0 {
        dataset.retain_rows(&keep);
    }
    RowDropReport {
        rows_before,
        rows_removed,
        rows_after: dataset.row_count(),
    }
}

fn numeric_values(values: &[CellValue]) -> Vec<f64> {
    values.iter().filter_map(CellValue::as_f64).collect()
}

fn mean(values: &[CellValue]) -> Option<f64> {
    let nums = numeric_values(values);
    if nums.is_empty() {
        return None;
    }
    Some(nums.iter().sum::<f64>() / nums.len() as f64)
}

fn median(values: &[CellValue]) -> Option<f64> {
    let mut nums = numeric_values(values);
    if nums.is_empty() {
        return None;
    }
    nums.sort_by(f64::total_cmp);
    let mid = nums.len() / 2;
    if nums.len() % 2 == 0 {
        Some((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Some(nums[mid])
    }
}

/// Most frequent non-null value. Among equally frequent values the one
/// whose first occurrence comes earliest wins.
fn mode(values: &[CellValue]) -> Option<CellValue> {
    let mut counts: HashMap<&CellValue, usize> = HashMap::new();
    let mut order: Vec<&CellValue> = Vec::new();
    for v in values.iter().filter(|v| !v.is_null()) {
        let count = counts.entry(v).or_insert(0);
        if *count == 0 {
            order.push(v);
        }
        *count += 1;
    }

    let max = counts.values().copied().max()?;
    order
        .into_iter()
        .find(|v| counts.get(v) == Some(&max))
        .cloned()
}

fn fill_constant(values: &mut [CellValue], fill: &CellValue) {
    for v in values.iter_mut().filter(|v| v.is_null()) {
        *v = fill.clone();
    }
}

fn forward_fill<'a>(values: impl Iterator<Item = &'a mut CellValue>) {
    let mut last: Option<CellValue> = None;
    for v in values {
        if v.is_null() {
            if let Some(prev) = &last {
                *v = prev.clone();
            }
        } else {
            last = Some(v.clone());
        }
    }
}

/// Replace the nulls of `column` according to `strategy`.
pub fn fill_column(
    dataset: &mut Dataset,
    column: &str,
    strategy: FillStrategy,
) -> CleanResult<FillReport> {
    let col = dataset
        .column_mut(column)
        .ok_or_else(|| CleanError::NotFound(column.to_string()))?;

    if strategy.requires_numeric() && !col.dtype.is_numeric() {
        return Err(CleanError::TypeMismatch {
            column: column.to_string(),
            dtype: col.dtype,
            strategy: strategy.to_string(),
        });
    }

    let nulls_before = col.null_count();
    let mut fill_value = None;

    if nulls_before > 0 {
        let constant = match strategy {
            FillStrategy::Zero => Some(match col.dtype {
                ColumnType::Integer => CellValue::Integer(0),
                _ => CellValue::Float(0.0),
            }),
            FillStrategy::Mean => mean(&col.values).map(CellValue::float),
            FillStrategy::Median => median(&col.values).map(CellValue::float),
            FillStrategy::Mode => mode(&col.values),
            FillStrategy::ForwardFill => {
                forward_fill(col.values.iter_mut());
                None
            }
            FillStrategy::BackwardFill => {
                forward_fill(col.values.iter_mut().rev());
                None
            }
        };

        if let Some(value) = constant.filter(|v| !v.is_null()) {
            fill_constant(&mut col.values, &value);
            fill_value = Some(value);
        }
    }

    let cells_filled = nulls_before - col.null_count();
    debug!(column, %strategy, cells_filled, "filled column");

    Ok(FillReport {
        column: column.to_string(),
        strategy,
        cells_filled,
        fill_value,
    })
}
