//! Rinse - CSV loader
//!
//! Parses uploaded bytes into a typed [`Dataset`]. Structural problems
//! (empty upload, no data rows, ragged records, bad UTF-8) fail the load;
//! anything cell-level degrades to best-effort typing instead.
//!
//! ```text
//! bytes ──▶ csv::Reader ──▶ header fix-up ──▶ raw fields ──▶ per-column inference
//!                                                              │
//!                                  Integer | Float | Timestamp | Text
//! ```

use std::collections::HashSet;

use tracing::debug;

use crate::coerce::{parse_number, parse_timestamp, settle_numeric};
use crate::config::CleanConfig;
use crate::error::ParseError;
use crate::model::{CellValue, Column, ColumnType, Dataset};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parse CSV bytes into a dataset.
pub fn load(bytes: &[u8], config: &CleanConfig) -> Result<Dataset, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let raw_headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let headers = fix_headers(&raw_headers);

    let mut fields: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result?;
        for (column, field) in fields.iter_mut().zip(record.iter()) {
            column.push(if config.is_null_token(field) {
                None
            } else {
                Some(field.to_string())
            });
        }
    }

    let row_count = fields.first().map(Vec::len).unwrap_or(0);
    if row_count == 0 {
        return Err(ParseError::NoRows);
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .zip(fields)
        .map(|(name, raw)| infer_column(name, raw, config))
        .collect();

    // Headers were de-duplicated and every record had the header's width
    Dataset::new(columns).map_err(|e| ParseError::Malformed {
        line: 1,
        message: e.to_string(),
    })
}

/// Blank headers become `Unnamed: <position>`; repeats get `.1`, `.2`, ...
fn fix_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for (i, name) in raw.iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            name.clone()
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

fn infer_column(name: String, raw: Vec<Option<String>>, config: &CleanConfig) -> Column {
    let present: Vec<&str> = raw.iter().flatten().map(String::as_str).collect();

    // An all-missing column loads as float, like pandas
    if present.is_empty() {
        let values = vec![CellValue::Null; raw.len()];
        return Column::new(name, ColumnType::Float, values);
    }

    if present.iter().all(|s| parse_number(s).is_some()) {
        let mut values: Vec<CellValue> = raw
            .iter()
            .map(|f| f.as_deref().and_then(parse_number).unwrap_or(CellValue::Null))
            .collect();
        let dtype = settle_numeric(&mut values);
        debug!(column = %name, %dtype, "inferred numeric column");
        return Column::new(name, dtype, values);
    }

    if let Some(format) = config
        .inference_date_formats
        .iter()
        .find(|fmt| present.iter().all(|s| parse_timestamp(s, fmt).is_some()))
    {
        let values = raw
            .iter()
            .map(|f| {
                f.as_deref()
                    .and_then(|s| parse_timestamp(s, format))
                    .map(CellValue::Timestamp)
                    .unwrap_or(CellValue::Null)
            })
            .collect();
        debug!(column = %name, format = %format, "inferred timestamp column");
        return Column::new(name, ColumnType::Timestamp, values);
    }

    let values = raw
        .into_iter()
        .map(|f| f.map(CellValue::Text).unwrap_or(CellValue::Null))
        .collect();
    Column::new(name, ColumnType::Text, values)
}
