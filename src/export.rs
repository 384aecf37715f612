//! Rinse - CSV export
//!
//! Serializes the current dataset: header row from the column names, rows
//! in their current order, nulls as empty fields. The same dataset always
//! produces the same bytes.

use std::fs;
use std::path::Path;

use crate::error::CleanResult;
use crate::model::{Column, Dataset, TimePrecision};

/// Serialize `dataset` to CSV bytes.
pub fn to_csv(dataset: &Dataset) -> CleanResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let columns = dataset.columns();
    if !columns.is_empty() {
        writer.write_record(columns.iter().map(|c| c.name.as_str()))?;

        let precision: Vec<TimePrecision> = columns.iter().map(Column::time_precision).collect();
        for row in 0..dataset.row_count() {
            writer.write_record(
                columns
                    .iter()
                    .zip(&precision)
                    .map(|(c, p)| c.render_cell(row, *p)),
            )?;
        }
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Write the export to `path` through a temporary file, so readers never
/// observe a half-written export.
pub fn write_csv<P: AsRef<Path>>(dataset: &Dataset, path: P) -> CleanResult<()> {
    let path = path.as_ref();
    let bytes = to_csv(dataset)?;

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    fs::write(&temp, &bytes)?;
    fs::rename(&temp, path)?;
    Ok(())
}
