//! Rinse - Error taxonomy
//!
//! Every rejected operation maps to one of these variants. None of them is
//! raised after a mutation has started, so a returned error always means the
//! dataset is exactly as it was before the call.

use thiserror::Error;

use crate::model::ColumnType;

/// Shorthand for results returned by the cleaning engine.
pub type CleanResult<T> = Result<T, CleanError>;

/// Structural problems with an uploaded file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The upload contained no bytes (or only whitespace).
    #[error("No columns to parse from file: the upload is empty")]
    Empty,

    /// A header row was found but no data rows follow it.
    #[error("The file has a header row but no data rows")]
    NoRows,

    /// A record has a different number of fields than the header.
    #[error("Line {line}: expected {expected} fields, found {found}")]
    InconsistentRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Invalid UTF-8 or any other CSV syntax error.
    #[error("Line {line}: {message}")]
    Malformed { line: u64, message: String },
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.kind() {
            csv::ErrorKind::UnequalLengths {
                pos,
                expected_len,
                len,
            } => ParseError::InconsistentRow {
                line: pos.as_ref().map(|p| p.line()).unwrap_or(line),
                expected: *expected_len as usize,
                found: *len as usize,
            },
            _ => ParseError::Malformed {
                line,
                message: err.to_string(),
            },
        }
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The referenced column does not exist.
    #[error("Column not found: {0}")]
    NotFound(String),

    /// A rename would produce a blank column name.
    #[error("Column names cannot be empty")]
    EmptyName,

    /// A rename would make two columns share a name.
    #[error("Renaming would create a duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A fill strategy was requested against a column it cannot apply to.
    #[error("Cannot apply {strategy} fill to column {column} of type {dtype}")]
    TypeMismatch {
        column: String,
        dtype: ColumnType,
        strategy: String,
    },

    /// The name set and the dataset disagree on the column count.
    #[error("Name list has {names} entries but the dataset has {columns} columns")]
    LengthMismatch { names: usize, columns: usize },

    /// A column's length disagrees with the rest of the table.
    #[error("Column {column} has {len} values but the table has {expected} rows")]
    RaggedColumn {
        column: String,
        len: usize,
        expected: usize,
    },

    /// An operation was requested before any file was loaded.
    #[error("No dataset loaded: upload a CSV file first")]
    NoDataset,

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CleanError {
    /// Whether the error is a recoverable warning about a single request
    /// rather than a failure of the load itself.
    pub fn is_warning(&self) -> bool {
        !matches!(self, CleanError::Parse(_) | CleanError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unequal_lengths_maps_to_inconsistent_row() {
        let data = "a,b\n1,2\n3\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let err = reader
            .records()
            .find_map(|r| r.err())
            .expect("short row should fail");
        match ParseError::from(err) {
            ParseError::InconsistentRow {
                line,
                expected,
                found,
            } => {
                assert_eq!(line, 3);
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_warning_classification() {
        assert!(CleanError::NotFound("x".into()).is_warning());
        assert!(CleanError::EmptyName.is_warning());
        assert!(!CleanError::Parse(ParseError::Empty).is_warning());
    }
}
