//! Rinse - Cleaning session
//!
//! A [`Session`] owns at most one loaded dataset together with its
//! [`ColumnNameSet`] and a log of the operations applied to it. Callers
//! drive it with named [`Operation`]s; each one either applies completely
//! or is rejected before anything changes.
//!
//! ```text
//!   Upload ──load──▶ Session { Dataset, ColumnNameSet, log }
//!                       │   ▲
//!            Operation ─┘   └─ reset / new upload
//!                       │
//!                       ▼
//!                 OperationReport ──▶ caller (CLI, tool server)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coerce::{coerce, CoercionReport, TargetType};
use crate::columns::{ColumnNameSet, RenameTransform};
use crate::config::CleanConfig;
use crate::data::Upload;
use crate::dedup::{count_duplicates, remove_duplicates, RemovalReport};
use crate::error::{CleanError, CleanResult};
use crate::export::to_csv;
use crate::loader::load;
use crate::missing::{
    drop_columns_with_missing, drop_rows_with_missing, fill_column, missing_counts,
    ColumnDropReport, FillReport, FillStrategy, MissingCount, RowDropReport,
};
use crate::model::{ColumnType, Dataset};

// ─── Operations ─────────────────────────────────────────────────────────────

/// A named cleaning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    ConvertType { column: String, target: TargetType },
    RenameColumns { transform: RenameTransform },
    RenameColumn { column: String, new_name: String },
    RemoveDuplicates,
    DropColumnsWithMissing,
    DropRowsWithMissing,
    FillMissing { column: String, strategy: FillStrategy },
}

impl Operation {
    /// Tag used in logs and as the tool name on the server.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ConvertType { .. } => "convert_type",
            Operation::RenameColumns { .. } => "rename_columns",
            Operation::RenameColumn { .. } => "rename_column",
            Operation::RemoveDuplicates => "remove_duplicates",
            Operation::DropColumnsWithMissing => "drop_columns_with_missing",
            Operation::DropRowsWithMissing => "drop_rows_with_missing",
            Operation::FillMissing { .. } => "fill_missing",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ConvertType { column, target } => write!(f, "convert {column} to {target}"),
            Operation::RenameColumns { transform } => write!(f, "rename all columns ({transform})"),
            Operation::RenameColumn { column, new_name } => {
                write!(f, "rename {column} to {new_name}")
            }
            Operation::RemoveDuplicates => write!(f, "remove duplicate rows"),
            Operation::DropColumnsWithMissing => write!(f, "drop columns with missing values"),
            Operation::DropRowsWithMissing => write!(f, "drop rows with missing values"),
            Operation::FillMissing { column, strategy } => {
                write!(f, "fill {column} with {strategy}")
            }
        }
    }
}

/// Compact command-line form:
///
/// | Form                     | Operation                    |
/// |--------------------------|------------------------------|
/// | `convert:COL:TYPE`       | convert a column's type      |
/// | `rename-all:TRANSFORM`   | bulk rename                  |
/// | `rename:OLD=NEW`         | rename one column            |
/// | `dedup`                  | remove duplicate rows        |
/// | `drop-columns`           | drop columns with nulls      |
/// | `drop-rows`              | drop rows with nulls         |
/// | `fill:COL:STRATEGY`      | fill nulls in one column     |
///
/// Column names may contain `:`; the last `:` separates the parameter.
impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = match s.split_once(':') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (s, None),
        };

        let column_and_param = |rest: Option<&str>| -> Result<(String, String), String> {
            rest.and_then(|r| r.rsplit_once(':'))
                .filter(|(column, _)| !column.is_empty())
                .map(|(column, param)| (column.to_string(), param.to_string()))
                .ok_or_else(|| format!("expected {verb}:COLUMN:VALUE, got '{s}'"))
        };

        match verb {
            "convert" => {
                let (column, target) = column_and_param(rest)?;
                Ok(Operation::ConvertType {
                    column,
                    target: target.parse()?,
                })
            }
            "fill" => {
                let (column, strategy) = column_and_param(rest)?;
                Ok(Operation::FillMissing {
                    column,
                    strategy: strategy.parse()?,
                })
            }
            "rename-all" => {
                let transform = rest.ok_or_else(|| "expected rename-all:TRANSFORM".to_string())?;
                Ok(Operation::RenameColumns {
                    transform: transform.parse()?,
                })
            }
            "rename" => {
                let (column, new_name) = rest
                    .and_then(|r| r.split_once('='))
                    .ok_or_else(|| format!("expected rename:OLD=NEW, got '{s}'"))?;
                Ok(Operation::RenameColumn {
                    column: column.to_string(),
                    new_name: new_name.to_string(),
                })
            }
            "dedup" => Ok(Operation::RemoveDuplicates),
            "drop-columns" => Ok(Operation::DropColumnsWithMissing),
            "drop-rows" => Ok(Operation::DropRowsWithMissing),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

// ─── Reports ────────────────────────────────────────────────────────────────

/// Result of a successful rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl RenameReport {
    pub fn renamed_count(&self) -> usize {
        self.before
            .iter()
            .zip(&self.after)
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// What an accepted operation changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationReport {
    Converted(CoercionReport),
    Renamed(RenameReport),
    Deduplicated(RemovalReport),
    DroppedColumns(ColumnDropReport),
    DroppedRows(RowDropReport),
    Filled(FillReport),
}

impl OperationReport {
    /// True when the operation left the dataset untouched.
    pub fn is_noop(&self) -> bool {
        match self {
            OperationReport::Converted(r) => !r.changed,
            OperationReport::Renamed(r) => r.renamed_count() == 0,
            OperationReport::Deduplicated(r) => r.rows_removed == 0,
            OperationReport::DroppedColumns(r) => r.removed.is_empty(),
            OperationReport::DroppedRows(r) => r.rows_removed == 0,
            OperationReport::Filled(r) => r.cells_filled == 0,
        }
    }
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationReport::Converted(r) if !r.changed => {
                write!(f, "{} is already {}", r.column, r.to)
            }
            OperationReport::Converted(r) => write!(
                f,
                "Converted {} from {} to {} \
                 ({} value(s) could not be converted and are now missing)",
                r.column, r.from, r.to, r.cells_nulled
            ),
            OperationReport::Renamed(r) => write!(f, "Renamed {} column(s)", r.renamed_count()),
            OperationReport::Deduplicated(r) => write!(
                f,
                "Duplicates removed: {} row(s) dropped, {} remaining",
                r.rows_removed, r.rows_after
            ),
            OperationReport::DroppedColumns(r) if r.removed.is_empty() => {
                write!(f, "No columns with missing values")
            }
            OperationReport::DroppedColumns(r) => write!(
                f,
                "Dropped {} column(s) with missing values: {}",
                r.removed.len(),
                r.removed.join(", ")
            ),
            OperationReport::DroppedRows(r) => write!(
                f,
                "Dropped {} row(s) with missing values, {} remaining",
                r.rows_removed, r.rows_after
            ),
            OperationReport::Filled(r) => match (&r.strategy, &r.fill_value) {
                (FillStrategy::Zero, _) => {
                    write!(f, "Filled {} with zeros ({} cell(s))", r.column, r.cells_filled)
                }
                (FillStrategy::ForwardFill, _) | (FillStrategy::BackwardFill, _) => write!(
                    f,
                    "{} filled {} ({} cell(s))",
                    capitalize(&r.strategy.to_string()),
                    r.column,
                    r.cells_filled
                ),
                (strategy, Some(value)) => write!(
                    f,
                    "Filled {} with {} value {} ({} cell(s))",
                    r.column, strategy, value, r.cells_filled
                ),
                (strategy, None) => write!(
                    f,
                    "Nothing to fill in {} with {} ({} cell(s))",
                    r.column, strategy, r.cells_filled
                ),
            },
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ─── Session state ──────────────────────────────────────────────────────────

/// Result of presenting an upload to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// A new dataset was parsed (any previous state was discarded).
    Loaded { rows: usize, columns: usize },
    /// The same upload is already loaded; nothing changed.
    Unchanged,
}

/// One line of the operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub sequence: usize,
    pub operation: String,
    pub outcome: String,
    pub accepted: bool,
}

/// Per-column summary for overviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: ColumnType,
    pub missing: usize,
    /// Label set of a categorical column.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// Snapshot of the loaded dataset for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub source: String,
    pub rows: usize,
    pub columns: usize,
    pub duplicate_rows: usize,
    pub column_summaries: Vec<ColumnSummary>,
    pub preview: Vec<Vec<String>>,
}

impl fmt::Display for Overview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Columns = {}, Rows = {}", self.columns, self.rows)?;
        writeln!(f, "Duplicate rows: {}", self.duplicate_rows)?;
        writeln!(f)?;
        for c in &self.column_summaries {
            write!(f, "  {:<24} {:<16} missing: {}", c.name, c.dtype.label(), c.missing)?;
            if !c.categories.is_empty() {
                write!(f, "  categories: {}", c.categories.join(", "))?;
            }
            writeln!(f)?;
        }
        if !self.preview.is_empty() && !self.column_summaries.is_empty() {
            writeln!(f)?;
            let header: Vec<&str> = self
                .column_summaries
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            writeln!(f, "  {}", header.join(" | "))?;
            for row in &self.preview {
                writeln!(f, "  {}", row.join(" | "))?;
            }
        }
        Ok(())
    }
}

/// A finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: String,
    pub bytes: Vec<u8>,
}

struct Loaded {
    fingerprint: u64,
    source: String,
    dataset: Dataset,
    names: ColumnNameSet,
}

/// The owning context for one user's cleaning work.
pub struct Session {
    config: CleanConfig,
    loaded: Option<Loaded>,
    log: Vec<LogEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CleanConfig::default())
    }
}

impl Session {
    pub fn new(config: CleanConfig) -> Self {
        Self {
            config,
            loaded: None,
            log: Vec::new(),
        }
    }

    pub fn config(&self) -> &CleanConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Current dataset, if one is loaded.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.loaded.as_ref().map(|l| &l.dataset)
    }

    /// Current column names, if a dataset is loaded.
    pub fn column_names(&self) -> Option<&[String]> {
        self.loaded.as_ref().map(|l| l.names.names())
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Discard the dataset, the name set and the log.
    pub fn reset(&mut self) {
        if self.loaded.is_some() {
            info!("session reset");
        }
        self.loaded = None;
        self.log.clear();
    }

    /// Present an upload. The same upload again is a no-op; a different one
    /// replaces the session state. On a parse failure the session is left
    /// empty.
    pub fn load(&mut self, upload: &Upload) -> CleanResult<LoadOutcome> {
        let fingerprint = upload.fingerprint();
        if self
            .loaded
            .as_ref()
            .is_some_and(|l| l.fingerprint == fingerprint)
        {
            return Ok(LoadOutcome::Unchanged);
        }

        self.reset();
        let dataset = load(upload.bytes(), &self.config).map_err(|e| {
            warn!(source = %upload.name, error = %e, "failed to load upload");
            e
        })?;
        let (rows, columns) = dataset.shape();
        info!(source = %upload.name, rows, columns, size = %upload.size_human(), "loaded dataset");

        self.loaded = Some(Loaded {
            fingerprint,
            source: upload.name.clone(),
            names: ColumnNameSet::from_dataset(&dataset),
            dataset,
        });
        Ok(LoadOutcome::Loaded { rows, columns })
    }

    /// Apply one operation and record it in the log.
    pub fn apply(&mut self, operation: Operation) -> CleanResult<OperationReport> {
        let result = self.apply_inner(&operation);

        let (outcome, accepted) = match &result {
            Ok(report) => {
                info!(op = operation.name(), "{report}");
                (report.to_string(), true)
            }
            Err(e) => {
                warn!(op = operation.name(), error = %e, "operation rejected");
                (e.to_string(), false)
            }
        };
        // Without a dataset there is nothing to attach the entry to
        if self.loaded.is_some() {
            self.log.push(LogEntry {
                sequence: self.log.len() + 1,
                operation: operation.to_string(),
                outcome,
                accepted,
            });
        }

        result
    }

    fn apply_inner(&mut self, operation: &Operation) -> CleanResult<OperationReport> {
        let timestamp_format = self.config.timestamp_format.clone();
        let loaded = self.loaded.as_mut().ok_or(CleanError::NoDataset)?;

        let report = match operation {
            Operation::ConvertType { column, target } => OperationReport::Converted(coerce(
                &mut loaded.dataset,
                column,
                *target,
                &timestamp_format,
            )?),
            Operation::RenameColumns { transform } => {
                let mut names = loaded.names.clone();
                names.transform(*transform)?;
                loaded.commit_names(names)?
            }
            Operation::RenameColumn { column, new_name } => {
                let mut names = loaded.names.clone();
                names.rename(column, new_name)?;
                loaded.commit_names(names)?
            }
            Operation::RemoveDuplicates => {
                OperationReport::Deduplicated(remove_duplicates(&mut loaded.dataset))
            }
            Operation::DropColumnsWithMissing => {
                let report = drop_columns_with_missing(&mut loaded.dataset);
                loaded.names.retain_positions(&report.kept);
                loaded.names.apply_to(&mut loaded.dataset)?;
                OperationReport::DroppedColumns(report)
            }
            Operation::DropRowsWithMissing => {
                OperationReport::DroppedRows(drop_rows_with_missing(&mut loaded.dataset))
            }
            Operation::FillMissing { column, strategy } => {
                OperationReport::Filled(fill_column(&mut loaded.dataset, column, *strategy)?)
            }
        };
        Ok(report)
    }

    /// Snapshot for display: shape, dtypes, duplicates, missing counts and
    /// the first few rows.
    pub fn overview(&self) -> CleanResult<Overview> {
        let loaded = self.loaded.as_ref().ok_or(CleanError::NoDataset)?;
        let ds = &loaded.dataset;
        let (rows, columns) = ds.shape();

        let column_summaries = ds
            .columns()
            .iter()
            .zip(missing_counts(ds))
            .map(|(c, MissingCount { missing, .. })| ColumnSummary {
                name: c.name.clone(),
                dtype: c.dtype,
                missing,
                categories: match c.dtype {
                    ColumnType::Categorical => {
                        c.categories().iter().map(|v| v.render()).collect()
                    }
                    _ => Vec::new(),
                },
            })
            .collect();

        Ok(Overview {
            source: loaded.source.clone(),
            rows,
            columns,
            duplicate_rows: count_duplicates(ds),
            column_summaries,
            preview: ds.preview(self.config.preview_rows),
        })
    }

    /// Export under the configured default filename.
    pub fn export(&self) -> CleanResult<Export> {
        self.export_as(&self.config.export_filename)
    }

    /// Export under a caller-chosen filename.
    pub fn export_as(&self, filename: &str) -> CleanResult<Export> {
        let loaded = self.loaded.as_ref().ok_or(CleanError::NoDataset)?;
        Ok(Export {
            filename: filename.to_string(),
            bytes: to_csv(&loaded.dataset)?,
        })
    }
}

impl Loaded {
    /// Adopt a validated name set and push it onto the dataset.
    fn commit_names(&mut self, names: ColumnNameSet) -> CleanResult<OperationReport> {
        names.apply_to(&mut self.dataset)?;
        let before = std::mem::replace(&mut self.names, names);
        Ok(OperationReport::Renamed(RenameReport {
            before: before.names().to_vec(),
            after: self.names.names().to_vec(),
        }))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    const PEOPLE: &str = "Name,Age\nAlice,30\nBob,\nAlice,30\n";

    fn loaded(csv: &str) -> Session {
        let mut session = Session::default();
        session
            .load(&Upload::from_bytes("test.csv", csv.as_bytes().to_vec()))
            .unwrap();
        session
    }

    fn export_str(session: &Session) -> String {
        String::from_utf8(session.export().unwrap().bytes).unwrap()
    }

    #[test]
    fn test_dedup_then_mean_scenario() {
        let mut session = loaded(PEOPLE);

        let report = session.apply(Operation::RemoveDuplicates).unwrap();
        assert!(matches!(
            report,
            OperationReport::Deduplicated(RemovalReport { rows_after: 2, .. })
        ));

        let report = session
            .apply(Operation::FillMissing {
                column: "Age".into(),
                strategy: FillStrategy::Mean,
            })
            .unwrap();
        match report {
            OperationReport::Filled(r) => {
                assert_eq!(r.cells_filled, 1);
                assert_eq!(r.fill_value, Some(CellValue::Float(30.0)));
            }
            other => panic!("unexpected report: {other:?}"),
        }

        assert_eq!(export_str(&session), "Name,Age\nAlice,30.0\nBob,30.0\n");
        assert_eq!(session.export().unwrap().filename, "updated_data_web_app.csv");
    }

    #[test]
    fn test_rename_is_positional_and_exported() {
        let mut session = loaded("a,b\n1,2\n");
        session
            .apply(Operation::RenameColumns {
                transform: RenameTransform::Uppercase,
            })
            .unwrap();

        assert_eq!(session.column_names().unwrap(), &["A", "B"]);
        let ds = session.dataset().unwrap();
        assert_eq!(ds.column("A").unwrap().values, vec![CellValue::Integer(1)]);
        assert_eq!(export_str(&session), "A,B\n1,2\n");
    }

    #[test]
    fn test_operations_address_renamed_columns() {
        let mut session = loaded("first name,age\nann,\nbo,4\n");
        session
            .apply(Operation::RenameColumns {
                transform: RenameTransform::SpacesToUnderscore,
            })
            .unwrap();

        let err = session
            .apply(Operation::FillMissing {
                column: "first name".into(),
                strategy: FillStrategy::Mode,
            })
            .unwrap_err();
        assert!(matches!(err, CleanError::NotFound(_)));

        session
            .apply(Operation::FillMissing {
                column: "age".into(),
                strategy: FillStrategy::Zero,
            })
            .unwrap();
        assert_eq!(export_str(&session), "first_name,age\nann,0.0\nbo,4.0\n");
    }

    #[test]
    fn test_empty_rename_rejected_without_change() {
        let mut session = loaded("a,b\n1,2\n");
        let err = session
            .apply(Operation::RenameColumn {
                column: "a".into(),
                new_name: "".into(),
            })
            .unwrap_err();
        assert!(matches!(err, CleanError::EmptyName));
        assert_eq!(session.column_names().unwrap(), &["a", "b"]);
    }

    #[test]
    fn test_colliding_rename_rejected() {
        let mut session = loaded("Id,id\n1,2\n");
        let err = session
            .apply(Operation::RenameColumns {
                transform: RenameTransform::Lowercase,
            })
            .unwrap_err();
        assert!(matches!(err, CleanError::DuplicateColumn(_)));
        assert_eq!(session.dataset().unwrap().column_names(), vec!["Id", "id"]);
    }

    #[test]
    fn test_drop_columns_keeps_names_in_sync() {
        let mut session = loaded("a,b,c\n1,,x\n2,3,y\n");
        session
            .apply(Operation::RenameColumns {
                transform: RenameTransform::Uppercase,
            })
            .unwrap();
        session.apply(Operation::DropColumnsWithMissing).unwrap();

        assert_eq!(session.column_names().unwrap(), &["A", "C"]);
        assert_eq!(session.dataset().unwrap().column_names(), vec!["A", "C"]);

        // The name set still lines up with the data after a later rename
        session
            .apply(Operation::RenameColumn {
                column: "C".into(),
                new_name: "label".into(),
            })
            .unwrap();
        assert_eq!(export_str(&session), "A,label\n1,x\n2,y\n");
    }

    #[test]
    fn test_type_mismatch_leaves_dataset_unchanged() {
        let mut session = loaded("name\nann\nNA\n");
        let before = session.dataset().unwrap().clone();
        let err = session
            .apply(Operation::FillMissing {
                column: "name".into(),
                strategy: FillStrategy::Median,
            })
            .unwrap_err();
        assert!(matches!(err, CleanError::TypeMismatch { .. }));
        assert_eq!(session.dataset().unwrap(), &before);

        let last = session.log().last().unwrap();
        assert!(!last.accepted);
    }

    #[test]
    fn test_operation_without_dataset() {
        let mut session = Session::default();
        let err = session.apply(Operation::RemoveDuplicates).unwrap_err();
        assert!(matches!(err, CleanError::NoDataset));
        assert!(session.log().is_empty());
        assert!(matches!(session.export(), Err(CleanError::NoDataset)));
    }

    #[test]
    fn test_same_upload_keeps_state() {
        let mut session = loaded(PEOPLE);
        session.apply(Operation::RemoveDuplicates).unwrap();

        let again = Upload::from_bytes("test.csv", PEOPLE.as_bytes().to_vec());
        assert_eq!(session.load(&again).unwrap(), LoadOutcome::Unchanged);
        assert_eq!(session.dataset().unwrap().row_count(), 2);
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn test_new_upload_resets() {
        let mut session = loaded(PEOPLE);
        session.apply(Operation::RemoveDuplicates).unwrap();

        let other = Upload::from_bytes("other.csv", b"x\n1\n".to_vec());
        assert_eq!(
            session.load(&other).unwrap(),
            LoadOutcome::Loaded { rows: 1, columns: 1 }
        );
        assert!(session.log().is_empty());
        assert_eq!(session.column_names().unwrap(), &["x"]);
    }

    #[test]
    fn test_failed_upload_leaves_preload_state() {
        let mut session = loaded(PEOPLE);
        let bad = Upload::from_bytes("bad.csv", Vec::new());
        let err = session.load(&bad).unwrap_err();
        assert!(matches!(err, CleanError::Parse(_)));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = loaded(PEOPLE);
        session.apply(Operation::RemoveDuplicates).unwrap();
        session.reset();
        assert!(!session.is_loaded());
        assert!(session.log().is_empty());
        assert!(session.column_names().is_none());
    }

    #[test]
    fn test_log_sequence() {
        let mut session = loaded(PEOPLE);
        session.apply(Operation::RemoveDuplicates).unwrap();
        session.apply(Operation::DropRowsWithMissing).unwrap();
        let sequences: Vec<usize> = session.log().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert_eq!(session.log()[1].operation, "drop rows with missing values");
    }

    #[test]
    fn test_overview() {
        let session = loaded(PEOPLE);
        let overview = session.overview().unwrap();
        assert_eq!((overview.rows, overview.columns), (3, 2));
        assert_eq!(overview.duplicate_rows, 1);
        assert_eq!(overview.column_summaries[1].missing, 1);
        assert_eq!(overview.column_summaries[1].dtype, ColumnType::Float);
        assert_eq!(overview.preview.len(), 3);
        assert!(overview.to_string().contains("Columns = 2, Rows = 3"));
    }

    #[test]
    fn test_overview_without_columns_skips_preview() {
        let mut session = loaded("a,b\n1,NA\nNA,2\n3,4\n");
        session.apply(Operation::DropColumnsWithMissing).unwrap();

        let overview = session.overview().unwrap();
        assert_eq!((overview.rows, overview.columns), (3, 0));
        let text = overview.to_string();
        assert!(text.ends_with("Duplicate rows: 0\n\n"), "{text:?}");
    }

    #[test]
    fn test_overview_lists_categories() {
        let mut session = loaded("size\nS\nM\nS\nNA\n");
        session
            .apply(Operation::ConvertType {
                column: "size".into(),
                target: TargetType::Categorical,
            })
            .unwrap();
        let overview = session.overview().unwrap();
        assert_eq!(overview.column_summaries[0].dtype, ColumnType::Categorical);
        assert_eq!(overview.column_summaries[0].categories, vec!["S", "M"]);
        assert!(overview.to_string().contains("categories: S, M"));
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!(
            "convert:Date:datetime".parse::<Operation>(),
            Ok(Operation::ConvertType {
                column: "Date".into(),
                target: TargetType::Timestamp
            })
        );
        assert_eq!(
            "fill:time:of:day:ffill".parse::<Operation>(),
            Ok(Operation::FillMissing {
                column: "time:of:day".into(),
                strategy: FillStrategy::ForwardFill
            })
        );
        assert_eq!(
            "rename:old name=new name".parse::<Operation>(),
            Ok(Operation::RenameColumn {
                column: "old name".into(),
                new_name: "new name".into()
            })
        );
        assert_eq!(
            "rename-all:lower".parse::<Operation>(),
            Ok(Operation::RenameColumns {
                transform: RenameTransform::Lowercase
            })
        );
        assert_eq!("dedup".parse::<Operation>(), Ok(Operation::RemoveDuplicates));
        assert!("fill:Age".parse::<Operation>().is_err());
        assert!("explode".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_json() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[
                {"op": "convert_type", "column": "Age", "target": "numeric"},
                {"op": "rename_columns", "transform": "spaces_to_underscore"},
                {"op": "fill_missing", "column": "Age", "strategy": "backward_fill"},
                {"op": "remove_duplicates"}
            ]"#,
        )
        .unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[3], Operation::RemoveDuplicates);
        assert_eq!(ops[1].name(), "rename_columns");
    }

    #[test]
    fn test_report_messages() {
        let mut session = loaded("Date,n\n01-02-2023,1\nnot-a-date,2\n");
        let report = session
            .apply(Operation::ConvertType {
                column: "Date".into(),
                target: TargetType::Timestamp,
            })
            .unwrap();
        assert_eq!(
            report.to_string(),
            "Converted Date from object to datetime64[ns] \
             (1 value(s) could not be converted and are now missing)"
        );

        let report = session
            .apply(Operation::ConvertType {
                column: "Date".into(),
                target: TargetType::Timestamp,
            })
            .unwrap();
        assert!(report.is_noop());
        assert_eq!(export_str(&session), "Date,n\n2023-02-01,1\n,2\n");
    }
}
