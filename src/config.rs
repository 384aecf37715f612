//! Rinse - Session configuration
//!
//! Settings are optional; every field falls back to the defaults below when
//! absent from the JSON config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default export filename handed to callers that do not choose one.
pub const DEFAULT_EXPORT_FILENAME: &str = "updated_data_web_app.csv";

/// Default day-month-year pattern for timestamp conversion.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d-%m-%Y";

/// Default port for `rinse serve`.
pub const DEFAULT_SERVER_PORT: u16 = 3917;

/// Field values treated as missing when loading, matching pandas' defaults.
pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Patterns tried when inferring whether a loaded column holds timestamps.
pub const DEFAULT_INFERENCE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// chrono pattern used by the timestamp conversion.
    pub timestamp_format: String,
    /// chrono patterns used for load-time type inference.
    pub inference_date_formats: Vec<String>,
    /// Raw field values that load as missing.
    pub null_tokens: Vec<String>,
    pub export_filename: String,
    /// Rows shown in overviews.
    pub preview_rows: usize,
    pub server_port: u16,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            inference_date_formats: DEFAULT_INFERENCE_DATE_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect(),
            export_filename: DEFAULT_EXPORT_FILENAME.to_string(),
            preview_rows: 8,
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl CleanConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Whether a raw field counts as missing.
    pub fn is_null_token(&self, field: &str) -> bool {
        self.null_tokens.iter().any(|t| t == field)
    }
}
