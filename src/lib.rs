//! Rinse - session-based cleaning engine for tabular CSV datasets.
//!
//! A [`session::Session`] loads one CSV upload into a typed column store and
//! applies cleaning operations to it: type coercion, column renaming,
//! duplicate removal and missing-value handling. The result exports back to
//! CSV.
//!
//! ## Surfaces
//!
//! - **CLI** (`rinse clean`, `rinse inspect`): headless runs over a file.
//! - **Tool server** (`mcp`): one session exposed as JSON-RPC tools over HTTP.

pub mod coerce;
pub mod columns;
pub mod config;
pub mod data;
pub mod dedup;
pub mod error;
pub mod export;
pub mod loader;
pub mod mcp;
pub mod missing;
pub mod model;
pub mod session;
