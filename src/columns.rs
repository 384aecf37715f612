//! Rinse - Column naming
//!
//! Column names live in a [`ColumnNameSet`] that is tracked apart from the
//! dataset and pushed onto it by position. The name at index `i` always
//! belongs to the column at index `i`, whatever the text of either name.
//!
//! The free functions are pure transforms over a name list; the methods on
//! [`ColumnNameSet`] add the uniqueness check and only commit when it passes.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CleanError, CleanResult};
use crate::model::Dataset;

/// Bulk rename applied to every column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameTransform {
    /// First character upper-case, the rest lower-case.
    Capitalize,
    Uppercase,
    Lowercase,
    SpacesToUnderscore,
}

impl RenameTransform {
    fn apply(self, name: &str) -> String {
        match self {
            RenameTransform::Capitalize => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            }
            RenameTransform::Uppercase => name.to_uppercase(),
            RenameTransform::Lowercase => name.to_lowercase(),
            RenameTransform::SpacesToUnderscore => name.replace(' ', "_"),
        }
    }
}

impl fmt::Display for RenameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenameTransform::Capitalize => write!(f, "capitalize"),
            RenameTransform::Uppercase => write!(f, "uppercase"),
            RenameTransform::Lowercase => write!(f, "lowercase"),
            RenameTransform::SpacesToUnderscore => write!(f, "spaces to underscore"),
        }
    }
}

impl FromStr for RenameTransform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "capitalize" | "title" => Ok(RenameTransform::Capitalize),
            "upper" | "uppercase" => Ok(RenameTransform::Uppercase),
            "lower" | "lowercase" => Ok(RenameTransform::Lowercase),
            "underscore" | "spaces_to_underscore" | "spaces-to-underscore" => {
                Ok(RenameTransform::SpacesToUnderscore)
            }
            other => Err(format!("unknown rename transform: {other}")),
        }
    }
}

/// Trim every name, then apply `transform`.
pub fn apply_bulk_transform(names: &[String], transform: RenameTransform) -> Vec<String> {
    names
        .iter()
        .map(|name| transform.apply(name.trim()))
        .collect()
}

/// Replace the first occurrence of `target` with `new_name`.
pub fn rename_one(names: &[String], target: &str, new_name: &str) -> CleanResult<Vec<String>> {
    if new_name.trim().is_empty() {
        return Err(CleanError::EmptyName);
    }
    let index = names
        .iter()
        .position(|n| n == target)
        .ok_or_else(|| CleanError::NotFound(target.to_string()))?;

    let mut renamed = names.to_vec();
    renamed[index] = new_name.to_string();
    Ok(renamed)
}

fn first_duplicate(names: &[String]) -> Option<&String> {
    let mut seen = HashSet::new();
    names.iter().find(|n| !seen.insert(n.as_str()))
}

/// Ordered display names for a dataset's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNameSet {
    names: Vec<String>,
}

impl ColumnNameSet {
    /// Capture the dataset's current names.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            names: dataset.column_names(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Apply a bulk transform. A transform that would make two names equal
    /// is rejected and the set is left unchanged.
    pub fn transform(&mut self, transform: RenameTransform) -> CleanResult<()> {
        let renamed = apply_bulk_transform(&self.names, transform);
        self.commit(renamed)
    }

    /// Rename a single column, rejecting blank and colliding names.
    pub fn rename(&mut self, target: &str, new_name: &str) -> CleanResult<()> {
        let renamed = rename_one(&self.names, target, new_name)?;
        self.commit(renamed)
    }

    fn commit(&mut self, renamed: Vec<String>) -> CleanResult<()> {
        if let Some(dup) = first_duplicate(&renamed) {
            return Err(CleanError::DuplicateColumn(dup.clone()));
        }
        self.names = renamed;
        Ok(())
    }

    /// Keep the names whose `keep[i]` is true, in step with a column drop.
    pub fn retain_positions(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.names.retain(|_| *flags.next().unwrap_or(&true));
    }

    /// Push the names onto the dataset by position.
    pub fn apply_to(&self, dataset: &mut Dataset) -> CleanResult<()> {
        if self.names.len() != dataset.column_count() {
            return Err(CleanError::LengthMismatch {
                names: self.names.len(),
                columns: dataset.column_count(),
            });
        }
        if let Some(dup) = first_duplicate(&self.names) {
            return Err(CleanError::DuplicateColumn(dup.clone()));
        }
        dataset.set_column_names(&self.names);
        Ok(())
    }
}
