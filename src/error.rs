//! Error types
//!
//! Soft skips (skip-listed tables, missing tables in data-only mode, rows
//! that are too wide) are not errors; see [`crate::export::SkipReason`].

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum Error {
    /// A value whose column type cannot be inferred
    #[error("unknown type for: {value}{}{}", field_suffix(.field), row_suffix(.row))]
    UnknownType {
        value: String,
        field: Option<String>,
        row: Option<String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read source {}: {source}", .path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {} at line {line}: {source}", .path.display())]
    SourceParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid naming rule `{pattern}`: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Attach the field name and containing row to an `UnknownType` error
    pub fn with_context(self, field_name: &str, containing_row: &crate::types::FlatRow) -> Self {
        match self {
            Error::UnknownType { value, field, row } => Error::UnknownType {
                value,
                field: field.or_else(|| Some(field_name.to_string())),
                row: row.or_else(|| Some(crate::types::row_to_json(containing_row).to_string())),
            },
            other => other,
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" (field `{}`)", f))
        .unwrap_or_default()
}

fn row_suffix(row: &Option<String>) -> String {
    row.as_ref().map(|r| format!(" in row {}", r)).unwrap_or_default()
}

/// Failures raised by a [`crate::store::RelationalStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("table `{0}` does not exist")]
    MissingTable(String),

    #[error("unsupported column type `{column_type}` for `{table}`.`{column}`")]
    UnsupportedColumnType {
        table: String,
        column: String,
        column_type: String,
    },

    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn { table: String, column: String },

    #[error("duplicate primary key in `{table}`: {key}")]
    DuplicateKey { table: String, key: String },
}
