use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, CleanError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads sources, reconciles rows, or emits cleaned workbooks.
#[derive(Debug, Error)]
pub enum CleanError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails (configuration files).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when an origin file is missing required columns. The whole file
    /// is rejected before any of its rows are processed.
    #[error("origin file '{file}' is missing required columns: {}", missing.join(", "))]
    Schema { file: String, missing: Vec<String> },

    /// Raised when a single row cannot be reconciled. The row is skipped with
    /// a diagnostic; the rest of the file continues.
    #[error("row error: {0}")]
    Row(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input path not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// A single phone value that could not be reduced to a usable ten-digit key.
///
/// This is recovered locally: the offending value is excluded from matching
/// and a format remark is recorded on the row. It never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("phone number '{raw}' has no ten-digit form")]
pub struct PhoneFormatError {
    /// The raw value as it appeared in the source cell.
    pub raw: String,
}
