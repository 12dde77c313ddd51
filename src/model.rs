use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::OutputShape;

/// Identifier of a deal record in the upstream CRM. Kept as a plain string:
/// exports occasionally carry non-numeric identifiers and the engine never
/// does arithmetic on them.
pub type DealId = String;

/// Canonical ten-digit phone key used for all matching.
///
/// Values are only ever produced by [`crate::normalize::canonicalize`], so a
/// `CanonicalPhone` always holds exactly ten ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPhone(pub(crate) String);

impl CanonicalPhone {
    /// Returns the ten-digit key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One input record: an ordered mapping of column names to free-text values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDealRow {
    values: BTreeMap<String, String>,
}

impl RawDealRow {
    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the value stored under `field`, or `""` when the cell is
    /// absent. Source exports routinely omit columns, so lookups never fail.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    /// Inserts or replaces a cell value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }
}

/// An origin file: its name, the header columns it declared, and its rows in
/// file order. The header is kept so the orchestrator can reject the file
/// up front when required columns are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginFile {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<RawDealRow>,
}

/// One prior claim on a phone recorded by the authority source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealClaim {
    pub deal_id: DealId,
    pub stage: String,
}

/// Severity-free category of a per-item diagnostic. The batch never fails on
/// any of these; they are surfaced so callers and tests can assert on them
/// without parsing log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An opt-out list or authority file could not be fetched or read; the
    /// source was treated as empty.
    SourceUnavailable,
    /// An origin file was missing required columns and was skipped whole.
    SchemaError,
    /// A single row failed unexpectedly and was skipped.
    RowError,
}

/// A typed per-item diagnostic aggregated into the batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The item the diagnostic is about: a source name, file name, or
    /// `file:row` reference.
    pub subject: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}

/// Canonical order of every column the cleaned export can carry. Shapes pick
/// subsets; files render the union of the shapes they contain, in this order.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    CARRIER_COLUMN,
    "Deal - ID",
    PHONE_COLUMN,
    "First Name",
    "Deal - Value",
    "Deal - Owner",
    "Deal - County",
    "Deal - Title",
    "Deal - Stage",
    "Remarks",
];

/// Column left blank by the engine and filled by the downstream dialing tool
/// (or by the injected carrier lookup formula in the merged export).
pub const CARRIER_COLUMN: &str = "Carrier";
/// Column holding the chosen phone, referenced by the carrier lookup.
pub const PHONE_COLUMN: &str = "Phone Number";

/// One cleaned output record together with the shape its stage mapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub shape: OutputShape,
    pub deal_id: DealId,
    /// Chosen phone, or empty when none survived (or it was withdrawn).
    pub phone: String,
    pub first_name: String,
    pub value: String,
    pub owner: String,
    pub county: String,
    pub title: String,
    pub stage: String,
    pub remarks: String,
}

impl CleanedRecord {
    /// Renders the cell for `column`, or `""` when the record's shape does
    /// not carry that column.
    pub fn cell(&self, column: &str) -> &str {
        if !self.shape.columns().contains(&column) {
            return "";
        }
        match column {
            CARRIER_COLUMN => "",
            "Deal - ID" => &self.deal_id,
            PHONE_COLUMN => &self.phone,
            "First Name" => &self.first_name,
            "Deal - Value" => &self.value,
            "Deal - Owner" => &self.owner,
            "Deal - County" => &self.county,
            "Deal - Title" => &self.title,
            "Deal - Stage" => &self.stage,
            "Remarks" => &self.remarks,
            _ => "",
        }
    }
}

/// Cleaned records produced from one origin file, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutput {
    pub origin: String,
    pub records: Vec<CleanedRecord>,
}

impl FileOutput {
    /// The union of the columns used by the shapes present in this file, in
    /// canonical order. Mirrors how the previous tooling assembled a frame
    /// from heterogeneous row dictionaries.
    pub fn columns(&self) -> Vec<&'static str> {
        OUTPUT_COLUMNS
            .iter()
            .copied()
            .filter(|column| {
                self.records
                    .iter()
                    .any(|record| record.shape.columns().contains(column))
            })
            .collect()
    }
}

/// The result of one batch run: per-file outputs plus every diagnostic
/// collected along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub files: Vec<FileOutput>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchReport {
    /// Total number of cleaned records across all origin files.
    pub fn record_count(&self) -> usize {
        self.files.iter().map(|file| file.records.len()).sum()
    }
}
