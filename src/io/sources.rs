//! Fetcher seams between the engine and whatever transport delivers the
//! opt-out lists and authority records (local folders here; the engine never
//! knows where the bytes came from).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CleanError, Result};
use crate::io::excel_read;
use crate::model::RawDealRow;

/// One authority record set, e.g. a single workbook from the authority
/// folder.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    /// Human-readable origin of the records, used in diagnostics and logs.
    pub label: String,
    pub rows: Vec<RawDealRow>,
}

/// Supplies the raw phone values of a named opt-out list.
pub trait OptOutFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<String>>;
}

/// One authority record set as delivered by the fetcher: its rows, or the
/// error that made the set unreadable. The label survives either way so a
/// diagnostic can name the file.
#[derive(Debug)]
pub struct AuthorityBatch {
    pub label: String,
    pub rows: Result<Vec<RawDealRow>>,
}

/// Supplies the authority record sets claiming phones for existing deals.
pub trait AuthorityFetcher {
    /// Yields one entry per record set, in a stable order. An unreadable set
    /// is an `Err` entry so the index builder can skip it and keep the rest;
    /// only a failure to enumerate the sets at all is a top-level error.
    fn fetch(&self) -> Result<Vec<AuthorityBatch>>;
}

/// Resolves opt-out source names against files in a directory. Flat files
/// contribute one phone per line; workbooks contribute every cell of every
/// sheet.
pub struct DirOptOutFetcher {
    dir: PathBuf,
}

impl DirOptOutFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl OptOutFetcher for DirOptOutFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<String>> {
        let path = self.dir.join(source);
        if !path.exists() {
            return Err(CleanError::MissingInput(path));
        }
        if is_workbook(&path) {
            return excel_read::read_phone_list(&path);
        }
        let content = fs::read_to_string(&path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Reads every workbook in a folder as one authority record set each, in
/// file-name order.
pub struct DirAuthorityFetcher {
    dir: PathBuf,
}

impl DirAuthorityFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AuthorityFetcher for DirAuthorityFetcher {
    fn fetch(&self) -> Result<Vec<AuthorityBatch>> {
        if !self.dir.is_dir() {
            return Err(CleanError::MissingInput(self.dir.clone()));
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_workbook(path))
            .collect();
        paths.sort();

        let mut batches = Vec::with_capacity(paths.len());
        for path in paths {
            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            batches.push(AuthorityBatch {
                label,
                rows: excel_read::read_rows(&path),
            });
        }
        Ok(batches)
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false)
}

/// In-memory opt-out fetcher for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticOptOutFetcher {
    sources: BTreeMap<String, Vec<String>>,
}

impl StaticOptOutFetcher {
    pub fn new<I, K, V>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<V>)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|(name, values)| {
                    (
                        name.into(),
                        values.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl OptOutFetcher for StaticOptOutFetcher {
    fn fetch(&self, source: &str) -> Result<Vec<String>> {
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| CleanError::MissingInput(PathBuf::from(source)))
    }
}

/// In-memory authority fetcher for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorityFetcher {
    batches: Vec<RecordBatch>,
}

impl StaticAuthorityFetcher {
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }
}

impl AuthorityFetcher for StaticAuthorityFetcher {
    fn fetch(&self) -> Result<Vec<AuthorityBatch>> {
        Ok(self
            .batches
            .iter()
            .cloned()
            .map(|batch| AuthorityBatch {
                label: batch.label,
                rows: Ok(batch.rows),
            })
            .collect())
    }
}
