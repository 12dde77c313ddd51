//! Batch orchestration: index construction, pre-flight schema checks, and
//! streaming every origin row through the reconciler.

use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::index::{DealPhoneIndex, OptOutCache, SeenRegistry};
use crate::io::sources::{AuthorityFetcher, OptOutFetcher};
use crate::model::{
    BatchReport, CleanedRecord, Diagnostic, DiagnosticKind, FileOutput, OriginFile, RawDealRow,
};
use crate::reconcile::reconcile_row;

/// One batch run over a set of origin files.
///
/// The engine owns everything with batch lifetime: the lazily built per-policy
/// opt-out indexes, the authority index, the seen registry, and the
/// accumulating diagnostics. Nothing is persisted across runs.
pub struct Engine<'a> {
    config: &'a EngineConfig,
    opt_out: OptOutCache<'a>,
    deal_index: DealPhoneIndex,
    seen: SeenRegistry,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Engine<'a> {
    /// Builds the authority index up front; opt-out indexes are built lazily,
    /// once per policy key encountered in the batch.
    #[instrument(level = "info", skip_all)]
    pub fn new(
        config: &'a EngineConfig,
        opt_out_fetcher: &'a dyn OptOutFetcher,
        authority_fetcher: &dyn AuthorityFetcher,
    ) -> Self {
        let mut diagnostics = Vec::new();
        let deal_index = DealPhoneIndex::build(authority_fetcher, config, &mut diagnostics);
        info!(phone_count = deal_index.len(), "deal-phone index built");
        Self {
            config,
            opt_out: OptOutCache::new(opt_out_fetcher),
            deal_index,
            seen: SeenRegistry::new(),
            diagnostics,
        }
    }

    /// Records that an origin file could not be loaded. The batch proceeds
    /// without it.
    pub fn record_unavailable(&mut self, subject: impl Into<String>, detail: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::SourceUnavailable,
            subject,
            detail,
        ));
    }

    /// Runs the batch over `files` in order and consumes the engine; the seen
    /// registry does not outlive the run.
    #[instrument(level = "info", skip_all, fields(file_count = files.len()))]
    pub fn run(mut self, files: Vec<OriginFile>) -> BatchReport {
        let mut outputs = Vec::new();

        for file in files {
            let missing = self.missing_columns(&file);
            if !missing.is_empty() {
                warn!(file = %file.name, ?missing, "origin file rejected by schema check");
                let error = crate::error::CleanError::Schema {
                    file: file.name.clone(),
                    missing,
                };
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SchemaError,
                    file.name.clone(),
                    error.to_string(),
                ));
                continue;
            }

            let mut records: Vec<CleanedRecord> = Vec::new();
            for (row_idx, row) in file.rows.iter().enumerate() {
                match self.reconcile(row) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(error) => {
                        // Header occupies the first spreadsheet row.
                        let subject = format!("{}:{}", file.name, row_idx + 2);
                        warn!(%subject, %error, "row skipped");
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::RowError,
                            subject,
                            error.to_string(),
                        ));
                    }
                }
            }

            info!(
                file = %file.name,
                row_count = file.rows.len(),
                record_count = records.len(),
                "origin file reconciled"
            );
            outputs.push(FileOutput {
                origin: file.name,
                records,
            });
        }

        BatchReport {
            files: outputs,
            diagnostics: self.diagnostics,
        }
    }

    fn reconcile(&mut self, row: &RawDealRow) -> crate::error::Result<Option<CleanedRecord>> {
        let config = self.config;
        let stage = row.get(&config.fields.stage);
        let sources = config.opt_out.sources_for(stage);
        let opt_out = self.opt_out.index_for(sources, &mut self.diagnostics);
        reconcile_row(row, config, opt_out, &self.deal_index, &mut self.seen)
    }

    fn missing_columns(&self, file: &OriginFile) -> Vec<String> {
        self.config
            .fields
            .required()
            .iter()
            .filter(|required| !file.columns.iter().any(|c| c == *required))
            .map(|required| required.to_string())
            .collect()
    }
}
