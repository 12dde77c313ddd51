//! Batch-scoped lookup structures: the opt-out index, the deal-phone
//! authority index, and the intra-batch seen registry.

use std::collections::{BTreeSet, HashMap, hash_map::Entry};

use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::io::sources::{AuthorityFetcher, OptOutFetcher};
use crate::model::{CanonicalPhone, DealClaim, DealId, Diagnostic, DiagnosticKind};
use crate::normalize::canonicalize;

/// Maps a canonical phone to the opt-out lists that mention it. Read-only
/// once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptOutIndex {
    entries: HashMap<CanonicalPhone, BTreeSet<String>>,
}

impl OptOutIndex {
    /// Builds the index for an ordered list of source names. Values that do
    /// not normalize are skipped (they can never match); a source that fails
    /// to fetch degrades to a diagnostic and contributes nothing.
    #[instrument(level = "debug", skip(fetcher, diagnostics))]
    pub fn build(
        fetcher: &dyn OptOutFetcher,
        sources: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut entries: HashMap<CanonicalPhone, BTreeSet<String>> = HashMap::new();

        for source in sources {
            let values = match fetcher.fetch(source) {
                Ok(values) => values,
                Err(error) => {
                    warn!(source, %error, "opt-out source unavailable, treated as empty");
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SourceUnavailable,
                        source.clone(),
                        error.to_string(),
                    ));
                    continue;
                }
            };
            for value in &values {
                if let Ok(phone) = canonicalize(value) {
                    entries.entry(phone).or_default().insert(source.clone());
                }
            }
            debug!(source, value_count = values.len(), "opt-out source ingested");
        }

        Self { entries }
    }

    /// The lists that forbid contacting `phone`, if any.
    pub fn sources_for(&self, phone: &CanonicalPhone) -> Option<&BTreeSet<String>> {
        self.entries.get(phone)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lazily built, per-policy-key cache of opt-out indexes. A policy key is the
/// ordered list of source names a row's stage resolves to; each key is built
/// at most once per batch.
pub struct OptOutCache<'a> {
    fetcher: &'a dyn OptOutFetcher,
    built: HashMap<Vec<String>, OptOutIndex>,
}

impl<'a> OptOutCache<'a> {
    pub fn new(fetcher: &'a dyn OptOutFetcher) -> Self {
        Self {
            fetcher,
            built: HashMap::new(),
        }
    }

    /// Returns the index for `sources`, building and memoizing it on first
    /// use. Fetch failures surface as diagnostics, never as errors.
    pub fn index_for(
        &mut self,
        sources: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> &OptOutIndex {
        match self.built.entry(sources.to_vec()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(OptOutIndex::build(self.fetcher, sources, diagnostics))
            }
        }
    }
}

/// Maps a canonical phone to every deal/stage pair that already claims it in
/// the authority source. Accumulate-all: later records append rather than
/// replace, so the first element is the earliest claim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealPhoneIndex {
    entries: HashMap<CanonicalPhone, Vec<DealClaim>>,
}

impl DealPhoneIndex {
    /// Builds the index from every record set the fetcher yields. Unreadable
    /// record sets degrade to diagnostics.
    #[instrument(level = "debug", skip_all)]
    pub fn build(
        fetcher: &dyn AuthorityFetcher,
        config: &EngineConfig,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let mut index = Self::default();

        let batches = match fetcher.fetch() {
            Ok(batches) => batches,
            Err(error) => {
                warn!(%error, "authority source unavailable, index left empty");
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SourceUnavailable,
                    "authority",
                    error.to_string(),
                ));
                return index;
            }
        };

        for batch in batches {
            let rows = match batch.rows {
                Ok(rows) => rows,
                Err(error) => {
                    warn!(label = %batch.label, %error, "authority record set skipped");
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SourceUnavailable,
                        batch.label.clone(),
                        error.to_string(),
                    ));
                    continue;
                }
            };
            for row in &rows {
                let deal_id = row.get(&config.fields.deal_id).to_string();
                let stage = row.get(&config.fields.stage).to_string();
                for field in &config.phone_fields {
                    for piece in row.get(field).split(',') {
                        let piece = piece.trim();
                        if piece.is_empty() {
                            continue;
                        }
                        if let Ok(phone) = canonicalize(piece) {
                            index.entries.entry(phone).or_default().push(DealClaim {
                                deal_id: deal_id.clone(),
                                stage: stage.clone(),
                            });
                        }
                    }
                }
            }
            debug!(label = %batch.label, row_count = rows.len(), "authority records ingested");
        }

        index
    }

    /// All recorded claims on `phone`, oldest first.
    pub fn claims(&self, phone: &CanonicalPhone) -> &[DealClaim] {
        self.entries
            .get(phone)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of claiming a phone for a deal during the duplicate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The phone had not been seen this batch; it is now registered.
    New,
    /// The phone was already registered to the same deal earlier this batch.
    AlreadyOwned,
    /// The phone belongs to an earlier deal in this batch.
    OwnedBy(DealId),
}

/// First-claim registry for one batch run. Strictly sequential: row order
/// decides which deal wins a contested phone.
#[derive(Debug, Default)]
pub struct SeenRegistry {
    first_claims: HashMap<CanonicalPhone, DealId>,
}

impl SeenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `deal_id` as the owner of `phone` unless an earlier deal
    /// already claimed it.
    pub fn claim(&mut self, phone: &CanonicalPhone, deal_id: &str) -> ClaimOutcome {
        match self.first_claims.get(phone) {
            Some(owner) if owner == deal_id => ClaimOutcome::AlreadyOwned,
            Some(owner) => ClaimOutcome::OwnedBy(owner.clone()),
            None => {
                self.first_claims.insert(phone.clone(), deal_id.to_string());
                ClaimOutcome::New
            }
        }
    }
}
