//! The row reconciler: decides which phone (if any) survives into the
//! output for one input row and assembles its remarks.
//!
//! Passes run in strict order; each later pass only sees numbers that
//! survived the earlier ones:
//!
//! 1. format — normalize every candidate, remark on failures
//! 2. opt-out — drop numbers on the do-not-contact lists, remark per list
//! 3. authority conflict — numbers already claimed by another deal on a
//!    different stage block the row from acquiring a chosen phone
//! 4. intra-batch duplicate — first genuinely new number wins the row
//! 5. arbitration — strict keeps everything as computed; lenient suppresses
//!    format-only noise and withdraws the phone on any harder remark

use std::collections::BTreeMap;

use crate::config::{ArbitrationMode, EngineConfig};
use crate::error::{CleanError, Result};
use crate::fields::{extract_first_name, format_county, owner_first_token};
use crate::index::{ClaimOutcome, DealPhoneIndex, OptOutIndex, SeenRegistry};
use crate::model::{CanonicalPhone, CleanedRecord, RawDealRow};
use crate::normalize::canonicalize;

/// Remarks grouped by category. Rendering order is fixed: format, opt-out,
/// authority conflict, duplicate.
#[derive(Debug, Default)]
struct Remarks {
    format: Vec<String>,
    opt_out: Vec<String>,
    conflict: Vec<String>,
    duplicate: Vec<String>,
}

impl Remarks {
    fn has_non_format(&self) -> bool {
        !(self.opt_out.is_empty() && self.conflict.is_empty() && self.duplicate.is_empty())
    }

    fn render(&self) -> String {
        [&self.format, &self.opt_out, &self.conflict, &self.duplicate]
            .into_iter()
            .filter(|category| !category.is_empty())
            .map(|category| category.join("; "))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Reconciles one row against the policy-selected opt-out index, the
/// authority index, and the batch's seen registry.
///
/// Returns `Ok(None)` when the row's stage maps to no configured output
/// shape; `Err` only for a row that cannot be processed at all (it is then
/// skipped with a diagnostic, never failing the batch).
pub fn reconcile_row(
    row: &RawDealRow,
    config: &EngineConfig,
    opt_out: &OptOutIndex,
    deal_index: &DealPhoneIndex,
    seen: &mut SeenRegistry,
) -> Result<Option<CleanedRecord>> {
    let deal_id = row.get(&config.fields.deal_id).trim().to_string();
    if deal_id.is_empty() {
        return Err(CleanError::Row("row has no deal id".into()));
    }
    let stage = row.get(&config.fields.stage);

    let mut remarks = Remarks::default();

    // Format pass: candidates in field order, then within-field order.
    let mut remaining: Vec<CanonicalPhone> = Vec::new();
    for field in &config.phone_fields {
        for piece in row.get(field).split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            match canonicalize(piece) {
                Ok(phone) => remaining.push(phone),
                Err(error) => remarks.format.push(format!(
                    "Phone number {} has incorrect format even after normalization",
                    error.raw
                )),
            }
        }
    }

    // Opt-out pass: matched numbers never become the chosen phone, but the
    // rest of the row is still evaluated.
    let mut opt_out_matches: BTreeMap<String, Vec<CanonicalPhone>> = BTreeMap::new();
    remaining.retain(|phone| match opt_out.sources_for(phone) {
        Some(sources) => {
            for source in sources {
                opt_out_matches
                    .entry(source.clone())
                    .or_default()
                    .push(phone.clone());
            }
            false
        }
        None => true,
    });
    for (source, phones) in &opt_out_matches {
        let noun = if phones.len() > 1 { "numbers" } else { "number" };
        let joined = phones
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        remarks
            .opt_out
            .push(format!("Phone {noun} {joined} exist in {source}"));
    }

    // Authority-conflict pass: any claim on a different stage blocks the row
    // from acquiring a chosen phone.
    let mut disallowed = false;
    for phone in &remaining {
        for claim in deal_index.claims(phone) {
            if claim.stage != stage {
                let remark = format!(
                    "{phone} exists in Deal ID {} on stage {} (PD Phone Numbers)",
                    claim.deal_id, claim.stage
                );
                if !remarks.conflict.contains(&remark) {
                    remarks.conflict.push(remark);
                }
                disallowed = true;
            }
        }
    }

    // Intra-batch duplicate pass: the first number not claimed by an earlier
    // deal becomes the chosen phone; the rest are only checked for
    // duplication.
    let mut chosen: Option<CanonicalPhone> = None;
    if !disallowed {
        for phone in &remaining {
            match seen.claim(phone, &deal_id) {
                ClaimOutcome::OwnedBy(first_deal) => remarks.duplicate.push(format!(
                    "Phone number {phone} already exists in Deal ID {first_deal}"
                )),
                ClaimOutcome::New | ClaimOutcome::AlreadyOwned => {
                    if chosen.is_none() {
                        chosen = Some(phone.clone());
                    }
                }
            }
        }
    }

    // Final arbitration.
    let (chosen, remark_text) = match config.arbitration {
        ArbitrationMode::Strict => (chosen, remarks.render()),
        ArbitrationMode::Lenient => match chosen {
            None => (None, remarks.render()),
            Some(_) if remarks.has_non_format() => (None, remarks.render()),
            Some(phone) => (Some(phone), String::new()),
        },
    };

    // Row shaping: stages outside every configured group are dropped.
    let Some(shape) = config.shape_policy.shape_for(stage) else {
        return Ok(None);
    };

    Ok(Some(CleanedRecord {
        shape,
        deal_id,
        phone: chosen.map(|phone| phone.to_string()).unwrap_or_default(),
        first_name: extract_first_name(
            row.get(&config.fields.contact_person),
            row.get(&config.fields.title),
            &config.placeholder_names,
        ),
        value: row.get(&config.fields.value).to_string(),
        owner: owner_first_token(row.get(&config.fields.owner)),
        county: format_county(row.get(&config.fields.county)),
        title: row.get(&config.fields.title).to_string(),
        stage: stage.to_string(),
        remarks: remark_text,
    }))
}
