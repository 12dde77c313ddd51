//! Core library for the dealscrub command line application.
//!
//! The library exposes the phone reconciliation engine that powers the
//! command-line interface as well as the unit tests. The modules are
//! structured to keep responsibilities narrow and composable: normalization
//! lives in [`normalize`], the batch-scoped lookup structures in [`index`],
//! the per-row decision policy in [`reconcile`], orchestration in [`batch`],
//! and the spreadsheet and source adapters under [`io`].

pub mod batch;
pub mod config;
pub mod error;
pub mod fields;
pub mod index;
pub mod io;
pub mod model;
pub mod normalize;
pub mod reconcile;

pub use error::{CleanError, PhoneFormatError, Result};
