use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dealscrub::batch::Engine;
use dealscrub::config::{ArbitrationMode, EngineConfig, ShapePolicy};
use dealscrub::io::excel_read;
use dealscrub::io::excel_write::{self, CarrierLookup};
use dealscrub::io::sources::{DirAuthorityFetcher, DirOptOutFetcher};
use dealscrub::model::OriginFile;
use dealscrub::{CleanError, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| CleanError::Logging(error.to_string()))?;

    match cli.command {
        Command::Clean(args) => execute_clean(args),
    }
}

fn execute_clean(args: CleanArgs) -> Result<()> {
    if !args.input.is_dir() {
        return Err(CleanError::MissingInput(args.input));
    }

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.arbitration = mode.into();
    }
    if args.universal {
        config.shape_policy = ShapePolicy::Universal;
    }

    let opt_out_fetcher = DirOptOutFetcher::new(&args.opt_out);
    let authority_fetcher = DirAuthorityFetcher::new(&args.authority);
    let mut engine = Engine::new(&config, &opt_out_fetcher, &authority_fetcher);

    let mut input_paths: Vec<PathBuf> = fs::read_dir(&args.input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
                .unwrap_or(false)
        })
        .collect();
    input_paths.sort();

    let mut files: Vec<OriginFile> = Vec::with_capacity(input_paths.len());
    for path in &input_paths {
        match excel_read::read_origin_file(path) {
            Ok(file) => files.push(file),
            Err(error) => {
                warn!(path = %path.display(), %error, "origin file skipped");
                engine.record_unavailable(path.display().to_string(), error.to_string());
            }
        }
    }

    let report = engine.run(files);

    fs::create_dir_all(&args.output)?;
    for file in &report.files {
        if file.records.is_empty() {
            continue;
        }
        let stem = file
            .origin
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file.origin);
        let path = args.output.join(format!("{stem}_cleaned.xlsx"));
        excel_write::write_file_output(&path, file)?;
        info!(path = %path.display(), record_count = file.records.len(), "cleaned file written");
    }

    if let Some(merged_path) = &args.merged {
        let carrier = args
            .carrier_sheet
            .as_ref()
            .map(|sheet| CarrierLookup { sheet: sheet.clone() });
        let merged: Vec<_> = report
            .files
            .iter()
            .filter(|file| !file.records.is_empty())
            .cloned()
            .collect();
        excel_write::write_merged(merged_path, &merged, carrier.as_ref())?;
        info!(path = %merged_path.display(), sheet_count = merged.len(), "merged export written");
    }

    for diagnostic in &report.diagnostics {
        warn!(
            kind = ?diagnostic.kind,
            subject = %diagnostic.subject,
            detail = %diagnostic.detail,
            "batch diagnostic"
        );
    }
    info!(
        file_count = report.files.len(),
        record_count = report.record_count(),
        diagnostic_count = report.diagnostics.len(),
        "batch finished"
    );

    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile deal phone lists against opt-out and authority sources."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one cleaning batch over a folder of deal exports.
    Clean(CleanArgs),
}

#[derive(clap::Args)]
struct CleanArgs {
    /// Folder containing the origin .xlsx exports to clean.
    #[arg(long)]
    input: PathBuf,

    /// Folder containing the opt-out list files.
    #[arg(long)]
    opt_out: PathBuf,

    /// Folder containing the authority phone workbooks.
    #[arg(long)]
    authority: PathBuf,

    /// Folder the cleaned workbooks are written to.
    #[arg(long)]
    output: PathBuf,

    /// Optional JSON configuration overriding the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Arbitration mode override.
    #[arg(long, value_enum)]
    mode: Option<ModeKind>,

    /// Keep every row and render the full column set, regardless of stage.
    #[arg(long)]
    universal: bool,

    /// Also write a single multi-sheet export to this path.
    #[arg(long)]
    merged: Option<PathBuf>,

    /// Carrier table sheet referenced by the lookup formula in the merged
    /// export.
    #[arg(long, requires = "merged")]
    carrier_sheet: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeKind {
    Strict,
    Lenient,
}

impl From<ModeKind> for ArbitrationMode {
    fn from(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Strict => ArbitrationMode::Strict,
            ModeKind::Lenient => ArbitrationMode::Lenient,
        }
    }
}
