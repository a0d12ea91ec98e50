//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - merges the optional TOML config with CLI overrides
//! - opens the directory stores
//! - runs one pipeline operation and prints its summary

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FilterArgs, FitArgs, RejectArgs};
use crate::domain::{FilterConfig, FitConfig, PipelineConfig, RejectConfig};
use crate::error::AppError;
use crate::filter::{ClusterStrategies, RegimeFilter};
use crate::fit::CurveFitter;
use crate::io::LoadBasis;
use crate::reject::{OutlierRejector, RejectionSummary};
use crate::store::{FitDirectory, FitStore, SeriesDirectory};

pub mod pipeline;

/// Entry point for the `hrc` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Filter(args) => handle_filter(args, config.filter),
        Command::Fit(args) => handle_fit(args, config.fit),
        Command::Reject(args) => handle_reject(args, config.reject),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn handle_filter(args: FilterArgs, mut config: FilterConfig) -> Result<(), AppError> {
    args.apply(&mut config);
    let filter = RegimeFilter::new(ClusterStrategies::default(), config)?;

    let basis = if args.gross_load { LoadBasis::Gross } else { LoadBasis::Net };
    let source = SeriesDirectory::new(&args.source).with_basis(basis);
    let mut dest = SeriesDirectory::new(&args.dest);

    let groups = pipeline::run_filter(&source, &mut dest, &filter)?;
    for group in groups {
        println!("{group}: {}", dest.path_for(&group).display());
    }
    Ok(())
}

fn handle_fit(args: FitArgs, mut config: FitConfig) -> Result<(), AppError> {
    args.apply(&mut config);
    let fitter = CurveFitter::new(config)?;

    let source = SeriesDirectory::new(&args.source);
    let mut out = FitDirectory::new(&args.out, &fitter.config().extension)?;

    for table in pipeline::run_fit(&source, &fitter, &mut out)? {
        println!(
            "{}: {} rows, {} fitted",
            table.group_type,
            table.rows.len(),
            table.fitted_count()
        );
    }
    Ok(())
}

fn handle_reject(args: RejectArgs, mut config: RejectConfig) -> Result<(), AppError> {
    args.apply(&mut config);
    let rejector = OutlierRejector::new(config)?;

    let mut source = FitDirectory::new(&args.fits, &rejector.config().extension)?;
    let mut dest = match &args.dest {
        Some(path) => Some(FitDirectory::new(path, &rejector.config().extension)?),
        None => None,
    };

    let summaries = pipeline::run_reject(
        &mut source,
        dest.as_mut().map(|d| d as &mut dyn FitStore),
        &rejector,
    )?;
    for summary in &summaries {
        println!("{}", format_summary(summary));
    }
    Ok(())
}

fn format_summary(summary: &RejectionSummary) -> String {
    if summary.skipped {
        return format!(
            "{}: skipped ({} fitted units)",
            summary.group, summary.fitted_units
        );
    }
    match (summary.stats, summary.band) {
        (Some(stats), Some(band)) => format!(
            "{}: n={} mean={:.3} stdev={:.3} band=[{:.3}, {:.3}] failed={}",
            summary.group,
            stats.n,
            stats.mean,
            stats.stdev,
            band.lower,
            band.upper,
            summary.failed.len()
        ),
        _ => format!("{}: no defined minima", summary.group),
    }
}
