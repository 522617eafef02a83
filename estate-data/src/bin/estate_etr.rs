use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use estate_data::{BandTableLoader, RunConfig, run, write_outputs};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compute effective estate-tax rates from a band table and write chart data.
///
/// The CSV file has one row per country, with columns by position:
/// - country: Country name
/// - gdp_ratio: Estate tax revenue as a fraction of GDP (e.g., 0.0027)
/// - residence_allowance, taper_threshold, taper_fraction: Optional tapered
///   allowance, in multiples of average earnings
/// - threshold_N, rate_N: Repeating band pairs; the first must start at 0
#[derive(Parser, Debug)]
#[command(name = "estate-etr")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing the band table
    #[arg(short, long)]
    file: PathBuf,

    /// TOML file with sweep settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest estate value, in multiples of average earnings
    #[arg(long)]
    max_multiple: Option<Decimal>,

    /// Step between estate values
    #[arg(long)]
    step_size: Option<Decimal>,

    /// Skip countries with malformed rows instead of aborting
    #[arg(long, default_value_t = false)]
    skip_invalid: bool,

    /// Directory the chart data is written to
    #[arg(short, long, default_value = "charts")]
    out_dir: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RunConfig::default(),
    }
    .with_overrides(args.max_multiple, args.step_size, args.skip_invalid)
    .context("Invalid sweep settings")?;

    println!("Loading band table from: {}", args.file.display());

    let records = BandTableLoader::load_from_file(&args.file)
        .with_context(|| format!("Failed to read band table: {}", args.file.display()))?;

    println!("Parsed {} countries from CSV", records.len());

    let report = run(&records, &config.sweep, config.policy())
        .context("Failed to compute effective rates")?;

    for outcome in report.charted() {
        let series = outcome.series();
        info!(
            country = %series.country,
            max_effective_rate = %series.max_effective_rate.round_dp(4),
            max_statutory_rate = %series.max_statutory_rate,
            "charted"
        );
    }

    let paths = write_outputs(&report, &args.out_dir)
        .with_context(|| format!("Failed to write chart data to: {}", args.out_dir.display()))?;

    println!(
        "Charted {} countries, excluded {} ({} malformed).",
        report.comparison.summaries().len(),
        report.excluded.len(),
        report.skipped().count()
    );
    println!("Effective rates written to: {}", paths.effective_rates.display());
    println!("Comparison written to: {}", paths.comparison.display());

    Ok(())
}
