use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use medstat::analysis::charts::ChartFilter;
use medstat::analysis::Outcome;
use medstat::app::results_use_case::PipelineResults;
use medstat::app::PipelineUseCase;
use medstat::config::Config;
use medstat::{logging, metrics};

#[derive(Parser)]
#[command(name = "medstat")]
#[command(about = "Cleaning, fusion and statistical analysis of surgical activity records")]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults to MEDSTAT_CONFIG or ./config.toml
    #[arg(long, global = true, env = "MEDSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the raw source files
    #[arg(long, global = true, env = "MEDSTAT_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory receiving processed datasets, results and figures
    #[arg(long, global = true, env = "MEDSTAT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Clustering seed
    #[arg(long, global = true, env = "MEDSTAT_SEED")]
    seed: Option<u64>,

    /// Read combined_data.json instead of the per-source CSV files
    #[arg(long, global = true)]
    combined_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, fuse, analyze and persist results
    Run,
    /// Run the cleaning stage only
    Clean,
    /// Analyze previously processed datasets
    Analyze,
    /// Rebuild chart instructions for a selection of locations and dates
    Chart(ChartArgs),
}

#[derive(Args)]
struct ChartArgs {
    /// Location to keep (repeatable); all locations when omitted
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Inclusive start date, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Inclusive end date, YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl ChartArgs {
    fn filter(&self) -> ChartFilter {
        ChartFilter {
            locations: (!self.locations.is_empty())
                .then(|| self.locations.iter().cloned().collect::<BTreeSet<String>>()),
            start: self.start,
            end: self.end,
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = &cli.input_dir {
        config.paths.input_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }
    if let Some(seed) = cli.seed {
        config.analysis.seed = seed;
    }
    if cli.combined_json {
        config.paths.use_combined_json = true;
    }
    Ok(config)
}

fn print_summary(results: &PipelineResults) {
    fn status<T>(outcome: &Outcome<T>) -> String {
        outcome.shortfall().unwrap_or_else(|| "complete".to_string())
    }

    println!("\n📊 Analysis results (run key {}):", &results.metadata.run_key[..12]);
    println!("   Temporal:     {}", status(&results.analyses.temporal.outcome));
    println!("   Geographical: {}", status(&results.analyses.geographical.outcome));
    println!("   Correlation:  {}", status(&results.analyses.correlation.outcome));
    println!("   Clustering:   {}", status(&results.analyses.clustering.outcome));
    for (dataset, quality) in &results.data_quality.datasets {
        println!("   {} rows in {}", quality.record_count, dataset);
    }
    if !results.diagnostics.is_empty() {
        println!("\n⚠️  {} diagnostics recorded in processing_metadata.json", results.diagnostics.len());
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let _guard = logging::init_logging(&config.logging.directory, &config.logging.file_prefix);
    metrics::init_metrics();

    let pipeline = PipelineUseCase::new(config);
    let outcome = match &cli.command {
        Commands::Run => pipeline.run().map(|results| print_summary(&results)),
        Commands::Clean => pipeline.clean().map(|cleaned| {
            println!("\n🧹 Cleaning complete:");
            for (dataset, stats) in &cleaned.stats {
                println!(
                    "   {}: {} in, {} out ({} dropped, {} duplicates)",
                    dataset, stats.input_rows, stats.output_rows, stats.dropped_rows, stats.duplicate_rows
                );
            }
        }),
        Commands::Analyze => pipeline.analyze().map(|results| print_summary(&results)),
        Commands::Chart(args) => pipeline.chart(&args.filter()).map(|charts| {
            for chart in &charts {
                println!("   {} → {}", chart.title, chart.figure);
            }
        }),
    };

    if let Err(e) = &outcome {
        error!("Pipeline failed: {:#}", e);
    } else {
        info!("Done");
    }
    outcome
}
