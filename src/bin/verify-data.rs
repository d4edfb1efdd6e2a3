//! Prints an overview of the processed datasets in an output directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;

use medstat::app::ports::DatasetSourcePort;
use medstat::config::Config;
use medstat::domain::CanonicalRow;
use medstat::infra::CsvDatasetAdapter;
use medstat::logging;
use medstat::pipeline::processing::quality_gate::DatasetQuality;

#[derive(Parser)]
#[command(name = "verify-data")]
#[command(about = "Overview of medstat processed datasets")]
struct Cli {
    /// Directory holding `<dataset>_processed.csv`; defaults to the configured output directory
    #[arg(long, env = "MEDSTAT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

fn overview<T: CanonicalRow>(rows: &[T], dates: impl Iterator<Item = NaiveDate>) {
    let quality = DatasetQuality::assess(rows);
    println!("\n📁 {} ({} rows)", T::dataset(), quality.record_count);
    println!("   Columns: {}", quality.columns.join(", "));

    let (min, max) = dates.fold((None, None), |(lo, hi): (Option<NaiveDate>, Option<NaiveDate>), d| {
        (Some(lo.map_or(d, |l| l.min(d))), Some(hi.map_or(d, |h| h.max(d))))
    });
    if let (Some(min), Some(max)) = (min, max) {
        println!("   Date range: {} to {}", min, max);
    }

    let missing: Vec<String> = quality
        .missing_by_column
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(c, n)| format!("{}={}", c, n))
        .collect();
    if missing.is_empty() {
        println!("   Missing values: none");
    } else {
        println!("   Missing values: {}", missing.join(", "));
    }
}

fn main() -> Result<()> {
    logging::init_console_only();
    let cli = Cli::parse();
    let output_dir = match cli.output_dir {
        Some(dir) => dir,
        None => Config::load(None)?.paths.output_dir,
    };

    let store = CsvDatasetAdapter::new(&output_dir);
    let datasets = store.read_canonical()?;
    let fused = store.read_fused()?;

    println!("🔎 Processed data in {}", output_dir.display());
    overview(&datasets.publications, datasets.publications.iter().map(|p| p.date));
    overview(&datasets.hospital, datasets.hospital.iter().map(|h| h.date));
    overview(&datasets.statistics, datasets.statistics.iter().filter_map(|s| s.date));
    overview(&fused, fused.iter().map(|r| r.date));

    let mut locations: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &fused {
        *locations.entry(row.location.as_deref().unwrap_or("(missing)")).or_default() += 1;
    }
    println!("\n📍 Location distribution:");
    for (location, count) in locations {
        println!("   {}: {}", location, count);
    }
    Ok(())
}
