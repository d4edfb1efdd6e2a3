//! Writes a seeded synthetic raw input set: the three source CSV files and the
//! combined JSON summary, with the free-text noise the cleaning stage handles.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::info;

use medstat::constants;
use medstat::logging;

#[derive(Parser)]
#[command(name = "generate-sample-data")]
#[command(about = "Generate a synthetic raw input set for medstat")]
struct Cli {
    /// Directory receiving the raw files
    #[arg(long, default_value = "data/raw_data")]
    output_dir: PathBuf,

    /// Random seed
    #[arg(long, default_value_t = constants::DEFAULT_SEED)]
    seed: u64,

    /// Number of monthly observations per hospital
    #[arg(long, default_value_t = 60)]
    months: u32,

    /// Number of publications
    #[arg(long, default_value_t = 80)]
    publications: usize,
}

const HOSPITALS: [(&str, &str); 5] = [
    ("St. Mary's Hospital", "boston"),
    ("General Hospital", "Boston "),
    ("Mercy Medical Center", "new york"),
    ("Riverside Clinic", "NEW YORK"),
    ("Northside Hospital", "chicago"),
];

const JOURNALS: [&str; 4] = ["Ann Surg.", "Surg Endosc.", "J Am Coll Surg.", "HPB (Oxford)."];
const TOPICS: [&str; 5] = [
    "Laparoscopic cholecystectomy outcomes",
    "Gallstone disease incidence",
    "Same-day discharge after cholecystectomy",
    "Bile duct injury rates",
    "Regional variation in biliary surgery",
];
const SURNAMES: [&str; 6] = ["Smith", "Nguyen", "Garcia", "Okafor", "Lee", "Kowalski"];

type Table = Vec<Vec<(&'static str, String)>>;

/// Standard normal draw (Box-Muller)
fn normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn noisy_count(rng: &mut StdRng, count: u64) -> String {
    match rng.gen_range(0..10) {
        0 => "not reported".to_string(),
        1 => format!("cases: {} this month", count),
        2 => format!("about {} surgeries", count),
        _ => count.to_string(),
    }
}

fn noisy_date(rng: &mut StdRng, date: NaiveDate) -> String {
    match rng.gen_range(0..20) {
        0 => "unknown".to_string(),
        1 | 2 => date.format("%m/%d/%Y").to_string(),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

fn hospital_and_statistics(rng: &mut StdRng, months: u32) -> (Table, Table) {
    let start = NaiveDate::from_ymd_opt(2018, 1, 15).unwrap_or_default();
    let mut hospitals = Vec::new();
    let mut statistics = Vec::new();

    for (h, (name, location)) in HOSPITALS.iter().enumerate() {
        let base = 80.0 + 15.0 * h as f64;
        for t in 0..months {
            let Some(date) = start.checked_add_months(Months::new(t)) else {
                continue;
            };
            let season = 20.0 * (2.0 * PI * f64::from(date.month0()) / 12.0).sin();
            let value = base + 0.5 * f64::from(t) + season + 6.0 * normal(rng);
            let count = value.max(0.0).round() as u64;

            let row = vec![
                ("hospital_name", name.to_string()),
                ("date", noisy_date(rng, date)),
                ("surgery_count", noisy_count(rng, count)),
                ("location", location.to_string()),
            ];
            // Occasional re-submitted row
            if rng.gen_bool(0.02) {
                hospitals.push(row.clone());
            }
            hospitals.push(row);

            let improvement = 8.5 + 1.5 * normal(rng);
            let complication = (2.0 + 0.5 * normal(rng)).max(0.1);
            let data = match rng.gen_range(0..8) {
                0 => "figures pending".to_string(),
                1 => format!("improvement of {:.1} percent", improvement),
                _ => format!("improvement of {:.1} percent and {:.1}% complications", improvement, complication),
            };
            statistics.push(vec![
                ("source", "https://registry.example/surgical-outcomes".to_string()),
                ("hospital_name", name.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("data", data),
            ]);
        }
    }
    (hospitals, statistics)
}

fn publications(rng: &mut StdRng, n: usize) -> Table {
    (0..n)
        .map(|i| {
            let year = rng.gen_range(2018..=2022);
            let topic = TOPICS[rng.gen_range(0..TOPICS.len())];
            let journal = JOURNALS[rng.gen_range(0..JOURNALS.len())];
            let first = SURNAMES[rng.gen_range(0..SURNAMES.len())];
            let second = SURNAMES[rng.gen_range(0..SURNAMES.len())];
            let date = if rng.gen_bool(0.05) {
                "Epub ahead of print".to_string()
            } else {
                format!("{} {} Mar;{}({}):{}", journal, year, 200 + i, 1 + i % 12, 10 + i)
            };
            vec![
                ("title", format!("{}: cohort {}.", topic, i % (n / 2).max(1))),
                ("authors", format!("{} J, {} A", first, second)),
                ("date", date),
                ("source", "PubMed".to_string()),
            ]
        })
        .collect()
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("failed to create {}", path.display()))?;
    if let Some(first) = table.first() {
        writer.write_record(first.iter().map(|(k, _)| *k))?;
    }
    for row in table {
        writer.write_record(row.iter().map(|(_, v)| v.as_str()))?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = table.len(), "Wrote raw CSV");
    Ok(())
}

fn to_json(table: &Table) -> Value {
    Value::Array(
        table
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = row
                    .iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect(),
    )
}

fn main() -> Result<()> {
    logging::init_console_only();
    let cli = Cli::parse();
    let mut rng = StdRng::seed_from_u64(cli.seed);

    let (hospitals, statistics) = hospital_and_statistics(&mut rng, cli.months);
    let pubmed = publications(&mut rng, cli.publications);

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;
    write_csv(&cli.output_dir.join(constants::PUBMED_RAW_FILE), &pubmed)?;
    write_csv(&cli.output_dir.join(constants::HOSPITAL_RAW_FILE), &hospitals)?;
    write_csv(&cli.output_dir.join(constants::STATISTICS_RAW_FILE), &statistics)?;

    let combined = json!({
        "data_sources": {
            "pubmed": to_json(&pubmed),
            "hospitals": to_json(&hospitals),
            "statistics": to_json(&statistics),
        },
        "generated_with_seed": cli.seed,
    });
    let combined_path = cli.output_dir.join(constants::COMBINED_RAW_FILE);
    fs::write(&combined_path, serde_json::to_string_pretty(&combined)?)
        .with_context(|| format!("failed to write {}", combined_path.display()))?;

    println!(
        "✅ Sample data written to {} ({} hospital rows, {} statistics rows, {} publications)",
        cli.output_dir.display(),
        hospitals.len(),
        statistics.len(),
        pubmed.len()
    );
    Ok(())
}
