use crate::domain::StatisticsRecord;
use crate::pipeline::ingestion::RawRecord;
use crate::pipeline::processing::normalize::{Cleaner, IntoRaw, Parsed};
use crate::pipeline::processing::parser::{mean, normalize_name, parse_date, parse_percentage_list, ParseError};

/// Cleaner for aggregated statistics records.
///
/// Pass-through: no row is dropped and no deduplication happens, so input order
/// is preserved exactly.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticsCleaner;

impl Cleaner for StatisticsCleaner {
    type Row = StatisticsRecord;

    fn parse_row(&self, record: &RawRecord) -> Result<Parsed<StatisticsRecord>, ParseError> {
        let mut flags = Vec::new();

        let data = record.text("data").unwrap_or_default();
        let parsed_values = parse_percentage_list(&data);
        if parsed_values.is_empty() {
            flags.push("data holds no numeric values; mean_value is missing".to_string());
        }
        let mean_value = mean(&parsed_values);

        let date = match record.text("date") {
            Some(text) => match parse_date(&text) {
                Ok(date) => Some(date),
                Err(e) => {
                    flags.push(format!("date unparseable: {}", e));
                    None
                }
            },
            None => None,
        };

        let hospital_name = record
            .text_any(&["hospital_name", "hospital"])
            .map(|n| normalize_name(&n))
            .filter(|n| !n.is_empty());

        Ok(Parsed {
            row: StatisticsRecord {
                source: record.text("source"),
                hospital_name,
                date,
                data,
                parsed_values,
                mean_value,
            },
            flags,
        })
    }

    fn dedup_key(&self, _row: &StatisticsRecord) -> Option<String> {
        None
    }
}

impl IntoRaw for StatisticsRecord {
    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new().with("data", &self.data);
        if let Some(source) = &self.source {
            raw = raw.with("source", source);
        }
        if let Some(name) = &self.hospital_name {
            raw = raw.with("hospital_name", name);
        }
        if let Some(date) = self.date {
            raw = raw.with("date", &date.format("%Y-%m-%d").to_string());
        }
        raw
    }
}
