use crate::domain::HospitalRecord;
use crate::pipeline::ingestion::RawRecord;
use crate::pipeline::processing::normalize::{Cleaner, IntoRaw, Parsed};
use crate::pipeline::processing::parser::{normalize_name, parse_count, parse_date, title_case_location, ParseError};

/// Cleaner for per-hospital surgery counts
#[derive(Debug, Default, Clone, Copy)]
pub struct HospitalCleaner;

impl Cleaner for HospitalCleaner {
    type Row = HospitalRecord;

    fn parse_row(&self, record: &RawRecord) -> Result<Parsed<HospitalRecord>, ParseError> {
        // Only the date decides whether a row survives
        let date_text = record
            .text("date")
            .ok_or(ParseError::MissingField { field: "date" })?;
        let date = parse_date(&date_text)?;

        let mut flags = Vec::new();

        let hospital_name = record
            .text("hospital_name")
            .map(|n| normalize_name(&n))
            .filter(|n| !n.is_empty());
        if hospital_name.is_none() {
            flags.push("hospital_name missing".to_string());
        }

        let location = record
            .text("location")
            .map(|l| title_case_location(&l))
            .filter(|l| !l.is_empty());
        if location.is_none() {
            flags.push("location missing".to_string());
        }

        let raw_count = record.text("surgery_count");
        let surgery_count = raw_count.as_deref().and_then(parse_count);
        if surgery_count.is_none() {
            flags.push(format!(
                "surgery_count unparseable: '{}'",
                raw_count.unwrap_or_default()
            ));
        }

        Ok(Parsed {
            row: HospitalRecord {
                hospital_name,
                date,
                surgery_count,
                location,
                count_missing: surgery_count.is_none(),
            },
            flags,
        })
    }

    /// Nameless rows cannot be told apart, so they all pass
    fn dedup_key(&self, row: &HospitalRecord) -> Option<String> {
        row.hospital_name
            .as_ref()
            .map(|name| format!("{}|{}", name, row.date))
    }
}

impl IntoRaw for HospitalRecord {
    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new().with("date", &self.date.format("%Y-%m-%d").to_string());
        if let Some(name) = &self.hospital_name {
            raw = raw.with("hospital_name", name);
        }
        if let Some(location) = &self.location {
            raw = raw.with("location", location);
        }
        if let Some(count) = self.surgery_count {
            raw = raw.with("surgery_count", &count.to_string());
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(name: &str, date: &str, count: &str, location: &str) -> RawRecord {
        RawRecord::new()
            .with("hospital_name", name)
            .with("date", date)
            .with("surgery_count", count)
            .with("location", location)
    }

    #[test]
    fn test_cleans_hospital_rows() {
        let records = vec![raw("St. Mary's Hospital", "2021-03-15", "cases: 137 this year", "  new york ")];
        let out = HospitalCleaner.clean(&records);

        assert_eq!(out.rows.len(), 1);
        let row = &out.rows[0];
        assert_eq!(row.hospital_name.as_deref(), Some("St Marys Hospital"));
        assert_eq!(row.location.as_deref(), Some("New York"));
        assert_eq!(row.surgery_count, Some(137));
        assert!(!row.count_missing);
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2021, 3, 15).unwrap());
    }

    #[test]
    fn test_missing_count_is_kept_and_flagged() {
        let records = vec![raw("General", "2021-03-15", "not reported", "Boston")];
        let out = HospitalCleaner.clean(&records);

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].surgery_count, None);
        assert!(out.rows[0].count_missing);
        assert_eq!(out.stats.flagged_rows, 1);
        assert_eq!(
            out.diagnostics.count(crate::diagnostics::DiagnosticKind::FieldUnparsed),
            1
        );
    }

    #[test]
    fn test_dedupes_on_name_and_date() {
        let records = vec![
            raw("General!", "2021-03-15", "10", "Boston"),
            raw("General", "2021-03-15", "99", "Boston"),
            raw("General", "2021-04-15", "12", "Boston"),
            raw("General", "no date", "12", "Boston"),
        ];
        let out = HospitalCleaner.clean(&records);

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0].surgery_count, Some(10));
        assert_eq!(out.stats.duplicate_rows, 1);
        assert_eq!(out.stats.dropped_rows, 1);
    }

    #[test]
    fn test_recleaning_is_identity() {
        let records = vec![
            raw("Mercy, Inc.", "03/01/2021", "about 40 cases", "chicago"),
            raw("Mercy Inc", "2021-03-01", "41", "Chicago"),
            raw("Mercy Inc", "2021-04-01", "n/a", "Chicago"),
            raw("", "2021-05-01", "7", "  "),
        ];
        let once = HospitalCleaner.clean(&records).rows;
        let raw_again: Vec<RawRecord> = once.iter().map(IntoRaw::to_raw).collect();
        let twice = HospitalCleaner.clean(&raw_again).rows;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_malformed_dates_are_dropped_not_rounded_to_year() {
        let records = vec![
            raw("General", "2021-02-30", "10", "Boston"),
            raw("General", "March 2021", "11", "Boston"),
            raw("General", "2021-13-01", "12", "Boston"),
        ];
        let out = HospitalCleaner.clean(&records);

        assert!(out.rows.is_empty());
        assert_eq!(out.stats.dropped_rows, 3);
        assert_eq!(out.stats.duplicate_rows, 0);
        assert_eq!(
            out.diagnostics.count(crate::diagnostics::DiagnosticKind::RowDropped),
            3
        );
    }

    #[test]
    fn test_day_first_and_compact_dates_keep_their_day() {
        let records = vec![
            raw("General", "15/03/2021", "10", "Boston"),
            raw("General", "20/04/2021", "11", "Boston"),
            raw("General", "20210315", "12", "Boston"),
        ];
        let out = HospitalCleaner.clean(&records);

        // 20210315 is the same day as 15/03/2021, so it is the only duplicate
        assert_eq!(out.stats.dropped_rows, 0);
        assert_eq!(out.stats.duplicate_rows, 1);
        let dates: Vec<NaiveDate> = out.rows.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2021, 3, 15).unwrap(),
                NaiveDate::from_ymd_opt(2021, 4, 20).unwrap(),
            ]
        );
    }

    #[test]
    fn test_oversized_count_is_flagged_missing() {
        let records = vec![raw("General", "2021-03-15", "18446744073709551615", "Boston")];
        let out = HospitalCleaner.clean(&records);

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].surgery_count, None);
        assert!(out.rows[0].count_missing);
        assert_eq!(out.stats.flagged_rows, 1);
    }

    #[test]
    fn test_rows_without_location_or_name_are_kept_and_flagged() {
        let records = vec![
            raw("General", "2021-03-15", "10", "   "),
            raw("!!", "2021-03-15", "4", "Boston"),
            raw("", "2021-03-15", "5", "Boston"),
        ];
        let out = HospitalCleaner.clean(&records);

        assert_eq!(out.rows.len(), 3);
        assert_eq!(out.stats.dropped_rows, 0);
        assert_eq!(out.stats.duplicate_rows, 0);
        assert_eq!(out.stats.flagged_rows, 3);
        assert_eq!(out.rows[0].location, None);
        assert_eq!(out.rows[0].surgery_count, Some(10));
        assert_eq!(out.rows[1].hospital_name, None);
        assert_eq!(out.rows[2].hospital_name, None);
        assert_eq!(
            out.diagnostics.count(crate::diagnostics::DiagnosticKind::FieldUnparsed),
            3
        );
    }
}
