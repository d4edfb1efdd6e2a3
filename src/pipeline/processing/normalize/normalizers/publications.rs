use crate::domain::Publication;
use crate::pipeline::ingestion::RawRecord;
use crate::pipeline::processing::normalize::{Cleaner, IntoRaw, Parsed};
use crate::pipeline::processing::parser::{extract_first_author, normalize_name, parse_year, ParseError};

/// Cleaner for literature citations (PubMed export)
#[derive(Debug, Default, Clone, Copy)]
pub struct PublicationCleaner;

impl Cleaner for PublicationCleaner {
    type Row = Publication;

    fn parse_row(&self, record: &RawRecord) -> Result<Parsed<Publication>, ParseError> {
        // Year comes from the citation text; no year, no row
        let citation = record
            .text("date")
            .ok_or(ParseError::MissingField { field: "date" })?;
        let date = parse_year(&citation)?;

        let title = record
            .text("title")
            .map(|t| normalize_name(&t))
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingField { field: "title" })?;

        let authors = record.text("authors");
        let first_author = extract_first_author(authors.as_deref());

        Ok(Parsed::clean(Publication {
            title,
            authors,
            date,
            source: record.text("source"),
            first_author,
        }))
    }

    fn dedup_key(&self, row: &Publication) -> Option<String> {
        Some(row.title.clone())
    }
}

impl IntoRaw for Publication {
    fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord::new()
            .with("title", &self.title)
            .with("date", &self.date.format("%Y-%m-%d").to_string());
        if let Some(authors) = &self.authors {
            raw = raw.with("authors", authors);
        }
        if let Some(source) = &self.source {
            raw = raw.with("source", source);
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(title: &str, authors: &str, date: &str) -> RawRecord {
        RawRecord::new()
            .with("title", title)
            .with("authors", authors)
            .with("date", date)
            .with("source", "PubMed")
    }

    #[test]
    fn test_cleans_and_dedupes_titles() {
        let records = vec![
            raw("Laparoscopic outcomes: a review.", "Smith J, Doe A", "Ann Surg. 2019 Mar;269(3):1"),
            raw("Laparoscopic outcomes a review", "Other B", "Surg Endosc. 2020"),
            raw("Gallstone trends!", "Lee K", "2021 Jan"),
        ];
        let out = PublicationCleaner.clean(&records);

        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.stats.duplicate_rows, 1);
        assert_eq!(out.rows[0].title, "Laparoscopic outcomes a review");
        assert_eq!(out.rows[0].first_author.as_deref(), Some("Smith J"));
        assert_eq!(out.rows[0].date, NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
        assert_eq!(out.rows[1].title, "Gallstone trends");
    }

    #[test]
    fn test_rows_without_year_are_absent() {
        let records = vec![
            raw("Dated", "A", "J Hepatol. 2018"),
            raw("Undated", "B", "Epub ahead of print"),
        ];
        let out = PublicationCleaner.clean(&records);

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].title, "Dated");
        assert_eq!(out.stats.dropped_rows, 1);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_recleaning_is_identity() {
        let records = vec![
            raw("A, study.", "Smith J, Doe A", "2019"),
            raw("A study", "Smith J", "2020"),
            raw("Another", "Lee K", "Lancet 2017;1:2"),
        ];
        let once = PublicationCleaner.clean(&records).rows;
        let raw_again: Vec<RawRecord> = once.iter().map(IntoRaw::to_raw).collect();
        let twice = PublicationCleaner.clean(&raw_again).rows;
        assert_eq!(once, twice);
    }
}
