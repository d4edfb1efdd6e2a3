use std::path::Path;

use serde_json::Value;

use super::{RawRecord, RawSources, RawValue, SourceKind};
use crate::error::{PipelineError, Result, Stage};

/// Parse the combined JSON summary:
/// `{"data_sources": {"pubmed": [...], "hospitals": [...], "statistics": [...]}}`
pub fn parse_combined(path: &Path, bytes: &[u8]) -> Result<RawSources> {
    let malformed = |message: String| PipelineError::MalformedSource {
        stage: Stage::Cleaning,
        path: path.to_path_buf(),
        message,
    };

    let doc: Value = serde_json::from_slice(bytes).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;
    let data_sources = doc
        .get("data_sources")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'data_sources' object".to_string()))?;

    let mut sources = RawSources::default();
    for kind in SourceKind::ALL {
        let items = data_sources
            .get(kind.combined_key())
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(format!("missing 'data_sources.{}' array", kind.combined_key())))?;

        let records = items
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                let mut record = RawRecord::new();
                for (key, value) in obj {
                    record.insert(key, raw_value(value));
                }
                record
            })
            .collect();
        *sources.records_mut(kind) = records;
    }

    Ok(sources)
}

fn raw_value(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Missing,
        Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Missing),
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Bool(b) => RawValue::Text(b.to_string()),
        other => RawValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_nested_record_sets() {
        let doc = json!({
            "pubmed_articles": 1,
            "data_sources": {
                "pubmed": [{"title": "A", "authors": "X, Y", "date": "2019", "source": "PubMed"}],
                "hospitals": [
                    {"hospital_name": "General", "date": "2021-01-01", "surgery_count": 12, "location": "boston"},
                    {"hospital_name": "Mercy", "date": "2021-01-01", "surgery_count": null, "location": "boston"}
                ],
                "statistics": []
            }
        });
        let bytes = serde_json::to_vec(&doc).unwrap();
        let sources = parse_combined(Path::new("combined_data.json"), &bytes).unwrap();

        assert_eq!(sources.publications.len(), 1);
        assert_eq!(sources.hospitals.len(), 2);
        assert!(sources.statistics.is_empty());
        assert_eq!(sources.hospitals[0].text("surgery_count"), Some("12".to_string()));
        assert_eq!(sources.hospitals[1].text("surgery_count"), None);
    }

    #[test]
    fn test_missing_record_set_is_malformed() {
        let bytes = br#"{"data_sources": {"pubmed": []}}"#;
        let err = parse_combined(Path::new("combined_data.json"), bytes).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSource { .. }));
    }
}
