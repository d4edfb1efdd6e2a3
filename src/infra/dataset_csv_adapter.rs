use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::app::ports::{CanonicalDatasets, DatasetOutputPort, DatasetSourcePort};
use crate::constants;
use crate::domain::{CanonicalRow, FusedRecord};
use crate::error::{PipelineError, Stage};

/// Canonical and fused datasets as `<dataset>_processed.csv` files
pub struct CsvDatasetAdapter {
    output_dir: PathBuf,
}

impl CsvDatasetAdapter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn path_for<T: CanonicalRow>(&self) -> PathBuf {
        self.output_dir.join(constants::processed_file_name(T::dataset()))
    }

    fn write_rows<T: CanonicalRow + Serialize>(&self, stage: Stage, rows: &[T]) -> Result<()> {
        let path = self.path_for::<T>();
        write_csv(&path, rows).map_err(|message| PipelineError::Output {
            stage,
            path: path.clone(),
            message,
        })?;
        info!(path = %path.display(), rows = rows.len(), "Wrote processed dataset");
        Ok(())
    }

    fn read_rows<T: CanonicalRow + DeserializeOwned>(&self, stage: Stage) -> Result<Vec<T>> {
        let path = self.path_for::<T>();
        let bytes = fs::read(&path).map_err(|source| PipelineError::SourceUnavailable {
            stage,
            path: path.clone(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<T>, csv::Error>>()
            .map_err(|e| PipelineError::MalformedSource {
                stage,
                path,
                message: e.to_string(),
            })?;
        Ok(rows)
    }
}

/// Header from the row schema first, so an empty dataset still carries its columns
fn write_csv<T: CanonicalRow + Serialize>(path: &Path, rows: &[T]) -> std::result::Result<(), String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| e.to_string())?;
    writer.write_record(T::column_names()).map_err(|e| e.to_string())?;
    for row in rows {
        writer.serialize(row).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

impl DatasetOutputPort for CsvDatasetAdapter {
    fn write_canonical(&self, datasets: &CanonicalDatasets) -> Result<()> {
        self.write_rows(Stage::Cleaning, &datasets.publications)?;
        self.write_rows(Stage::Cleaning, &datasets.hospital)?;
        self.write_rows(Stage::Cleaning, &datasets.statistics)?;
        Ok(())
    }

    fn write_fused(&self, rows: &[FusedRecord]) -> Result<()> {
        self.write_rows(Stage::Fusion, rows)
    }
}

impl DatasetSourcePort for CsvDatasetAdapter {
    fn read_canonical(&self) -> Result<CanonicalDatasets> {
        Ok(CanonicalDatasets {
            publications: self.read_rows(Stage::Fusion)?,
            hospital: self.read_rows(Stage::Fusion)?,
            statistics: self.read_rows(Stage::Fusion)?,
        })
    }

    fn read_fused(&self) -> Result<Vec<FusedRecord>> {
        self.read_rows(Stage::Analysis)
    }
}
