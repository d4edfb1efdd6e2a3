//! Chart instructions and the presentation contract.
//!
//! A chart is a plain data description that a renderer turns into the
//! `<kind>_analysis.<ext>` figure. Every builder is a pure function of
//! already computed data plus a [`ChartFilter`]; none of them re-runs
//! cleaning or fusion.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::clustering::ClusteringResult;
use crate::analysis::correlation::{correlation_matrix, numeric_columns};
use crate::analysis::geographical::counts_by_location;
use crate::analysis::stats::five_number;
use crate::analysis::temporal::{monthly_totals, seasonal_decompose};
use crate::analysis::{AnalysisKind, Outcome};
use crate::constants;
use crate::domain::{FusedRecord, HospitalRecord};

/// User selection applied before a chart is built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartFilter {
    /// Keep only these locations; `None` keeps all
    pub locations: Option<BTreeSet<String>>,
    /// Inclusive date bounds
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ChartFilter {
    /// A location selection never admits a row without a location
    pub fn admits(&self, location: Option<&str>, date: NaiveDate) -> bool {
        self.locations
            .as_ref()
            .map_or(true, |set| location.is_some_and(|l| set.contains(l)))
            && self.start.map_or(true, |s| date >= s)
            && self.end.map_or(true, |e| date <= e)
    }

    fn hospital(&self, rows: &[HospitalRecord]) -> Vec<HospitalRecord> {
        rows.iter()
            .filter(|r| self.admits(r.location.as_deref(), r.date))
            .cloned()
            .collect()
    }

    fn fused_indices(&self, rows: &[FusedRecord]) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, r)| self.admits(r.location.as_deref(), r.date))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxGroup {
    pub location: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub cluster: usize,
    pub hospital_name: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartBody {
    /// Observed series with trend, seasonal and residual panels
    Decomposition {
        months: Vec<String>,
        observed: Vec<f64>,
        trend: Vec<f64>,
        seasonal: Vec<f64>,
        residual: Vec<f64>,
    },
    /// Surgery count distribution per location
    Boxplot { groups: Vec<BoxGroup> },
    Heatmap {
        labels: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    },
    /// PCA coordinates colored by cluster
    Scatter {
        x_label: String,
        y_label: String,
        points: Vec<ScatterPoint>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: AnalysisKind,
    pub title: String,
    /// Artifact the renderer writes, e.g. `temporal_analysis.png`
    pub figure: String,
    pub body: ChartBody,
}

impl ChartSpec {
    fn new(kind: AnalysisKind, title: &str, body: ChartBody) -> Self {
        Self {
            kind,
            title: title.to_string(),
            figure: constants::figure_file_name(kind.name(), constants::FIGURE_EXTENSION),
            body,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.figure = constants::figure_file_name(self.kind.name(), extension);
        self
    }

    /// Name of the instruction file next to the figure
    pub fn instruction_file(&self) -> String {
        constants::figure_file_name(self.kind.name(), "json")
    }
}

/// Monthly surgery totals, with decomposition panels when the filtered
/// series covers two full periods
pub fn temporal_chart(hospital: &[HospitalRecord], filter: &ChartFilter, period: usize) -> ChartSpec {
    let rows = filter.hospital(hospital);
    let months = monthly_totals(&rows);
    let observed: Vec<f64> = months.iter().map(|m| m.total as f64).collect();
    let (trend, seasonal, residual) = match seasonal_decompose(&observed, period) {
        Outcome::Complete(d) => (d.trend, d.seasonal, d.residual),
        _ => (Vec::new(), Vec::new(), Vec::new()),
    };
    let months = months.into_iter().map(|m| m.month).collect();

    ChartSpec::new(
        AnalysisKind::Temporal,
        "Monthly surgery totals and seasonal decomposition",
        ChartBody::Decomposition {
            months,
            observed,
            trend,
            seasonal,
            residual,
        },
    )
}

/// Five-number summaries of surgery counts per location
pub fn geographical_chart(fused: &[FusedRecord], filter: &ChartFilter) -> ChartSpec {
    let rows: Vec<FusedRecord> = filter
        .fused_indices(fused)
        .into_iter()
        .map(|i| fused[i].clone())
        .collect();
    let groups = counts_by_location(&rows)
        .into_iter()
        .filter_map(|(location, counts)| {
            let five = five_number(&counts)?;
            Some(BoxGroup {
                location,
                count: counts.len(),
                min: five.min,
                q1: five.q1,
                median: five.median,
                q3: five.q3,
                max: five.max,
            })
        })
        .collect();

    ChartSpec::new(
        AnalysisKind::Geographical,
        "Surgery counts by location",
        ChartBody::Boxplot { groups },
    )
}

/// Correlation heatmap recomputed on the filtered rows
pub fn correlation_chart(fused: &[FusedRecord], filter: &ChartFilter) -> ChartSpec {
    let rows: Vec<FusedRecord> = filter
        .fused_indices(fused)
        .into_iter()
        .map(|i| fused[i].clone())
        .collect();
    let matrix = correlation_matrix(&numeric_columns(&rows));

    ChartSpec::new(
        AnalysisKind::Correlation,
        "Correlation matrix",
        ChartBody::Heatmap {
            labels: matrix.columns,
            values: matrix.values,
        },
    )
}

/// PCA scatter of the rows admitted by the filter, colored by cluster.
/// `fused` must be the dataset the clustering was computed on.
pub fn cluster_chart(fused: &[FusedRecord], clustering: &ClusteringResult, filter: &ChartFilter) -> ChartSpec {
    let points = filter
        .fused_indices(fused)
        .into_iter()
        .filter_map(|i| {
            let [x, y] = *clustering.projection.get(i)?;
            Some(ScatterPoint {
                x,
                y,
                cluster: *clustering.labels.get(i)?,
                hospital_name: fused[i].hospital_name.clone(),
                location: fused[i].location.clone(),
            })
        })
        .collect();

    ChartSpec::new(
        AnalysisKind::Clustering,
        "Clusters on the first two principal components",
        ChartBody::Scatter {
            x_label: "PC1".to_string(),
            y_label: "PC2".to_string(),
            points,
        },
    )
}
