// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Descriptive statistics over the loaded example table

use crate::datasets::{Label, Sample};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Columns of the loaded example table
pub const EXAMPLE_COLUMNS: [&str; 2] = ["text", "label"];

/// Basic shape and text-length statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
    pub label_positive_rate: f64,
    /// Rows with no text at all
    pub missing_text_rows: usize,
    /// Rows whose text is only whitespace
    pub empty_text_rows: usize,
    pub avg_text_length_chars: f64,
    pub p50_text_length_chars: f64,
    pub p95_text_length_chars: f64,
}

impl DatasetSummary {
    pub fn format(&self) -> String {
        format!(
            r#"Dataset Summary
===============
Rows:              {}
Columns:           {} ({})
Positive rate:     {:.4}
Missing text:      {}
Empty text:        {}
Text length avg:   {:.1} chars
Text length p50:   {:.1} chars
Text length p95:   {:.1} chars
"#,
            self.n_rows,
            self.n_cols,
            self.columns.join(", "),
            self.label_positive_rate,
            self.missing_text_rows,
            self.empty_text_rows,
            self.avg_text_length_chars,
            self.p50_text_length_chars,
            self.p95_text_length_chars,
        )
    }
}

/// Count and share of one label value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: u8,
    pub count: usize,
    pub fraction: f64,
}

/// Per-row length features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthFeatures {
    pub id: String,
    pub text_length_chars: usize,
    pub text_length_words: usize,
}

pub fn compute_basic_summary(samples: &[Sample]) -> DatasetSummary {
    let n_rows = samples.len();
    let mut lengths: Vec<f64> = samples
        .iter()
        .map(|s| s.text.chars().count() as f64)
        .collect();
    lengths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let positives = samples.iter().filter(|s| s.label == Label::Toxic).count();
    let avg = if n_rows == 0 {
        0.0
    } else {
        lengths.iter().sum::<f64>() / n_rows as f64
    };

    let summary = DatasetSummary {
        n_rows,
        n_cols: EXAMPLE_COLUMNS.len(),
        columns: EXAMPLE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        label_positive_rate: if n_rows == 0 {
            0.0
        } else {
            positives as f64 / n_rows as f64
        },
        missing_text_rows: samples.iter().filter(|s| s.text.is_empty()).count(),
        empty_text_rows: samples
            .iter()
            .filter(|s| !s.text.is_empty() && s.text.trim().is_empty())
            .count(),
        avg_text_length_chars: avg,
        p50_text_length_chars: quantile(&lengths, 0.5),
        p95_text_length_chars: quantile(&lengths, 0.95),
    };

    tracing::debug!(?summary, "Computed dataset summary");
    summary
}

/// Label counts sorted by label value; fractions sum to 1
pub fn label_distribution(samples: &[Sample]) -> Vec<LabelCount> {
    if samples.is_empty() {
        return Vec::new();
    }
    let total = samples.len() as f64;
    [Label::NonToxic, Label::Toxic]
        .into_iter()
        .map(|label| (label, samples.iter().filter(|s| s.label == label).count()))
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| LabelCount {
            label: label.to_binary(),
            count,
            fraction: count as f64 / total,
        })
        .collect()
}

pub fn add_length_features(samples: &[Sample]) -> Vec<LengthFeatures> {
    samples
        .iter()
        .map(|s| LengthFeatures {
            id: s.id.clone(),
            text_length_chars: s.text.chars().count(),
            text_length_words: s.text.split_whitespace().count(),
        })
        .collect()
}

/// Write per-row length features as CSV
pub fn save_length_features(features: &[LengthFeatures], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in features {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Exploration outputs written together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub summary: DatasetSummary,
    pub label_distribution: Vec<LabelCount>,
}

impl ExplorationReport {
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            summary: compute_basic_summary(samples),
            label_distribution: label_distribution(samples),
        }
    }

    /// Write `dataset_summary.json` and `label_distribution.json` into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let summary_path = dir.join("dataset_summary.json");
        std::fs::write(&summary_path, serde_json::to_string_pretty(&self.summary)?)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;

        let dist_path = dir.join("label_distribution.json");
        std::fs::write(&dist_path, serde_json::to_string_pretty(&self.label_distribution)?)
            .with_context(|| format!("Failed to write {}", dist_path.display()))?;

        tracing::info!("Exploration artifacts written to {}", dir.display());
        Ok(())
    }
}

/// Linear interpolation between closest ranks over sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
