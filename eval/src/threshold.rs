// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! F1-optimal decision threshold search and the persisted threshold artifact

use crate::datasets::{Label, Sample};
use crate::metrics::ConfusionMatrix;
use crate::model::ToxicityScorer;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Threshold used when tuning finds nothing or the artifact is unusable
pub const DEFAULT_THRESHOLD: f64 = 0.5;

pub const GRID_START: f64 = 0.05;
pub const GRID_END: f64 = 0.95;
pub const GRID_POINTS: usize = 19;

/// Result of the threshold search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdInfo {
    pub threshold: f64,
    pub f1: f64,
    pub computed_at_utc: DateTime<Utc>,
    pub val_positive_rate: f64,
}

impl ThresholdInfo {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write threshold: {}", path.display()))?;
        tracing::info!("Threshold saved to {}", path.display());
        Ok(())
    }
}

/// Evenly spaced candidates over `[GRID_START, GRID_END]`, both ends included
pub fn threshold_grid() -> Vec<f64> {
    let step = (GRID_END - GRID_START) / (GRID_POINTS - 1) as f64;
    (0..GRID_POINTS)
        .map(|i| {
            if i == GRID_POINTS - 1 {
                GRID_END
            } else {
                GRID_START + i as f64 * step
            }
        })
        .collect()
}

/// Pick the grid threshold with the highest validation F1
///
/// Only a strictly greater F1 replaces the current best, so ties go to the
/// lowest threshold.
pub fn tune_threshold_for_f1(model: &dyn ToxicityScorer, validation: &[Sample]) -> ThresholdInfo {
    let scores = model.score_samples(validation);
    let truth: Vec<Label> = validation.iter().map(|s| s.label).collect();

    let mut best_threshold = DEFAULT_THRESHOLD;
    let mut best_f1 = -1.0;

    for threshold in threshold_grid() {
        let f1 = ConfusionMatrix::from_scores(&scores, &truth, threshold).f1_score();
        tracing::debug!(threshold, f1, "Threshold candidate");
        if f1 > best_f1 {
            best_f1 = f1;
            best_threshold = threshold;
        }
    }

    let positives = truth.iter().filter(|l| **l == Label::Toxic).count();
    let val_positive_rate = if truth.is_empty() {
        0.0
    } else {
        positives as f64 / truth.len() as f64
    };

    tracing::info!(
        "Tuned threshold {:.2} (validation F1 {:.4}, positive rate {:.4})",
        best_threshold,
        best_f1,
        val_positive_rate
    );

    ThresholdInfo {
        threshold: best_threshold,
        f1: best_f1,
        computed_at_utc: Utc::now(),
        val_positive_rate,
    }
}

/// Why a threshold artifact could not be used
#[derive(Debug, Error)]
pub enum ThresholdLoadError {
    #[error("threshold file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read threshold file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("threshold file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("threshold file {0} has no numeric `threshold` field")]
    MissingField(PathBuf),

    #[error("threshold {value} in {path} is outside [0, 1]")]
    OutOfRange { path: PathBuf, value: f64 },
}

/// Read the `threshold` field of a threshold artifact
///
/// Other fields are ignored, so a bare `{"threshold": 0.35}` is accepted.
/// A numeric string such as `"0.35"` is read as its number.
pub fn load_threshold(path: &Path) -> Result<f64, ThresholdLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ThresholdLoadError::Missing(path.to_path_buf())
        } else {
            ThresholdLoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| ThresholdLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let threshold = match value.get("threshold") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ThresholdLoadError::MissingField(path.to_path_buf()))?;

    if !(0.0..=1.0).contains(&threshold) {
        return Err(ThresholdLoadError::OutOfRange {
            path: path.to_path_buf(),
            value: threshold,
        });
    }

    Ok(threshold)
}

/// Like [`load_threshold`] but falls back to `default` on any failure
pub fn load_threshold_or_default(path: &Path, default: f64) -> f64 {
    match load_threshold(path) {
        Ok(threshold) => {
            tracing::info!("Loaded threshold {} from {}", threshold, path.display());
            threshold
        }
        Err(e) => {
            tracing::warn!("{}; using default threshold {}", e, default);
            default
        }
    }
}
