// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Validation and test metrics at a fixed decision threshold
//!
//! The threshold here is always [`EVAL_THRESHOLD`], independent of the tuned
//! serving threshold. Reported metrics therefore do not describe the deployed
//! decision boundary unless the tuner happens to pick 0.5.

use crate::datasets::{Label, Sample};
use crate::metrics::{ClassificationReport, ConfusionMatrix, SplitMetrics};
use crate::model::ToxicityScorer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decision threshold used for reported metrics
pub const EVAL_THRESHOLD: f64 = 0.5;

/// Metrics for the validation and test splits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToxicityMetrics {
    pub val: SplitMetrics,
    pub test: SplitMetrics,
}

impl ToxicityMetrics {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metrics: {}", path.display()))?;
        Ok(())
    }
}

/// Score one split at the fixed evaluation threshold
pub fn evaluate_split(model: &dyn ToxicityScorer, samples: &[Sample]) -> SplitMetrics {
    let scores = model.score_samples(samples);
    let truth: Vec<Label> = samples.iter().map(|s| s.label).collect();
    let metrics = SplitMetrics::from_scores(&scores, &truth, EVAL_THRESHOLD);
    if metrics.roc_auc.is_none() {
        tracing::warn!(
            "ROC-AUC undefined for a split of {} samples with a single class",
            samples.len()
        );
    }
    metrics
}

/// Evaluate the trained model on validation and test splits
pub fn evaluate_model(
    model: &dyn ToxicityScorer,
    validation: &[Sample],
    test: &[Sample],
) -> ToxicityMetrics {
    let val = evaluate_split(model, validation);
    let test = evaluate_split(model, test);

    tracing::info!("Validation @ {}: {}", EVAL_THRESHOLD, val.format());
    tracing::info!("Test @ {}: {}", EVAL_THRESHOLD, test.format());

    ToxicityMetrics { val, test }
}

/// Detailed report (confusion matrix, MCC) for a split at any threshold
pub fn classification_report(
    model: &dyn ToxicityScorer,
    samples: &[Sample],
    threshold: f64,
) -> ClassificationReport {
    let scores = model.score_samples(samples);
    let truth: Vec<Label> = samples.iter().map(|s| s.label).collect();
    ClassificationReport::from_confusion_matrix(ConfusionMatrix::from_scores(&scores, &truth, threshold))
}
