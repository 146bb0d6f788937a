// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for binary classification
//!
//! Implements standard ML metrics:
//! - Confusion Matrix
//! - Accuracy, Precision, Recall, F1-Score (zero division reported as 0)
//! - ROC-AUC (undefined, hence `None`, for single-class ground truth)
//! - Matthews Correlation Coefficient (MCC)

use crate::datasets::Label;
use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True Positives (toxic predicted as toxic)
    pub tp: usize,
    /// True Negatives (clean predicted as clean)
    pub tn: usize,
    /// False Positives (clean predicted as toxic)
    pub fp: usize,
    /// False Negatives (toxic predicted as clean)
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Create from predictions and ground truth labels
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        assert_eq!(predictions.len(), ground_truth.len(), "Prediction and ground truth lengths must match");

        let mut matrix = Self::default();

        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            match (pred, truth) {
                (Label::Toxic, Label::Toxic) => matrix.tp += 1,
                (Label::NonToxic, Label::NonToxic) => matrix.tn += 1,
                (Label::Toxic, Label::NonToxic) => matrix.fp += 1,
                (Label::NonToxic, Label::Toxic) => matrix.fn_ += 1,
            }
        }

        matrix
    }

    /// Threshold probabilities (`p >= threshold` is toxic) and tally
    pub fn from_scores(scores: &[f64], ground_truth: &[Label], threshold: f64) -> Self {
        let predictions: Vec<Label> = scores
            .iter()
            .map(|p| Label::from_score(*p, threshold))
            .collect();
        Self::from_predictions(&predictions, ground_truth)
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    /// Precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// Recall (Sensitivity): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// Specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        let denom = self.tn + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tn as f64 / denom as f64
    }

    /// F1 Score: 2 * (Precision * Recall) / (Precision + Recall)
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }

    /// Matthews Correlation Coefficient (MCC), in [-1, 1]
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;

        let numerator = tp * tn - fp * fn_;
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

        if denominator == 0.0 {
            return 0.0;
        }
        numerator / denominator
    }
}

/// Per-split metrics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the split lacks one of the two classes
    pub roc_auc: Option<f64>,
}

impl SplitMetrics {
    /// Compute all metrics from probabilities at a decision threshold
    pub fn from_scores(scores: &[f64], ground_truth: &[Label], threshold: f64) -> Self {
        let cm = ConfusionMatrix::from_scores(scores, ground_truth, threshold);
        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1: cm.f1_score(),
            roc_auc: roc_auc(ground_truth, scores),
        }
    }

    /// Format as a one-line summary
    pub fn format(&self) -> String {
        let auc = self.roc_auc.map_or("n/a".to_string(), |v| format!("{:.4}", v));
        format!(
            "Accuracy={:.4} Precision={:.4} Recall={:.4} F1={:.4} ROC-AUC={}",
            self.accuracy, self.precision, self.recall, self.f1, auc
        )
    }
}

/// Full classification report with confusion matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mcc: f64,
    pub specificity: f64,
    pub support: usize,
}

impl ClassificationReport {
    /// Generate full report from confusion matrix
    pub fn from_confusion_matrix(cm: ConfusionMatrix) -> Self {
        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            mcc: cm.mcc(),
            specificity: cm.specificity(),
            support: cm.total(),
            confusion_matrix: cm,
        }
    }

    /// Format as a human-readable string
    pub fn format(&self) -> String {
        format!(
            r#"Classification Report
=====================
Accuracy:          {:.4} ({:.2}%)
Precision:         {:.4}
Recall:            {:.4}
F1 Score:          {:.4}
MCC:               {:.4}
Specificity:       {:.4}
Support:           {}

Confusion Matrix:
                  Predicted
                  Toxic     Clean
Actual Toxic     {:>6}    {:>6}
       Clean     {:>6}    {:>6}
"#,
            self.accuracy, self.accuracy * 100.0,
            self.precision,
            self.recall,
            self.f1_score,
            self.mcc,
            self.specificity,
            self.support,
            self.confusion_matrix.tp, self.confusion_matrix.fn_,
            self.confusion_matrix.fp, self.confusion_matrix.tn,
        )
    }
}

/// Area under the ROC curve via the rank-sum statistic
///
/// Tied scores share their average rank. Returns `None` if either class is absent.
pub fn roc_auc(ground_truth: &[Label], probabilities: &[f64]) -> Option<f64> {
    let mut pairs: Vec<(f64, Label)> = probabilities
        .iter()
        .copied()
        .zip(ground_truth.iter().copied())
        .collect();

    let n_pos = pairs.iter().filter(|(_, l)| *l == Label::Toxic).count();
    let n_neg = pairs.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < pairs.len() {
        let mut end = start + 1;
        while end < pairs.len() && pairs[end].0 == pairs[start].0 {
            end += 1;
        }
        // Ranks are 1-based; the tie group spans ranks start+1..=end
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = pairs[start..end].iter().filter(|(_, l)| *l == Label::Toxic).count();
        positive_rank_sum += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}
