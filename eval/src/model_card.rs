// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model Card generation for the toxicity model
//!
//! A model card is write-once metadata accompanying a trained artifact:
//! - Model type tag and creation time
//! - Evaluation metrics (validation and test, at the fixed evaluation threshold)
//! - The tuned serving threshold
//! - Declared input/output schema
//! - Provenance (artifact digest, hyperparameters) and caveats

use crate::classifier::LogRegParams;
use crate::evaluation::{ToxicityMetrics, EVAL_THRESHOLD};
use crate::metrics::SplitMetrics;
use crate::model::MODEL_TYPE;
use crate::threshold::ThresholdInfo;
use crate::vectorizer::TfidfParams;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete model card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    /// Fixed model type tag
    pub model_type: String,
    pub created_at_utc: DateTime<Utc>,
    pub metrics: ToxicityMetrics,
    /// Tuned threshold used for serving
    pub threshold: ThresholdInfo,
    pub inputs: InputSchema,
    pub outputs: OutputSchema,
    pub model_details: ModelDetails,
    pub intended_use: IntendedUse,
    pub caveats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub field: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            field: "text".to_string(),
            data_type: "string".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub field: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether a thresholded boolean label accompanies the score
    pub label_thresholded: bool,
}

impl Default for OutputSchema {
    fn default() -> Self {
        Self {
            field: "toxicity_score".to_string(),
            data_type: "float".to_string(),
            label_thresholded: true,
        }
    }
}

/// Provenance of the trained artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetails {
    pub name: String,
    pub version: String,
    pub license: String,
    pub framework: String,
    /// SHA-256 of the serialised model artifact
    pub artifact_sha256: Option<String>,
    pub training_size: Option<usize>,
    pub training_dataset: Option<String>,
    pub vectorizer: Option<TfidfParams>,
    pub classifier: Option<LogRegParams>,
}

impl Default for ModelDetails {
    fn default() -> Self {
        Self {
            name: "toxicity-classifier".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            license: "AGPL-3.0-or-later".to_string(),
            framework: "Rust (sprs)".to_string(),
            artifact_sha256: None,
            training_size: None,
            training_dataset: None,
            vectorizer: None,
            classifier: None,
        }
    }
}

/// Intended use cases and users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntendedUse {
    pub primary_uses: Vec<String>,
    /// What the model should NOT be used for
    pub out_of_scope_uses: Vec<String>,
}

impl Default for IntendedUse {
    fn default() -> Self {
        Self {
            primary_uses: vec![
                "Scoring English comments for toxic language".to_string(),
                "Prioritising comments for human moderation".to_string(),
            ],
            out_of_scope_uses: vec![
                "Automated removal of content without human review".to_string(),
                "Non-English text".to_string(),
                "Judging individuals rather than individual comments".to_string(),
            ],
        }
    }
}

fn default_caveats() -> Vec<String> {
    vec![
        format!(
            "Reported metrics are computed at a fixed threshold of {}; the serving threshold is tuned separately on validation F1 and may differ",
            EVAL_THRESHOLD
        ),
        "Labels collapse six toxicity sub-categories into one binary flag".to_string(),
        "Bag-of-n-grams features ignore context, so quoted or reclaimed slurs may be misclassified"
            .to_string(),
        "Training data comes from Wikipedia talk pages and may not transfer to other platforms"
            .to_string(),
    ]
}

impl ModelCard {
    /// Aggregate metrics and threshold into a card with default metadata
    pub fn new(metrics: ToxicityMetrics, threshold: ThresholdInfo) -> Self {
        Self {
            model_type: MODEL_TYPE.to_string(),
            created_at_utc: Utc::now(),
            metrics,
            threshold,
            inputs: InputSchema::default(),
            outputs: OutputSchema::default(),
            model_details: ModelDetails::default(),
            intended_use: IntendedUse::default(),
            caveats: default_caveats(),
        }
    }

    /// True when the evaluation threshold differs from the serving threshold
    pub fn threshold_diverges(&self) -> bool {
        (self.threshold.threshold - EVAL_THRESHOLD).abs() > 1e-9
    }

    /// Generate markdown representation
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Model Card: {}\n\n", self.model_details.name));

        // Model Details
        md.push_str("## Model Details\n\n");
        md.push_str(&format!("- **Type:** {}\n", self.model_type));
        md.push_str(&format!("- **Version:** {}\n", self.model_details.version));
        md.push_str(&format!("- **Framework:** {}\n", self.model_details.framework));
        md.push_str(&format!("- **License:** {}\n", self.model_details.license));
        md.push_str(&format!(
            "- **Created:** {}\n",
            self.created_at_utc.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(ref digest) = self.model_details.artifact_sha256 {
            md.push_str(&format!("- **Artifact SHA-256:** `{}`\n", digest));
        }
        if let Some(ref tfidf) = self.model_details.vectorizer {
            md.push_str(&format!(
                "- **Vectorizer:** TF-IDF, ngram_range=({}, {}), min_df={}, max_features={}\n",
                tfidf.ngram_range.0,
                tfidf.ngram_range.1,
                tfidf.min_df,
                tfidf
                    .max_features
                    .map_or("unbounded".to_string(), |m| m.to_string())
            ));
        }
        if let Some(ref logreg) = self.model_details.classifier {
            md.push_str(&format!(
                "- **Classifier:** logistic regression, C={}, max_iter={}, class_weight=balanced\n",
                logreg.c, logreg.max_iter
            ));
        }
        md.push('\n');

        // Interface
        md.push_str("## Interface\n\n");
        md.push_str(&format!(
            "- **Input:** `{}` ({})\n",
            self.inputs.field, self.inputs.data_type
        ));
        md.push_str(&format!(
            "- **Output:** `{}` ({}){}\n\n",
            self.outputs.field,
            self.outputs.data_type,
            if self.outputs.label_thresholded {
                " plus thresholded `is_toxic` label"
            } else {
                ""
            }
        ));

        // Intended Use
        md.push_str("## Intended Use\n\n");
        for use_case in &self.intended_use.primary_uses {
            md.push_str(&format!("- {}\n", use_case));
        }
        md.push_str("\n**Out of scope:**\n\n");
        for oos in &self.intended_use.out_of_scope_uses {
            md.push_str(&format!("- {}\n", oos));
        }
        md.push('\n');

        // Metrics
        md.push_str(&format!("## Performance Metrics (threshold {})\n\n", EVAL_THRESHOLD));
        md.push_str("| Split | Accuracy | Precision | Recall | F1 | ROC-AUC |\n");
        md.push_str("|-------|----------|-----------|--------|-----|---------|\n");
        md.push_str(&metrics_row("Validation", &self.metrics.val));
        md.push_str(&metrics_row("Test", &self.metrics.test));
        md.push('\n');

        // Threshold
        md.push_str("## Decision Threshold\n\n");
        md.push_str(&format!("- **Serving threshold:** {:.2}\n", self.threshold.threshold));
        md.push_str(&format!("- **Validation F1 at threshold:** {:.4}\n", self.threshold.f1));
        md.push_str(&format!(
            "- **Validation positive rate:** {:.4}\n",
            self.threshold.val_positive_rate
        ));
        if self.threshold_diverges() {
            md.push_str(&format!(
                "\n> The serving threshold differs from the {} used for the metrics above.\n",
                EVAL_THRESHOLD
            ));
        }
        md.push('\n');

        // Training Data
        if self.model_details.training_size.is_some() || self.model_details.training_dataset.is_some() {
            md.push_str("## Training Data\n\n");
            if let Some(ref dataset) = self.model_details.training_dataset {
                md.push_str(&format!("**Dataset:** {}\n", dataset));
            }
            if let Some(size) = self.model_details.training_size {
                md.push_str(&format!("\n**Size:** {} samples\n", size));
            }
            md.push('\n');
        }

        // Caveats
        md.push_str("## Caveats\n\n");
        for caveat in &self.caveats {
            md.push_str(&format!("- {}\n", caveat));
        }
        md.push('\n');

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Model Card generated on {}*\n",
            self.created_at_utc.format("%Y-%m-%d")
        ));

        md
    }

    /// Save model card to file as markdown
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let md = self.to_markdown();
        std::fs::write(path, md)
            .with_context(|| format!("Failed to write model card: {}", path.display()))?;
        Ok(())
    }

    /// Save as JSON
    pub fn save_json(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model card: {}", path.display()))?;
        Ok(())
    }
}

fn metrics_row(split: &str, m: &SplitMetrics) -> String {
    format!(
        "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {} |\n",
        split,
        m.accuracy,
        m.precision,
        m.recall,
        m.f1,
        m.roc_auc.map_or("n/a".to_string(), |v| format!("{:.4}", v))
    )
}

/// Assemble a model card from evaluation metrics and the tuned threshold
pub fn package_model_card(metrics: ToxicityMetrics, threshold: ThresholdInfo) -> ModelCard {
    ModelCard::new(metrics, threshold)
}

/// Builder for creating model cards
pub struct ModelCardBuilder {
    card: ModelCard,
}

impl ModelCardBuilder {
    pub fn new(metrics: ToxicityMetrics, threshold: ThresholdInfo) -> Self {
        Self {
            card: ModelCard::new(metrics, threshold),
        }
    }

    pub fn training_dataset(mut self, dataset: &str) -> Self {
        self.card.model_details.training_dataset = Some(dataset.to_string());
        self
    }

    pub fn training_size(mut self, size: usize) -> Self {
        self.card.model_details.training_size = Some(size);
        self
    }

    pub fn hyperparameters(mut self, tfidf: &TfidfParams, logreg: &LogRegParams) -> Self {
        self.card.model_details.vectorizer = Some(tfidf.clone());
        self.card.model_details.classifier = Some(logreg.clone());
        self
    }

    pub fn build(self) -> ModelCard {
        self.card
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_metrics(f1: f64, roc_auc: Option<f64>) -> SplitMetrics {
        SplitMetrics {
            accuracy: 0.9,
            precision: 0.7,
            recall: 0.8,
            f1,
            roc_auc,
        }
    }

    fn metrics() -> ToxicityMetrics {
        ToxicityMetrics {
            val: split_metrics(0.75, Some(0.95)),
            test: split_metrics(0.72, None),
        }
    }

    fn threshold(value: f64) -> ThresholdInfo {
        ThresholdInfo {
            threshold: value,
            f1: 0.78,
            computed_at_utc: Utc::now(),
            val_positive_rate: 0.1,
        }
    }

    #[test]
    fn test_package_has_contract_keys() {
        let card = package_model_card(metrics(), threshold(0.35));
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["model_type"], "tfidf_logreg");
        assert!(json["created_at_utc"].is_string());
        assert_eq!(json["metrics"]["val"]["f1"], 0.75);
        assert!(json["metrics"]["test"]["roc_auc"].is_null());
        assert_eq!(json["threshold"]["threshold"], 0.35);
        assert_eq!(json["inputs"]["field"], "text");
        assert_eq!(json["inputs"]["type"], "string");
        assert_eq!(json["outputs"]["field"], "toxicity_score");
        assert_eq!(json["outputs"]["type"], "float");
        assert_eq!(json["outputs"]["label_thresholded"], true);
    }

    #[test]
    fn test_model_card_builder() {
        let card = ModelCardBuilder::new(metrics(), threshold(0.5))
            .training_dataset("Jigsaw Toxic Comment Classification")
            .training_size(10000)
            .hyperparameters(&TfidfParams::default(), &LogRegParams::default())
            .build();

        assert_eq!(card.model_details.name, "toxicity-classifier");
        assert_eq!(card.model_details.artifact_sha256, None);
        assert_eq!(card.model_details.training_dataset.as_deref(), Some("Jigsaw Toxic Comment Classification"));
        assert_eq!(card.model_details.training_size, Some(10000));
        assert_eq!(card.model_details.classifier.as_ref().map(|c| c.c), Some(4.0));
        assert_eq!(card.caveats, default_caveats());
    }

    #[test]
    fn test_model_card_markdown() {
        let card = ModelCardBuilder::new(metrics(), threshold(0.35))
            .hyperparameters(&TfidfParams::default(), &LogRegParams::default())
            .build();
        let md = card.to_markdown();

        assert!(md.contains("# Model Card: toxicity-classifier"));
        assert!(md.contains("## Performance Metrics (threshold 0.5)"));
        assert!(md.contains("| Test | 0.9000 | 0.7000 | 0.8000 | 0.7200 | n/a |"));
        assert!(md.contains("**Serving threshold:** 0.35"));
        assert!(md.contains("differs from the 0.5"));
        assert!(md.contains("ngram_range=(1, 2)"));
    }

    #[test]
    fn test_threshold_divergence_flag() {
        assert!(!package_model_card(metrics(), threshold(0.5)).threshold_diverges());
        assert!(package_model_card(metrics(), threshold(0.3)).threshold_diverges());

        let md = package_model_card(metrics(), threshold(0.5)).to_markdown();
        assert!(!md.contains("differs from the"));
        // The caveat itself is always present
        assert!(md.contains("fixed threshold of 0.5"));
    }

    #[test]
    fn test_save_json_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let card = package_model_card(metrics(), threshold(0.4));

        let json_path = dir.path().join("toxicity_model_card.json");
        let md_path = dir.path().join("toxicity_model_card.md");
        card.save_json(&json_path).unwrap();
        card.save(&md_path).unwrap();

        let loaded: ModelCard =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(loaded.threshold.threshold, 0.4);
        assert_eq!(loaded.metrics, card.metrics);
        assert!(std::fs::read_to_string(&md_path).unwrap().starts_with("# Model Card"));
    }
}
