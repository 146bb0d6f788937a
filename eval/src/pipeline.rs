// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible training pipeline for toxicity classification
//!
//! Orchestrates:
//! - Dataset loading and exploration
//! - Seeded train/validation/test split
//! - TF-IDF + logistic regression training
//! - Evaluation at the fixed 0.5 threshold
//! - F1-optimal threshold tuning on validation
//! - Model card packaging and artifact serialization

use crate::classifier::FitSummary;
use crate::config::PipelineConfig;
use crate::datasets::Dataset;
use crate::evaluation::{classification_report, evaluate_model, ToxicityMetrics, EVAL_THRESHOLD};
use crate::exploration::{add_length_features, save_length_features, ExplorationReport};
use crate::metrics::ClassificationReport;
use crate::model::ToxicityModel;
use crate::model_card::{ModelCard, ModelCardBuilder};
use crate::split::{split_data, SplitSizes};
use crate::threshold::{tune_threshold_for_f1, ThresholdInfo};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MODEL_FILE: &str = "toxicity_model.json";
pub const THRESHOLD_FILE: &str = "toxicity_threshold.json";
pub const MODEL_CARD_JSON_FILE: &str = "toxicity_model_card.json";
pub const MODEL_CARD_MD_FILE: &str = "toxicity_model_card.md";
pub const METRICS_FILE: &str = "toxicity_metrics.json";
pub const LENGTH_FEATURES_FILE: &str = "toxicity_length_features.csv";
pub const REPORT_FILE: &str = "toxicity_report.md";

/// Where the labeled examples come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatasetSource {
    /// `train.csv` under the configured data directory
    Jigsaw,
    /// Generated examples, for smoke runs without the real data
    Synthetic { size: usize, seed: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    pub source: String,
    pub rows_read: usize,
    pub total_samples: usize,
    pub positive_rate: f64,
}

/// Everything a run computed, minus the model itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResults {
    pub config: PipelineConfig,
    pub dataset_info: DatasetInfo,
    pub exploration: ExplorationReport,
    pub split_sizes: SplitSizes,
    pub vocabulary_size: usize,
    pub fit_summary: FitSummary,
    pub metrics: ToxicityMetrics,
    pub threshold: ThresholdInfo,
    /// Test split scored at the tuned serving threshold
    pub serving_test_report: ClassificationReport,
    pub top_toxic_terms: Vec<(String, f64)>,
    pub top_clean_terms: Vec<(String, f64)>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Output of [`ToxicityPipeline::run`]
pub struct PipelineRun {
    pub results: PipelineResults,
    pub model: ToxicityModel,
    pub model_card: ModelCard,
    /// Kept for the length-features artifact
    dataset: Dataset,
}

/// Files written by [`ToxicityPipeline::save_artifacts`]
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub threshold: PathBuf,
    pub model_card_json: PathBuf,
    pub model_card_md: PathBuf,
    pub metrics: PathBuf,
    pub report: PathBuf,
    pub exploration_dir: PathBuf,
}

/// Main training pipeline
pub struct ToxicityPipeline {
    config: PipelineConfig,
    source: DatasetSource,
}

impl ToxicityPipeline {
    pub fn new(config: PipelineConfig, source: DatasetSource) -> Self {
        Self { config, source }
    }

    /// Load the configured dataset
    pub fn load_dataset(&self) -> Result<Dataset> {
        let dataset = match self.source {
            DatasetSource::Jigsaw => Dataset::load_jigsaw(&self.config.data_dir, self.config.max_rows)?,
            DatasetSource::Synthetic { size, seed } => {
                tracing::info!("Generating synthetic dataset of {} samples with seed {}", size, seed);
                let mut dataset = Dataset::load_synthetic(size, seed);
                if let Some(max_rows) = self.config.max_rows {
                    dataset.samples.truncate(max_rows);
                    dataset.rows_read = dataset.samples.len();
                }
                dataset
            }
        };

        tracing::info!(
            "Dataset loaded: {} samples (positive rate {:.4})",
            dataset.len(),
            Dataset::positive_rate(&dataset.samples)
        );
        Ok(dataset)
    }

    /// Run every stage in memory
    pub fn run(&self) -> Result<PipelineRun> {
        self.config.validate()?;

        let dataset = self.load_dataset()?;
        let exploration = ExplorationReport::from_samples(&dataset.samples);

        let split = split_data(&dataset.samples, &self.config.split).context("Failed to split dataset")?;

        let model = ToxicityModel::train(
            &split.train,
            self.config.tfidf.clone(),
            self.config.logreg.clone(),
        )?;

        let metrics = evaluate_model(&model, &split.validation, &split.test);
        let threshold = tune_threshold_for_f1(&model, &split.validation);

        if (threshold.threshold - EVAL_THRESHOLD).abs() > 1e-9 {
            tracing::warn!(
                "Tuned threshold {:.2} differs from the {} used for reported metrics",
                threshold.threshold,
                EVAL_THRESHOLD
            );
        }

        let serving_test_report = classification_report(&model, &split.test, threshold.threshold);
        tracing::info!(
            "Test @ {:.2}: F1={:.4} MCC={:.4} Specificity={:.4}",
            threshold.threshold,
            serving_test_report.f1_score,
            serving_test_report.mcc,
            serving_test_report.specificity
        );

        let model_card = ModelCardBuilder::new(metrics.clone(), threshold.clone())
            .training_dataset(&dataset.config.name)
            .training_size(split.train.len())
            .hyperparameters(&self.config.tfidf, &self.config.logreg)
            .build();

        let (top_toxic_terms, top_clean_terms) = model.top_terms(10);

        let results = PipelineResults {
            config: self.config.clone(),
            dataset_info: DatasetInfo {
                id: dataset.config.id.clone(),
                name: dataset.config.name.clone(),
                source: dataset.config.source.clone(),
                rows_read: dataset.rows_read,
                total_samples: dataset.len(),
                positive_rate: Dataset::positive_rate(&dataset.samples),
            },
            exploration,
            split_sizes: split.sizes(),
            vocabulary_size: model.vectorizer().num_features(),
            fit_summary: *model.classifier().summary(),
            metrics,
            threshold,
            serving_test_report,
            top_toxic_terms,
            top_clean_terms,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        Ok(PipelineRun {
            results,
            model,
            model_card,
            dataset,
        })
    }

    /// Persist model, threshold, metrics, model card, exploration and report
    ///
    /// The model card is updated with the SHA-256 of the written model.
    pub fn save_artifacts(&self, run: &mut PipelineRun) -> Result<ArtifactPaths> {
        let models_dir = self.config.models_dir();
        let reporting_dir = self.config.reporting_dir();
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create {}", models_dir.display()))?;
        std::fs::create_dir_all(&reporting_dir)
            .with_context(|| format!("Failed to create {}", reporting_dir.display()))?;

        let paths = ArtifactPaths {
            model: models_dir.join(MODEL_FILE),
            threshold: models_dir.join(THRESHOLD_FILE),
            model_card_json: models_dir.join(MODEL_CARD_JSON_FILE),
            model_card_md: models_dir.join(MODEL_CARD_MD_FILE),
            metrics: reporting_dir.join(METRICS_FILE),
            report: reporting_dir.join(REPORT_FILE),
            exploration_dir: reporting_dir.clone(),
        };

        let digest = run.model.save(&paths.model)?;
        run.model_card.model_details.artifact_sha256 = Some(digest);

        run.results.threshold.save(&paths.threshold)?;
        run.results.metrics.save_json(&paths.metrics)?;
        run.model_card.save_json(&paths.model_card_json)?;
        run.model_card.save(&paths.model_card_md)?;

        run.results.exploration.save(&paths.exploration_dir)?;
        save_length_features(
            &add_length_features(&run.dataset.samples),
            &reporting_dir.join(LENGTH_FEATURES_FILE),
        )?;

        std::fs::write(&paths.report, Self::generate_report(&run.results))
            .with_context(|| format!("Failed to write report: {}", paths.report.display()))?;

        tracing::info!(
            "Artifacts written to {} and {}",
            models_dir.display(),
            reporting_dir.display()
        );
        Ok(paths)
    }

    /// Generate a markdown report
    pub fn generate_report(results: &PipelineResults) -> String {
        let mut report = String::new();

        report.push_str("# Toxicity Classifier Training Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        report.push_str("## Dataset\n\n");
        report.push_str(&format!("- **ID:** {}\n", results.dataset_info.id));
        report.push_str(&format!("- **Name:** {}\n", results.dataset_info.name));
        report.push_str(&format!("- **Rows Read:** {}\n", results.dataset_info.rows_read));
        report.push_str(&format!("- **Labeled Examples:** {}\n", results.dataset_info.total_samples));
        report.push_str(&format!("- **Positive Rate:** {:.4}\n", results.dataset_info.positive_rate));
        report.push_str(&format!(
            "- **Split Sizes:** Train={}, Val={}, Test={}\n",
            results.split_sizes.train, results.split_sizes.validation, results.split_sizes.test
        ));
        report.push_str(&format!(
            "- **Text Length (chars):** avg={:.1}, p50={:.1}, p95={:.1}\n\n",
            results.exploration.summary.avg_text_length_chars,
            results.exploration.summary.p50_text_length_chars,
            results.exploration.summary.p95_text_length_chars
        ));

        report.push_str("## Model\n\n");
        report.push_str(&format!("- **Vocabulary Size:** {}\n", results.vocabulary_size));
        report.push_str(&format!(
            "- **Optimizer:** {} iterations, converged={}, final gradient norm={:.2e}\n\n",
            results.fit_summary.iterations,
            results.fit_summary.converged,
            results.fit_summary.final_gradient_norm
        ));

        report.push_str(&format!("## Metrics (threshold {})\n\n", EVAL_THRESHOLD));
        report.push_str("| Split | Accuracy | Precision | Recall | F1 | ROC-AUC |\n");
        report.push_str("|-------|----------|-----------|--------|-----|---------|\n");
        for (split, m) in [("Validation", &results.metrics.val), ("Test", &results.metrics.test)] {
            let auc = m.roc_auc.map_or("-".to_string(), |v| format!("{:.4}", v));
            report.push_str(&format!(
                "| {} | {:.4} | {:.4} | {:.4} | {:.4} | {} |\n",
                split, m.accuracy, m.precision, m.recall, m.f1, auc
            ));
        }
        report.push('\n');

        report.push_str("## Serving Threshold\n\n");
        report.push_str(&format!(
            "- **Threshold:** {:.2} (validation F1 {:.4})\n",
            results.threshold.threshold, results.threshold.f1
        ));
        report.push_str(&format!(
            "- **Validation Positive Rate:** {:.4}\n\n",
            results.threshold.val_positive_rate
        ));
        report.push_str(&format!(
            "> Note: the metrics above use a fixed threshold of {}, while the deployed \
             model uses the tuned threshold of {:.2}. They describe different decision boundaries.\n\n",
            EVAL_THRESHOLD, results.threshold.threshold
        ));

        report.push_str(&format!(
            "## Test Split at Serving Threshold {:.2}\n\n",
            results.threshold.threshold
        ));
        report.push_str(&format!("```text\n{}```\n\n", results.serving_test_report.format()));

        if !results.top_toxic_terms.is_empty() {
            report.push_str("## Top Terms\n\n");
            report.push_str("| Toxic | Weight | Clean | Weight |\n");
            report.push_str("|-------|--------|-------|--------|\n");
            let rows = results.top_toxic_terms.len().max(results.top_clean_terms.len());
            for i in 0..rows {
                let (tt, tw) = results.top_toxic_terms.get(i).map_or((String::new(), String::new()), |(t, w)| {
                    (t.clone(), format!("{:.3}", w))
                });
                let (ct, cw) = results.top_clean_terms.get(i).map_or((String::new(), String::new()), |(t, w)| {
                    (t.clone(), format!("{:.3}", w))
                });
                report.push_str(&format!("| {} | {} | {} | {} |\n", tt, tw, ct, cw));
            }
            report.push('\n');
        }

        report.push_str("## Configuration\n\n");
        match serde_yaml::to_string(&results.config) {
            Ok(yaml) => report.push_str(&format!("```yaml\n{}```\n", yaml)),
            Err(e) => {
                tracing::warn!("Could not render configuration for the report: {}", e);
                report.push_str("_Configuration could not be rendered._\n");
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::load_threshold;
    use crate::vectorizer::TfidfParams;
    use std::path::Path;

    fn synthetic_pipeline(output_dir: &Path) -> ToxicityPipeline {
        let config = PipelineConfig {
            output_dir: output_dir.to_path_buf(),
            tfidf: TfidfParams {
                max_features: Some(1000),
                ..Default::default()
            },
            ..Default::default()
        };
        ToxicityPipeline::new(config, DatasetSource::Synthetic { size: 400, seed: 42 })
    }

    #[test]
    fn test_pipeline_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let run = synthetic_pipeline(dir.path()).run().expect("Pipeline should succeed");
        let results = &run.results;

        assert_eq!(results.dataset_info.total_samples, 400);
        assert_eq!(
            results.split_sizes.train + results.split_sizes.validation + results.split_sizes.test,
            400
        );
        assert_eq!(results.split_sizes.test, 60);
        // ceil(340 * 0.15 / 0.85) = ceil(60.00000000000001)
        assert_eq!(results.split_sizes.validation, 61);

        assert!(results.metrics.val.f1 >= 0.0 && results.metrics.val.f1 <= 1.0);
        assert!(results.metrics.test.roc_auc.is_some());
        assert!(results.threshold.threshold >= 0.05 && results.threshold.threshold <= 0.95);
        assert_eq!(run.model_card.model_type, "tfidf_logreg");
        assert_eq!(run.model_card.threshold, results.threshold);
    }

    #[test]
    fn test_save_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = synthetic_pipeline(dir.path());
        let mut run = pipeline.run().unwrap();
        let paths = pipeline.save_artifacts(&mut run).unwrap();

        assert_eq!(paths.model, dir.path().join("06_models").join(MODEL_FILE));
        for path in [
            &paths.model,
            &paths.threshold,
            &paths.model_card_json,
            &paths.model_card_md,
            &paths.metrics,
            &paths.report,
        ] {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert!(paths.exploration_dir.join("dataset_summary.json").exists());
        assert!(paths.exploration_dir.join(LENGTH_FEATURES_FILE).exists());

        assert_eq!(load_threshold(&paths.threshold).unwrap(), run.results.threshold.threshold);

        let card: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.model_card_json).unwrap()).unwrap();
        assert_eq!(card["model_details"]["artifact_sha256"].as_str().map(str::len), Some(64));

        let metrics: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.metrics).unwrap()).unwrap();
        assert!(metrics["val"]["f1"].is_number());
        assert!(metrics["test"]["accuracy"].is_number());
    }

    #[test]
    fn test_run_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = synthetic_pipeline(dir.path());
        let a = pipeline.run().unwrap();
        let b = pipeline.run().unwrap();

        assert_eq!(a.results.metrics, b.results.metrics);
        assert_eq!(a.results.threshold.threshold, b.results.threshold.threshold);
        assert_eq!(a.results.vocabulary_size, b.results.vocabulary_size);
    }

    #[test]
    fn test_generate_report() {
        let dir = tempfile::tempdir().unwrap();
        let run = synthetic_pipeline(dir.path()).run().unwrap();
        let report = ToxicityPipeline::generate_report(&run.results);

        assert!(report.contains("Toxicity Classifier Training Report"));
        assert!(report.contains("## Metrics (threshold 0.5)"));
        assert!(report.contains("fixed threshold of 0.5"));
        assert!(report.contains("Split Sizes"));
        assert!(report.contains("```yaml\n"));
        assert!(report.contains("test_size: 0.15"));
        assert!(!report.contains("could not be rendered"));
    }

    #[test]
    fn test_report_includes_serving_threshold_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let run = synthetic_pipeline(dir.path()).run().unwrap();
        let results = &run.results;

        let test_report = &results.serving_test_report;
        assert_eq!(test_report.support, results.split_sizes.test);
        assert!(test_report.mcc >= -1.0 && test_report.mcc <= 1.0);
        assert!(test_report.specificity >= 0.0 && test_report.specificity <= 1.0);

        let report = ToxicityPipeline::generate_report(results);
        let heading = format!("## Test Split at Serving Threshold {:.2}", results.threshold.threshold);
        assert!(report.contains(&heading));
        assert!(report.contains("MCC:"));
        assert!(report.contains("Specificity:"));
        assert!(report.contains("Confusion Matrix:"));
    }

    #[test]
    fn test_max_rows_caps_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            output_dir: dir.path().to_path_buf(),
            max_rows: Some(100),
            ..Default::default()
        };
        let pipeline = ToxicityPipeline::new(config, DatasetSource::Synthetic { size: 400, seed: 1 });
        assert_eq!(pipeline.load_dataset().unwrap().len(), 100);
    }

    #[test]
    fn test_missing_jigsaw_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().join("absent"),
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(ToxicityPipeline::new(config, DatasetSource::Jigsaw).run().is_err());
    }
}
