// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Training pipeline CLI for the toxicity classifier
//!
//! Usage:
//!   toxicity-pipeline --config conf/parameters.yml
//!   toxicity-pipeline --dataset synthetic --synthetic-size 2000 --seed 7

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use toxicity_eval::config::PipelineConfig;
use toxicity_eval::pipeline::{DatasetSource, ToxicityPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatasetKind {
    Jigsaw,
    Synthetic,
}

#[derive(Parser, Debug)]
#[command(name = "toxicity-pipeline")]
#[command(about = "Train, evaluate and package the toxicity classifier")]
#[command(version)]
struct Args {
    /// YAML parameter file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset to train on
    #[arg(short, long, value_enum, default_value_t = DatasetKind::Jigsaw)]
    dataset: DatasetKind,

    /// Directory containing train.csv (overrides the parameter file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Cap on raw rows read
    #[arg(long)]
    max_rows: Option<usize>,

    /// Random seed for splitting and synthetic data
    #[arg(short, long)]
    seed: Option<u64>,

    /// Disable label-stratified splitting
    #[arg(long)]
    no_stratify: bool,

    /// Root output directory for models and reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of samples for the synthetic dataset
    #[arg(long, default_value_t = 2000)]
    synthetic_size: usize,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match self.config {
            Some(ref path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load parameters from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(ref data_dir) = self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if self.max_rows.is_some() {
            config.max_rows = self.max_rows;
        }
        if let Some(seed) = self.seed {
            config.split.random_state = seed;
        }
        if self.no_stratify {
            config.split.stratify = false;
        }
        if let Some(ref output) = self.output {
            config.output_dir = output.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn source(&self, config: &PipelineConfig) -> DatasetSource {
        match self.dataset {
            DatasetKind::Jigsaw => DatasetSource::Jigsaw,
            DatasetKind::Synthetic => DatasetSource::Synthetic {
                size: self.synthetic_size,
                seed: config.split.random_state,
            },
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    let source = args.source(&config);

    tracing::info!("Toxicity Classifier Training Pipeline");
    tracing::info!("=====================================");
    tracing::info!("Dataset: {:?}", source);
    tracing::info!("Seed: {}", config.split.random_state);
    tracing::info!("Stratify: {}", config.split.stratify);

    let pipeline = ToxicityPipeline::new(config, source);
    let mut run = pipeline.run()?;
    let paths = pipeline.save_artifacts(&mut run)?;

    let results = &run.results;

    // Print summary to console
    println!("\n{}", "=".repeat(70));
    println!("TRAINING SUMMARY");
    println!("{}", "=".repeat(70));
    println!(
        "\nExamples: {} (train={}, val={}, test={})",
        results.dataset_info.total_samples,
        results.split_sizes.train,
        results.split_sizes.validation,
        results.split_sizes.test
    );
    println!("Vocabulary: {} terms", results.vocabulary_size);
    println!("\nMetrics @ 0.5:");
    println!("{:-<70}", "");
    println!("{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}", "Split", "Accuracy", "Precision", "Recall", "F1", "ROC-AUC");
    println!("{:-<70}", "");
    for (name, m) in [("Validation", &results.metrics.val), ("Test", &results.metrics.test)] {
        let auc = m.roc_auc.map_or("-".to_string(), |v| format!("{:.4}", v));
        println!(
            "{:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10}",
            name, m.accuracy, m.precision, m.recall, m.f1, auc
        );
    }
    println!("{:-<70}", "");
    println!(
        "\nServing threshold: {:.2} (validation F1 {:.4})",
        results.threshold.threshold, results.threshold.f1
    );

    println!("\nModel saved to: {}", paths.model.display());
    println!("Threshold saved to: {}", paths.threshold.display());
    println!("Model card saved to: {}", paths.model_card_md.display());
    println!("Report saved to: {}", paths.report.display());

    println!("\nTraining complete!");

    Ok(())
}
