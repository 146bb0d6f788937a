// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Training, evaluation and serving for a binary text-toxicity classifier
//!
//! This crate provides:
//! - Jigsaw CSV loading with sub-label collapsing, plus dataset exploration
//! - Seeded, optionally stratified train/validation/test splitting
//! - TF-IDF + class-balanced logistic regression training
//! - Evaluation metrics (Accuracy, Precision, Recall, F1, ROC-AUC)
//! - F1-optimal decision threshold tuning
//! - Model cards for ML transparency
//! - An HTTP scoring service over the trained artifact

pub mod classifier;
pub mod config;
pub mod datasets;
pub mod evaluation;
pub mod exploration;
pub mod metrics;
pub mod model;
pub mod model_card;
pub mod pipeline;
pub mod server;
pub mod split;
pub mod threshold;
pub mod vectorizer;

pub use classifier::{LogRegParams, LogisticRegression};
pub use config::{ConfigError, PipelineConfig};
pub use datasets::{Dataset, DatasetConfig, DatasetError, Label, Sample};
pub use evaluation::{evaluate_model, ToxicityMetrics, EVAL_THRESHOLD};
pub use exploration::{add_length_features, compute_basic_summary, label_distribution, DatasetSummary};
pub use metrics::{ClassificationReport, ConfusionMatrix, SplitMetrics};
pub use model::{ToxicityModel, ToxicityScorer};
pub use model_card::{package_model_card, ModelCard, ModelCardBuilder};
pub use pipeline::{DatasetSource, PipelineResults, ToxicityPipeline};
pub use server::{AppState, ServeConfig};
pub use split::{split_data, DatasetSplit, SplitConfig, SplitError};
pub use threshold::{load_threshold, load_threshold_or_default, tune_threshold_for_f1, ThresholdInfo, ThresholdLoadError};
pub use vectorizer::{TfidfParams, TfidfVectorizer};
