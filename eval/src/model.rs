// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Trained toxicity model: TF-IDF vectorizer composed with logistic regression

use crate::classifier::{LogRegParams, LogisticRegression};
use crate::datasets::{Label, Sample};
use crate::vectorizer::{TfidfParams, TfidfVectorizer};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Model type tag recorded in artifacts and model cards
pub const MODEL_TYPE: &str = "tfidf_logreg";

/// Anything that maps text to class probabilities
pub trait ToxicityScorer: Send + Sync {
    /// `[P(non-toxic), P(toxic)]` for each text
    fn predict_proba(&self, texts: &[&str]) -> Vec<[f64; 2]>;

    /// P(toxic) for a single text
    fn score(&self, text: &str) -> f64 {
        self.predict_proba(&[text])
            .first()
            .map(|p| p[1])
            .unwrap_or(0.0)
    }

    /// P(toxic) for each sample's text
    fn score_samples(&self, samples: &[Sample]) -> Vec<f64> {
        let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        self.predict_proba(&texts).into_iter().map(|p| p[1]).collect()
    }
}

/// Fit-once, predict-many text classification pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToxicityModel {
    pub model_type: String,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub training_size: usize,
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
}

impl ToxicityModel {
    /// Fit vectorizer and classifier on the training split
    pub fn train(samples: &[Sample], tfidf: TfidfParams, logreg: LogRegParams) -> Result<Self> {
        tracing::info!("Training {} on {} samples", MODEL_TYPE, samples.len());

        let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        let labels: Vec<Label> = samples.iter().map(|s| s.label).collect();

        let vectorizer = TfidfVectorizer::fit(&texts, tfidf).context("Failed to fit vectorizer")?;
        let features = vectorizer.transform(&texts);
        let classifier = LogisticRegression::fit(&features, &labels, logreg)
            .context("Failed to fit classifier")?;

        Ok(Self {
            model_type: MODEL_TYPE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            training_size: samples.len(),
            vectorizer,
            classifier,
        })
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Terms with the largest positive and negative weights
    pub fn top_terms(&self, n: usize) -> (Vec<(String, f64)>, Vec<(String, f64)>) {
        let names = self.vectorizer.feature_names();
        let mut weighted: Vec<(String, f64)> = names
            .into_iter()
            .zip(self.classifier.weights())
            .map(|(name, w)| (name.to_string(), *w))
            .collect();
        weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let toxic = weighted.iter().take(n).filter(|(_, w)| *w > 0.0).cloned().collect();
        let clean = weighted.iter().rev().take(n).filter(|(_, w)| *w < 0.0).cloned().collect();
        (toxic, clean)
    }

    /// Serialise to JSON, returning the SHA-256 hex digest of the written bytes
    pub fn save(&self, path: &Path) -> Result<String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let bytes = serde_json::to_vec(self).context("Failed to serialise model")?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("Failed to write model artifact: {}", path.display()))?;

        let digest = hex::encode(Sha256::digest(&bytes));
        tracing::info!("Model saved to {} (sha256 {})", path.display(), digest);
        Ok(digest)
    }

    /// Load a model artifact written by [`ToxicityModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Model file not found at {}", path.display()))?;
        let model: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse model artifact: {}", path.display()))?;
        tracing::info!(
            "Loaded {} v{} ({} features) from {}",
            model.model_type,
            model.version,
            model.vectorizer.num_features(),
            path.display()
        );
        Ok(model)
    }
}

impl ToxicityScorer for ToxicityModel {
    fn predict_proba(&self, texts: &[&str]) -> Vec<[f64; 2]> {
        let features = self.vectorizer.transform(texts);
        self.classifier.predict_proba(&features)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::datasets::Dataset;

    /// Scorer returning fixed probabilities keyed by text
    pub(crate) struct FixedScorer(pub Vec<(&'static str, f64)>);

    impl ToxicityScorer for FixedScorer {
        fn predict_proba(&self, texts: &[&str]) -> Vec<[f64; 2]> {
            texts
                .iter()
                .map(|t| {
                    let p = self
                        .0
                        .iter()
                        .find(|(k, _)| k == t)
                        .map(|(_, p)| *p)
                        .unwrap_or(0.0);
                    [1.0 - p, p]
                })
                .collect()
        }
    }

    fn small_params() -> (TfidfParams, LogRegParams) {
        (
            TfidfParams {
                max_features: Some(500),
                ngram_range: (1, 2),
                min_df: 1,
            },
            LogRegParams::default(),
        )
    }

    #[test]
    fn test_train_and_score_synthetic() {
        let dataset = Dataset::load_synthetic(300, 42);
        let (tfidf, logreg) = small_params();
        let model = ToxicityModel::train(&dataset.samples, tfidf, logreg).unwrap();

        assert_eq!(model.model_type, MODEL_TYPE);
        assert_eq!(model.training_size, 300);

        let toxic = model.score("shut up you stupid moron");
        let clean = model.score("thanks for fixing the citation");
        assert!(toxic > 0.5, "toxic score {}", toxic);
        assert!(clean < 0.5, "clean score {}", clean);

        let probs = model.predict_proba(&["anything", "else"]);
        assert_eq!(probs.len(), 2);
        for p in probs {
            assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_save_load_preserves_scores() {
        let dataset = Dataset::load_synthetic(200, 3);
        let (tfidf, logreg) = small_params();
        let model = ToxicityModel::train(&dataset.samples, tfidf, logreg).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("toxicity_model.json");
        let digest = model.save(&path).unwrap();
        assert_eq!(digest.len(), 64);

        let loaded = ToxicityModel::load(&path).unwrap();
        let text = "you are a worthless idiot";
        assert!((loaded.score(text) - model.score(text)).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToxicityModel::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_top_terms_have_expected_signs() {
        let dataset = Dataset::load_synthetic(300, 42);
        let (tfidf, logreg) = small_params();
        let model = ToxicityModel::train(&dataset.samples, tfidf, logreg).unwrap();

        let (toxic, clean) = model.top_terms(5);
        assert!(!toxic.is_empty());
        assert!(!clean.is_empty());
        assert!(toxic.iter().all(|(_, w)| *w > 0.0));
        assert!(clean.iter().all(|(_, w)| *w < 0.0));
    }

    #[test]
    fn test_default_score_uses_toxic_column() {
        let scorer = FixedScorer(vec![("you are wonderful", 0.1)]);
        assert!((scorer.score("you are wonderful") - 0.1).abs() < 1e-12);
        assert_eq!(scorer.score("unknown"), 0.0);
    }
}
