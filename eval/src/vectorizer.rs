// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Word n-gram TF-IDF vectorizer
//!
//! Tokens are lowercase runs of two or more word characters. Term weights use
//! smoothed IDF, `ln((1 + n) / (1 + df)) + 1`, and every row is L2-normalised.

use ahash::{HashMap, HashMapExt};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sprs::CsMat;

/// Vectorizer hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TfidfParams {
    /// Vocabulary cap, keeping the most frequent terms (`None` = unbounded)
    pub max_features: Option<usize>,
    /// Inclusive `(min_n, max_n)` word n-gram sizes
    pub ngram_range: (usize, usize),
    /// Minimum number of documents a term must appear in
    pub min_df: usize,
}

impl Default for TfidfParams {
    fn default() -> Self {
        Self {
            max_features: Some(50_000),
            ngram_range: (1, 2),
            min_df: 2,
        }
    }
}

impl TfidfParams {
    pub fn validate(&self) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            bail!("ngram_range must satisfy 1 <= min_n <= max_n, got ({}, {})", min_n, max_n);
        }
        if self.min_df == 0 {
            bail!("min_df must be at least 1");
        }
        if self.max_features == Some(0) {
            bail!("max_features must be positive when set");
        }
        Ok(())
    }
}

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    params: TfidfParams,
    /// Term to column index, indices assigned in lexicographic term order
    vocabulary: HashMap<String, usize>,
    /// IDF weight per column
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from a corpus
    pub fn fit<T: AsRef<str>>(texts: &[T], params: TfidfParams) -> Result<Self> {
        params.validate()?;
        tracing::debug!(num_texts = texts.len(), "Fitting TfidfVectorizer");

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_count: HashMap<String, usize> = HashMap::new();

        for text in texts {
            for (term, count) in count_terms(text.as_ref(), params.ngram_range) {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
                *term_count.entry(term).or_insert(0) += count;
            }
        }
        let candidate_terms = doc_freq.len();

        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= params.min_df)
            .collect();

        if let Some(max_features) = params.max_features {
            if kept.len() > max_features {
                kept.sort_by(|(a, _), (b, _)| {
                    term_count[b].cmp(&term_count[a]).then_with(|| a.cmp(b))
                });
                kept.truncate(max_features);
            }
        }

        if kept.is_empty() {
            bail!(
                "Empty vocabulary: no term reaches min_df={} across {} documents",
                params.min_df,
                texts.len()
            );
        }

        kept.sort_by(|(a, _), (b, _)| a.cmp(b));

        let n_docs = texts.len() as f64;
        let mut vocabulary = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (idx, (term, df)) in kept.into_iter().enumerate() {
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, idx);
        }

        tracing::info!(
            candidate_terms,
            vocabulary_size = vocabulary.len(),
            "TF-IDF vocabulary built"
        );

        Ok(Self {
            params,
            vocabulary,
            idf,
        })
    }

    /// Transform texts into an L2-normalised CSR matrix of shape `(texts, features)`
    pub fn transform<T: AsRef<str>>(&self, texts: &[T]) -> CsMat<f64> {
        let mut indptr = Vec::with_capacity(texts.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for text in texts {
            let mut row: Vec<(usize, f64)> = count_terms(text.as_ref(), self.params.ngram_range)
                .into_iter()
                .filter_map(|(term, count)| {
                    self.vocabulary
                        .get(&term)
                        .map(|&col| (col, count as f64 * self.idf[col]))
                })
                .collect();
            row.sort_by_key(|(col, _)| *col);

            let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            for (col, value) in row {
                indices.push(col);
                data.push(if norm > 0.0 { value / norm } else { value });
            }
            indptr.push(indices.len());
        }

        CsMat::new((texts.len(), self.num_features()), indptr, indices, data)
    }

    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    pub fn vocabulary(&self) -> &HashMap<String, usize> {
        &self.vocabulary
    }

    pub fn params(&self) -> &TfidfParams {
        &self.params
    }

    /// Feature names ordered by column index
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names = vec![""; self.num_features()];
        for (term, &idx) in &self.vocabulary {
            names[idx] = term.as_str();
        }
        names
    }
}

/// Lowercase word tokens of at least two characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| s.chars().count() >= 2)
        .map(|s| s.to_string())
        .collect()
}

/// Space-joined word n-grams for every size in `ngram_range`
pub fn ngrams(tokens: &[String], ngram_range: (usize, usize)) -> Vec<String> {
    let (min_n, max_n) = ngram_range;
    let mut grams = Vec::new();
    for n in min_n..=max_n {
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

fn count_terms(text: &str, ngram_range: (usize, usize)) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for gram in ngrams(&tokenize(text), ngram_range) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_features: Option<usize>, ngram_range: (usize, usize), min_df: usize) -> TfidfParams {
        TfidfParams {
            max_features,
            ngram_range,
            min_df,
        }
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("You're a BIG_fan, a-b of it!"),
            vec!["you", "re", "big_fan", "of", "it"]
        );
        assert!(tokenize("a b c !").is_empty());
    }

    #[test]
    fn test_ngrams() {
        let tokens = tokenize("you are very rude");
        let grams = ngrams(&tokens, (1, 2));
        assert_eq!(
            grams,
            vec!["you", "are", "very", "rude", "you are", "are very", "very rude"]
        );
    }

    #[test]
    fn test_min_df_filters_rare_terms() {
        let texts = ["good work", "good idea", "bad idea"];
        let vectorizer = TfidfVectorizer::fit(&texts, params(None, (1, 1), 2)).unwrap();

        assert_eq!(vectorizer.feature_names(), vec!["good", "idea"]);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let texts = ["spam spam spam eggs", "spam eggs ham", "ham toast"];
        let vectorizer = TfidfVectorizer::fit(&texts, params(Some(2), (1, 1), 1)).unwrap();

        // spam=4, eggs=2, ham=2, toast=1; tie between eggs/ham resolved lexicographically
        assert_eq!(vectorizer.num_features(), 2);
        assert_eq!(vectorizer.feature_names(), vec!["eggs", "spam"]);
    }

    #[test]
    fn test_rows_are_unit_norm() {
        let texts = ["you are an idiot", "thanks for the edit", "idiot edit"];
        let vectorizer = TfidfVectorizer::fit(&texts, params(None, (1, 2), 1)).unwrap();
        let matrix = vectorizer.transform(&texts);

        assert_eq!(matrix.rows(), 3);
        assert_eq!(matrix.cols(), vectorizer.num_features());
        for row in matrix.outer_iterator() {
            let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unseen_text_is_zero_row() {
        let vectorizer = TfidfVectorizer::fit(&["hello there"], params(None, (1, 1), 1)).unwrap();
        let matrix = vectorizer.transform(&["completely novel words", ""]);

        assert_eq!(matrix.nnz(), 0);
        assert_eq!(matrix.rows(), 2);
    }

    #[test]
    fn test_idf_is_smoothed() {
        let texts = ["alpha beta", "alpha"];
        let vectorizer = TfidfVectorizer::fit(&texts, params(None, (1, 1), 1)).unwrap();

        let alpha = vectorizer.vocabulary()["alpha"];
        let beta = vectorizer.vocabulary()["beta"];
        assert!((vectorizer.idf[alpha] - 1.0).abs() < 1e-12);
        assert!((vectorizer.idf[beta] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_columns_independent_of_hasher_state() {
        let texts = ["you are an idiot", "thanks for the edit", "idiot edit", "thanks idiot"];
        let a = TfidfVectorizer::fit(&texts, params(None, (1, 2), 1)).unwrap();
        let b = TfidfVectorizer::fit(&texts, params(None, (1, 2), 1)).unwrap();
        assert_eq!(a.feature_names(), b.feature_names());

        let json = serde_json::to_string(&a).unwrap();
        let restored: TfidfVectorizer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.vocabulary(), a.vocabulary());
        assert_eq!(restored.transform(&texts), a.transform(&texts));
    }

    #[test]
    fn test_empty_vocabulary_is_error() {
        assert!(TfidfVectorizer::fit(&["a b", "c"], params(None, (1, 1), 1)).is_err());
        assert!(TfidfVectorizer::fit(&["one two"], params(None, (1, 1), 5)).is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(params(None, (2, 1), 1).validate().is_err());
        assert!(params(None, (0, 1), 1).validate().is_err());
        assert!(params(Some(0), (1, 1), 1).validate().is_err());
        assert!(params(None, (1, 1), 0).validate().is_err());
        assert!(TfidfParams::default().validate().is_ok());
    }
}
