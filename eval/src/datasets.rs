// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading for toxicity classification
//!
//! Reads the Jigsaw toxic comment CSV and collapses its six sub-category
//! flags into a single binary label.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Column holding the free-text comment
pub const TEXT_COLUMN: &str = "comment_text";

/// Optional row identifier column
pub const ID_COLUMN: &str = "id";

/// Sub-category flags OR-reduced into the binary label
pub const TOXICITY_COLUMNS: [&str; 6] = [
    "toxic",
    "severe_toxic",
    "obscene",
    "threat",
    "insult",
    "identity_hate",
];

/// Schema violations in a raw dataset file
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Non-numeric value {value:?} in column '{column}' at row {row}")]
    InvalidLabel {
        row: usize,
        column: String,
        value: String,
    },
}

/// Binary toxicity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// No sub-category flag set
    NonToxic,
    /// At least one sub-category flag set
    Toxic,
}

impl Label {
    /// Convert to numeric value for metrics calculation
    pub fn to_binary(&self) -> u8 {
        match self {
            Label::Toxic => 1,
            Label::NonToxic => 0,
        }
    }

    /// Apply a decision threshold to a toxicity probability (boundary-inclusive)
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Label::Toxic
        } else {
            Label::NonToxic
        }
    }
}

/// A single labeled example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique identifier (source `id` column, or row position)
    pub id: String,
    /// Comment text, never blank after loading
    pub text: String,
    /// Ground truth label
    pub label: Label,
}

/// Descriptive metadata for a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub label_columns: Vec<String>,
}

impl DatasetConfig {
    fn jigsaw(source: &Path) -> Self {
        Self {
            id: "jigsaw".to_string(),
            name: "Jigsaw Toxic Comment Classification".to_string(),
            description: "Wikipedia talk-page comments with six toxicity sub-labels".to_string(),
            source: source.display().to_string(),
            label_columns: TOXICITY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A loaded, cleaned dataset ready for splitting
#[derive(Debug, Clone)]
pub struct Dataset {
    pub config: DatasetConfig,
    pub samples: Vec<Sample>,
    /// Rows read from the source before blank-text filtering
    pub rows_read: usize,
}

impl Dataset {
    /// Load `train.csv` from a Jigsaw data directory
    pub fn load_jigsaw(data_dir: &Path, max_rows: Option<usize>) -> Result<Self> {
        let path = data_dir.join("train.csv");
        tracing::info!("Loading Jigsaw dataset from {}", path.display());

        let file = File::open(&path)
            .with_context(|| format!("Failed to open dataset file: {}", path.display()))?;

        let mut dataset = Self::from_reader(file, max_rows)
            .with_context(|| format!("Failed to load dataset from {}", path.display()))?;
        dataset.config = DatasetConfig::jigsaw(&path);
        Ok(dataset)
    }

    /// Parse Jigsaw-formatted CSV from any reader
    ///
    /// `max_rows` caps the rows read before blank-text rows are dropped.
    pub fn from_reader<R: Read>(reader: R, max_rows: Option<usize>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers().context("Failed to read CSV header")?.clone();
        let column_index = |name: &str| -> Result<usize, DatasetError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let text_idx = column_index(TEXT_COLUMN)?;
        let label_idx = TOXICITY_COLUMNS
            .iter()
            .map(|name| column_index(name).map(|idx| (*name, idx)))
            .collect::<Result<Vec<_>, _>>()?;
        let id_idx = headers.iter().position(|h| h == ID_COLUMN);

        let limit = max_rows.unwrap_or(usize::MAX);
        let mut samples = Vec::new();
        let mut rows_read = 0usize;

        for (row, result) in reader.records().take(limit).enumerate() {
            let record = result.with_context(|| format!("Failed to read record {}", row))?;
            rows_read += 1;

            let mut flag_sum = 0.0;
            for (column, idx) in &label_idx {
                flag_sum += parse_flag(record.get(*idx).unwrap_or(""), row, column)?;
            }

            let text = record.get(text_idx).unwrap_or("");
            if text.trim().is_empty() {
                continue;
            }

            let id = id_idx
                .and_then(|idx| record.get(idx))
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("row_{}", row));

            samples.push(Sample {
                id,
                text: text.to_string(),
                label: if flag_sum > 0.0 { Label::Toxic } else { Label::NonToxic },
            });
        }

        let dropped = rows_read - samples.len();
        if dropped > 0 {
            tracing::info!("Dropped {} rows with empty text", dropped);
        }
        tracing::info!("Loaded {} labeled examples from {} rows", samples.len(), rows_read);

        Ok(Self {
            config: DatasetConfig::jigsaw(Path::new("<reader>")),
            samples,
            rows_read,
        })
    }

    /// Build a synthetic dataset for development/testing
    pub fn load_synthetic(size: usize, seed: u64) -> Self {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let config = DatasetConfig {
            id: "synthetic".to_string(),
            name: "Synthetic Toxicity Dataset".to_string(),
            description: "Generated dataset for pipeline testing".to_string(),
            source: "generated".to_string(),
            label_columns: vec!["toxic".to_string()],
        };

        let toxic_phrases = [
            "you are a worthless idiot",
            "shut up you stupid moron",
            "I will hurt you and your family",
            "this is garbage written by a loser",
            "get lost you pathetic clown",
        ];

        let clean_phrases = [
            "thanks for fixing the citation",
            "I think the article needs another source",
            "great work on the history section",
            "please discuss the change on the talk page",
            "the references look good to me",
        ];

        // Roughly one in four is toxic, mirroring a minority positive class
        let samples: Vec<Sample> = (0..size)
            .map(|i| {
                let is_toxic = rng.gen_bool(0.25);
                let phrases = if is_toxic { &toxic_phrases } else { &clean_phrases };
                let phrase_idx = rng.gen_range(0..phrases.len());

                Sample {
                    id: format!("synthetic_{}", i),
                    text: format!("{} comment {}", phrases[phrase_idx], i),
                    label: if is_toxic { Label::Toxic } else { Label::NonToxic },
                }
            })
            .collect();

        Self {
            config,
            rows_read: samples.len(),
            samples,
        }
    }

    /// Number of labeled examples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fraction of samples labeled toxic (0.0 for an empty slice)
    pub fn positive_rate(samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let positives = samples.iter().filter(|s| s.label == Label::Toxic).count();
        positives as f64 / samples.len() as f64
    }
}

/// Parse one sub-label cell; blank cells count as 0
fn parse_flag(value: &str, row: usize, column: &str) -> Result<f64, DatasetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed.parse::<f64>().map_err(|_| DatasetError::InvalidLabel {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,comment_text,toxic,severe_toxic,obscene,threat,insult,identity_hate";

    fn load(body: &str, max_rows: Option<usize>) -> Result<Dataset> {
        let csv = format!("{}\n{}", HEADER, body);
        Dataset::from_reader(csv.as_bytes(), max_rows)
    }

    #[test]
    fn test_drops_empty_text_and_or_reduces_labels() {
        let dataset = load(
            "a1,you are wonderful,0,0,0,0,0,0\n\
             a2,I will kill you,0,0,0,1,0,0\n\
             a3,,0,0,0,0,0,0\n",
            None,
        )
        .unwrap();

        assert_eq!(dataset.rows_read, 3);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.samples[0].text, "you are wonderful");
        assert_eq!(dataset.samples[0].label, Label::NonToxic);
        assert_eq!(dataset.samples[1].text, "I will kill you");
        assert_eq!(dataset.samples[1].label, Label::Toxic);
    }

    #[test]
    fn test_whitespace_only_text_is_dropped() {
        let dataset = load("a1,\"   \n\t\",1,0,0,0,0,0\na2,fine,0,0,0,0,0,0\n", None).unwrap();

        assert_eq!(dataset.len(), 1);
        assert!(dataset.samples.iter().all(|s| !s.text.trim().is_empty()));
    }

    #[test]
    fn test_any_flag_makes_toxic() {
        let body: String = (0..6)
            .map(|i| {
                let flags: Vec<&str> = (0..6).map(|j| if i == j { "1" } else { "0" }).collect();
                format!("r{},text {},{}\n", i, i, flags.join(","))
            })
            .collect();
        let dataset = load(&body, None).unwrap();

        assert_eq!(dataset.len(), 6);
        assert!(dataset.samples.iter().all(|s| s.label == Label::Toxic));
    }

    #[test]
    fn test_max_rows_applies_before_filtering() {
        let dataset = load(
            "a1,,0,0,0,0,0,0\na2,hello,0,0,0,0,0,0\na3,again,1,0,0,0,0,0\n",
            Some(2),
        )
        .unwrap();

        assert_eq!(dataset.rows_read, 2);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.samples[0].id, "a2");
    }

    #[test]
    fn test_missing_label_column_fails() {
        let csv = "id,comment_text,toxic,severe_toxic,obscene,threat,insult\na,b,0,0,0,0,0\n";
        let err = Dataset::from_reader(csv.as_bytes(), None).unwrap_err();

        match err.downcast_ref::<DatasetError>() {
            Some(DatasetError::MissingColumn(col)) => assert_eq!(col, "identity_hate"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_flag_fails() {
        let err = load("a1,text,yes,0,0,0,0,0\n", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::InvalidLabel { row: 0, .. })
        ));
    }

    #[test]
    fn test_missing_id_column_uses_row_position() {
        let csv = "comment_text,toxic,severe_toxic,obscene,threat,insult,identity_hate\nhi,0,0,0,0,0,0\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), None).unwrap();
        assert_eq!(dataset.samples[0].id, "row_0");
    }

    #[test]
    fn test_load_jigsaw_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("train.csv"),
            format!("{}\nx,some comment,0,0,1,0,0,0\n", HEADER),
        )
        .unwrap();

        let dataset = Dataset::load_jigsaw(dir.path(), None).unwrap();
        assert_eq!(dataset.config.id, "jigsaw");
        assert_eq!(dataset.samples[0].label, Label::Toxic);

        assert!(Dataset::load_jigsaw(&dir.path().join("missing"), None).is_err());
    }

    #[test]
    fn test_synthetic_dataset() {
        let dataset = Dataset::load_synthetic(1000, 42);

        assert_eq!(dataset.config.id, "synthetic");
        assert_eq!(dataset.len(), 1000);

        let rate = Dataset::positive_rate(&dataset.samples);
        assert!(rate > 0.15 && rate < 0.35, "positive rate {}", rate);

        let again = Dataset::load_synthetic(1000, 42);
        assert_eq!(dataset.samples, again.samples);
    }

    #[test]
    fn test_label_from_score_is_boundary_inclusive() {
        assert_eq!(Label::from_score(0.5, 0.5), Label::Toxic);
        assert_eq!(Label::from_score(0.4999, 0.5), Label::NonToxic);
        assert_eq!(Label::Toxic.to_binary(), 1);
        assert_eq!(Label::NonToxic.to_binary(), 0);
    }
}
