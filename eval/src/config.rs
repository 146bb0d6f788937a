// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Pipeline parameters loaded from YAML
//!
//! Every field has a default, so a parameter file only needs the values it
//! overrides.

use crate::classifier::LogRegParams;
use crate::split::SplitConfig;
use crate::vectorizer::TfidfParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid {section} parameters: {message}")]
    Invalid { section: &'static str, message: String },
}

/// All parameters for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the raw `train.csv`
    pub data_dir: PathBuf,
    /// Cap on raw rows read (`None` = all)
    pub max_rows: Option<usize>,
    /// Root directory for models and reports
    pub output_dir: PathBuf,
    pub split: SplitConfig,
    pub tfidf: TfidfParams,
    pub logreg: LogRegParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/01_raw"),
            max_rows: None,
            output_dir: PathBuf::from("data"),
            split: SplitConfig::default(),
            tfidf: TfidfParams::default(),
            logreg: LogRegParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file; missing fields take their defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values before any stage runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.split.validate().map_err(|e| ConfigError::Invalid {
            section: "split",
            message: e.to_string(),
        })?;
        self.tfidf.validate().map_err(|e| ConfigError::Invalid {
            section: "tfidf",
            message: e.to_string(),
        })?;
        self.logreg.validate().map_err(|e| ConfigError::Invalid {
            section: "logreg",
            message: e.to_string(),
        })?;
        if self.max_rows == Some(0) {
            return Err(ConfigError::Invalid {
                section: "data",
                message: "max_rows must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.output_dir.join("06_models")
    }

    pub fn reporting_dir(&self) -> PathBuf {
        self.output_dir.join("08_reporting")
    }
}
