// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Class-balanced, L2-regularised logistic regression over sparse features
//!
//! Minimises `Σ sᵢ·logloss(xᵢ, yᵢ) + ‖w‖² / (2C)` where `sᵢ = n / (2·n_class)`.
//! The intercept is not penalised. Optimisation is deterministic full-batch
//! Nesterov gradient descent with a fixed `1/L` step.

use crate::datasets::Label;
use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sprs::CsMat;

/// Classifier hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRegParams {
    /// Inverse regularisation strength
    pub c: f64,
    /// Iteration cap
    pub max_iter: usize,
    /// Stop once the gradient max-norm drops below this
    pub tol: f64,
}

impl Default for LogRegParams {
    fn default() -> Self {
        Self {
            c: 4.0,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl LogRegParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            bail!("C must be a positive finite number, got {}", self.c);
        }
        if self.max_iter == 0 {
            bail!("max_iter must be at least 1");
        }
        if !(self.tol >= 0.0) {
            bail!("tol must be non-negative, got {}", self.tol);
        }
        Ok(())
    }
}

/// Outcome of the optimiser
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub iterations: usize,
    pub converged: bool,
    pub final_gradient_norm: f64,
    pub positive_weight: f64,
    pub negative_weight: f64,
}

/// Fitted binary logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogRegParams,
    weights: Vec<f64>,
    intercept: f64,
    summary: FitSummary,
}

impl LogisticRegression {
    /// Fit on a feature matrix and matching labels
    pub fn fit(features: &CsMat<f64>, labels: &[Label], params: LogRegParams) -> Result<Self> {
        params.validate()?;
        let n = features.rows();
        if n != labels.len() {
            bail!("Feature rows ({}) and labels ({}) differ", n, labels.len());
        }
        if !features.is_csr() {
            bail!("Feature matrix must be in CSR layout");
        }

        let n_pos = labels.iter().filter(|l| **l == Label::Toxic).count();
        let n_neg = n - n_pos;
        if n_pos == 0 || n_neg == 0 {
            bail!(
                "Training data must contain both classes (toxic={}, non-toxic={})",
                n_pos,
                n_neg
            );
        }

        // Balanced weights sum to n, so the mean loss divides by n
        let positive_weight = n as f64 / (2.0 * n_pos as f64);
        let negative_weight = n as f64 / (2.0 * n_neg as f64);
        let targets: Vec<f64> = labels.iter().map(|l| l.to_binary() as f64).collect();
        let sample_weights: Vec<f64> = labels
            .iter()
            .map(|l| if *l == Label::Toxic { positive_weight } else { negative_weight })
            .collect();

        let problem = Problem {
            features,
            targets: &targets,
            sample_weights: &sample_weights,
            reg: 1.0 / (params.c * n as f64),
        };

        let step = 1.0 / problem.lipschitz();
        let n_features = features.cols();

        let mut w = vec![0.0; n_features];
        let mut b = 0.0;
        let mut w_prev = w.clone();
        let mut b_prev = b;
        let mut momentum_k = 1usize;

        let progress = ProgressBar::new(params.max_iter as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        {
            progress.set_style(style.progress_chars("#>-"));
        }
        progress.set_message("Training logistic regression");

        let mut iterations = 0;
        let mut converged = false;
        let mut grad_norm = f64::INFINITY;

        for _ in 0..params.max_iter {
            iterations += 1;

            let beta = (momentum_k as f64 - 1.0) / (momentum_k as f64 + 2.0);
            let y_w: Vec<f64> = w
                .iter()
                .zip(&w_prev)
                .map(|(cur, prev)| cur + beta * (cur - prev))
                .collect();
            let y_b = b + beta * (b - b_prev);

            let (grad_w, grad_b) = problem.gradient(&y_w, y_b);
            grad_norm = grad_w
                .iter()
                .fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            progress.inc(1);

            if grad_norm < params.tol {
                w = y_w;
                b = y_b;
                converged = true;
                break;
            }

            let next_w: Vec<f64> = y_w.iter().zip(&grad_w).map(|(y, g)| y - step * g).collect();
            let next_b = y_b - step * grad_b;

            // Restart momentum when the step heads uphill
            let uphill = grad_w
                .iter()
                .zip(next_w.iter().zip(&w))
                .map(|(g, (nw, cw))| g * (nw - cw))
                .sum::<f64>()
                + grad_b * (next_b - b);
            momentum_k = if uphill > 0.0 { 1 } else { momentum_k + 1 };

            w_prev = std::mem::replace(&mut w, next_w);
            b_prev = b;
            b = next_b;
        }
        progress.finish_and_clear();

        if converged {
            tracing::info!(iterations, grad_norm, "Logistic regression converged");
        } else {
            tracing::warn!(
                iterations,
                grad_norm,
                tol = params.tol,
                "Logistic regression hit max_iter before converging"
            );
        }

        Ok(Self {
            params,
            weights: w,
            intercept: b,
            summary: FitSummary {
                iterations,
                converged,
                final_gradient_norm: grad_norm,
                positive_weight,
                negative_weight,
            },
        })
    }

    /// Raw linear scores `w·x + b`
    pub fn decision_function(&self, features: &CsMat<f64>) -> Vec<f64> {
        features
            .outer_iterator()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .filter(|(col, _)| *col < self.weights.len())
                        .map(|(col, v)| self.weights[col] * v)
                        .sum::<f64>()
            })
            .collect()
    }

    /// `[P(non-toxic), P(toxic)]` per row
    pub fn predict_proba(&self, features: &CsMat<f64>) -> Vec<[f64; 2]> {
        self.decision_function(features)
            .into_iter()
            .map(|z| {
                let p = sigmoid(z);
                [1.0 - p, p]
            })
            .collect()
    }

    pub fn params(&self) -> &LogRegParams {
        &self.params
    }

    pub fn summary(&self) -> &FitSummary {
        &self.summary
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

struct Problem<'a> {
    features: &'a CsMat<f64>,
    targets: &'a [f64],
    sample_weights: &'a [f64],
    reg: f64,
}

impl Problem<'_> {
    /// Gradient of the weight-normalised objective at `(w, b)`
    fn gradient(&self, w: &[f64], b: f64) -> (Vec<f64>, f64) {
        let n = self.targets.len() as f64;
        let mut grad_w: Vec<f64> = w.iter().map(|wj| self.reg * wj).collect();
        let mut grad_b = 0.0;

        for (i, row) in self.features.outer_iterator().enumerate() {
            let z = b + row.iter().map(|(col, v)| w[col] * v).sum::<f64>();
            let residual = self.sample_weights[i] * (sigmoid(z) - self.targets[i]) / n;
            grad_b += residual;
            for (col, v) in row.iter() {
                grad_w[col] += residual * v;
            }
        }

        (grad_w, grad_b)
    }

    /// Upper bound on the gradient's Lipschitz constant
    fn lipschitz(&self) -> f64 {
        let n = self.targets.len() as f64;
        let curvature: f64 = self
            .features
            .outer_iterator()
            .zip(self.sample_weights)
            .map(|(row, s)| s * (row.iter().map(|(_, v)| v * v).sum::<f64>() + 1.0))
            .sum();
        0.25 * curvature / n + self.reg
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
