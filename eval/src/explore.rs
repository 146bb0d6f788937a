// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset exploration runner
//!
//! Loads the dataset and prints its summary without training anything

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use toxicity_eval::datasets::Dataset;
use toxicity_eval::exploration::{add_length_features, save_length_features, ExplorationReport};
use toxicity_eval::pipeline::LENGTH_FEATURES_FILE;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "explore-dataset")]
#[command(about = "Summarise the toxicity dataset")]
#[command(version)]
struct Args {
    /// Directory containing train.csv; omit to use a synthetic dataset
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Cap on raw rows read
    #[arg(long)]
    max_rows: Option<usize>,

    /// Number of samples for the synthetic dataset
    #[arg(short, long, default_value_t = 1000)]
    num_samples: usize,

    /// Random seed for the synthetic dataset
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Write JSON and CSV outputs into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let dataset = match args.data_dir {
        Some(ref dir) => Dataset::load_jigsaw(dir, args.max_rows)?,
        None => {
            tracing::warn!("No data directory provided, using synthetic dataset");
            Dataset::load_synthetic(args.num_samples, args.seed)
        }
    };

    let report = ExplorationReport::from_samples(&dataset.samples);

    println!("\n{}", dataset.config.name);
    println!("Rows read: {}", dataset.rows_read);
    println!("\n{}", report.summary.format());
    println!("Label distribution:");
    for entry in &report.label_distribution {
        println!("  {}: {} ({:.2}%)", entry.label, entry.count, entry.fraction * 100.0);
    }

    if let Some(ref output) = args.output {
        report.save(output)?;
        let lengths_path = output.join(LENGTH_FEATURES_FILE);
        save_length_features(&add_length_features(&dataset.samples), &lengths_path)?;
        println!("\nOutputs saved to: {}", output.display());
    }

    Ok(())
}
