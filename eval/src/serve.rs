// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! HTTP scoring server for the trained toxicity model
//!
//! Usage:
//!   MODEL_PATH=data/06_models/toxicity_model.json toxicity-serve
//!   toxicity-serve --bind-addr 127.0.0.1:8080 --allowed-origin http://localhost:3000

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use toxicity_eval::server::{
    serve, ServeConfig, DEFAULT_ALLOWED_ORIGIN, DEFAULT_BIND_ADDR, DEFAULT_MODEL_PATH,
    DEFAULT_THRESHOLD_PATH,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "toxicity-serve")]
#[command(about = "Serve toxicity scores over HTTP")]
#[command(version)]
struct Args {
    /// Trained model artifact (required to exist)
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Threshold artifact (falls back to 0.5 if unusable)
    #[arg(long, env = "THRESH_PATH", default_value = DEFAULT_THRESHOLD_PATH)]
    threshold_path: PathBuf,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind_addr: SocketAddr,

    /// Single origin allowed by CORS
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = DEFAULT_ALLOWED_ORIGIN)]
    allowed_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Model: {}", args.model_path.display());
    tracing::info!("Threshold: {}", args.threshold_path.display());

    serve(ServeConfig {
        model_path: args.model_path,
        threshold_path: args.threshold_path,
        bind_addr: args.bind_addr,
        allowed_origin: args.allowed_origin,
    })
    .await
}
