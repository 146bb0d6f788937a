// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! HTTP scoring service
//!
//! The model and threshold are loaded once at startup into [`AppState`] and
//! shared read-only by every request.

use crate::model::{ToxicityModel, ToxicityScorer};
use crate::threshold::{load_threshold_or_default, DEFAULT_THRESHOLD};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const DEFAULT_MODEL_PATH: &str = "data/06_models/toxicity_model.json";
pub const DEFAULT_THRESHOLD_PATH: &str = "data/06_models/toxicity_threshold.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://simoneassirelli.github.io";

pub const USAGE_MESSAGE: &str = "Toxic or Not API. Use /health or POST /predict";

/// Server settings
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub threshold_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// The single origin allowed by CORS
    pub allowed_origin: String,
}

/// Read-only state injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn ToxicityScorer>,
    pub threshold: f64,
}

impl AppState {
    pub fn new(model: Arc<dyn ToxicityScorer>, threshold: f64) -> Self {
        Self { model, threshold }
    }

    /// Load the model (required) and threshold (optional, defaults to 0.5)
    pub fn load(config: &ServeConfig) -> Result<Self> {
        let model = ToxicityModel::load(&config.model_path)
            .context("Run the training pipeline before starting the server")?;
        let threshold = load_threshold_or_default(&config.threshold_path, DEFAULT_THRESHOLD);
        Ok(Self::new(Arc::new(model), threshold))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub toxicity_score: f64,
    pub is_toxic: bool,
    pub threshold: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        threshold: state.threshold,
    })
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Json<PredictResponse> {
    let toxicity_score = state.model.score(&request.text);
    let is_toxic = toxicity_score >= state.threshold;
    tracing::debug!(toxicity_score, is_toxic, "Scored request");

    Json(PredictResponse {
        toxicity_score,
        is_toxic,
        threshold: state.threshold,
    })
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: USAGE_MESSAGE.to_string(),
    })
}

/// CORS for a single origin: any method or header, no credentials
///
/// Requests from any other origin get no `access-control-allow-origin` header.
pub fn cors_layer(allowed_origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list([allowed_origin]))
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
}

pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(cors_layer(allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load artifacts, bind, and serve until the process is stopped
pub async fn serve(config: ServeConfig) -> Result<()> {
    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .with_context(|| format!("Invalid allowed origin: {}", config.allowed_origin))?;

    let state = AppState::load(&config)?;
    tracing::info!(
        "Serving with threshold {} (CORS origin {})",
        state.threshold,
        config.allowed_origin
    );

    let app = router(state, origin);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
