use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRef;
use axum::routing::get;
use axum::Router;
use common_jwt_auth::JwtVerifier;
use tracing::info;

use crate::config::ServiceConfig;
use crate::handlers::{
    callback_get, callback_post, failure_page, health, metrics_endpoint, request_phase,
};
use crate::metrics::AuthMetrics;

/// Where the handshake sends the browser around verification.
#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    pub auth_url: Option<String>,
    pub failure_path: String,
}

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<JwtVerifier>,
    pub settings: Arc<HandshakeSettings>,
    pub metrics: Arc<AuthMetrics>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<HandshakeSettings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}

impl FromRef<AppState> for Arc<AuthMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let verifier = JwtVerifier::builder(config.validation.clone())
            .with_secrets(config.location_secrets.clone())
            .build()
            .context("Failed to build JWT verifier")?;
        info!(
            locations = config.location_secrets.len(),
            algorithm = ?config.validation.algorithm,
            "JWT verifier initialised"
        );

        Ok(Self {
            verifier: Arc::new(verifier),
            settings: Arc::new(HandshakeSettings {
                auth_url: config.auth_url.clone(),
                failure_path: config.failure_path.clone(),
            }),
            metrics: Arc::new(AuthMetrics::new()?),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let failure_route = state
        .settings
        .failure_path
        .split('?')
        .next()
        .unwrap_or("/auth/failure")
        .to_string();
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/auth/jwt", get(request_phase))
        .route("/auth/jwt/callback", get(callback_get).post(callback_post))
        .route(&failure_route, get(failure_page))
        .with_state(state)
}
