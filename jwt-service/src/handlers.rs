use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use common_jwt_auth::{CallbackRequest, Extra, Profile, VerificationFailure, VerifiedIdentity};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::{AppState, HandshakeSettings};
use crate::metrics::AuthMetrics;

pub const STRATEGY_NAME: &str = "jwt";

/// Body returned to the handshake driver after a successful callback.
#[derive(Debug, Serialize)]
pub struct AuthHash {
    pub provider: &'static str,
    pub uid: Option<String>,
    pub info: Profile,
    pub extra: Extra,
}

impl From<VerifiedIdentity> for AuthHash {
    fn from(identity: VerifiedIdentity) -> Self {
        Self {
            provider: STRATEGY_NAME,
            uid: identity.uid,
            info: identity.info,
            extra: identity.extra,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FailureParams {
    pub message: Option<String>,
    pub strategy: Option<String>,
    pub origin: Option<String>,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn request_phase(State(settings): State<Arc<HandshakeSettings>>) -> Response {
    match settings.auth_url.as_deref() {
        Some(url) => found(url),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn callback_get(
    State(state): State<AppState>,
    Query(request): Query<CallbackRequest>,
) -> Response {
    callback_phase(&state, request)
}

pub async fn callback_post(
    State(state): State<AppState>,
    Form(request): Form<CallbackRequest>,
) -> Response {
    callback_phase(&state, request)
}

fn callback_phase(state: &AppState, request: CallbackRequest) -> Response {
    match state.verifier.verify(request) {
        Ok(identity) => {
            state.metrics.verification("success");
            Json(AuthHash::from(identity)).into_response()
        }
        Err(failure) => {
            state.metrics.verification(failure.kind.as_str());
            found(&failure_location(&state.settings.failure_path, &failure))
        }
    }
}

/// `<failure_path>?message=<kind>&strategy=jwt[&origin=<origin>]`
pub fn failure_location(failure_path: &str, failure: &VerificationFailure) -> String {
    let separator = if failure_path.contains('?') { '&' } else { '?' };
    let mut location = format!(
        "{failure_path}{separator}message={}&strategy={STRATEGY_NAME}",
        urlencoding::encode(failure.kind.as_str())
    );
    if let Some(origin) = &failure.origin {
        location.push_str("&origin=");
        location.push_str(&urlencoding::encode(origin));
    }
    location
}

pub async fn failure_page(Query(params): Query<FailureParams>) -> Response {
    (StatusCode::UNAUTHORIZED, Json(params)).into_response()
}

pub async fn metrics_endpoint(State(metrics): State<Arc<AuthMetrics>>) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(err) => {
            warn!(error = %err, "Redirect location is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
