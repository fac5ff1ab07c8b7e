use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    verification_attempts: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let verification_attempts = IntCounterVec::new(
            Opts::new(
                "jwt_verification_attempts_total",
                "Count of JWT callback verifications grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(verification_attempts.clone()))?;

        Ok(Self {
            registry,
            verification_attempts,
        })
    }

    pub fn verification(&self, outcome: &str) {
        self.verification_attempts
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
