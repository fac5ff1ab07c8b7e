use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Classification failures produced while verifying a single callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing location id")]
    MissingTenant,
    #[error("no secret configured for location '{0}'")]
    UnknownTenant(String),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),
    #[error("token rejected: {0}")]
    TokenRejected(String),
    #[error("{0}")]
    ClaimInvalid(String),
}

impl AuthError {
    pub fn claim_invalid(reason: impl Into<String>) -> Self {
        Self::ClaimInvalid(reason.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AuthError::MissingTenant => FailureKind::MissingTenant,
            AuthError::UnknownTenant(_) => FailureKind::UnknownTenant,
            AuthError::MalformedToken(_) => FailureKind::MalformedToken,
            AuthError::SignatureInvalid(_) => FailureKind::SignatureInvalid,
            AuthError::TokenRejected(_) => FailureKind::TokenRejected,
            AuthError::ClaimInvalid(_) => FailureKind::ClaimInvalid,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingAlgorithm => Self::MalformedToken(value.to_string()),
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::TokenRejected(value.to_string()),
            _ => Self::SignatureInvalid(value.to_string()),
        }
    }
}

/// Machine-readable failure class handed to the handshake driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingTenant,
    UnknownTenant,
    MalformedToken,
    SignatureInvalid,
    TokenRejected,
    ClaimInvalid,
    InvalidCredentials,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MissingTenant => "missing_tenant",
            FailureKind::UnknownTenant => "unknown_tenant",
            FailureKind::MalformedToken => "malformed_token",
            FailureKind::SignatureInvalid => "signature_invalid",
            FailureKind::TokenRejected => "token_rejected",
            FailureKind::ClaimInvalid => "claim_invalid",
            FailureKind::InvalidCredentials => "invalid_credentials",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a verification attempt.
///
/// Carries the `origin` the caller arrived with so the handshake driver can
/// send the user back where they started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {reason}")]
pub struct VerificationFailure {
    pub kind: FailureKind,
    pub reason: String,
    pub origin: Option<String>,
}

impl VerificationFailure {
    pub fn new(error: &AuthError, origin: Option<String>) -> Self {
        Self {
            kind: error.kind(),
            reason: error.to_string(),
            origin,
        }
    }

    pub(crate) fn uniform(origin: Option<String>) -> Self {
        Self {
            kind: FailureKind::InvalidCredentials,
            reason: "invalid credentials".to_string(),
            origin,
        }
    }
}

/// Errors raised while assembling a verifier at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported JWT algorithm '{0}'")]
    UnknownAlgorithm(String),
    #[error("secret for location '{0}' is empty")]
    EmptySecret(String),
    #[error("location id must not be blank")]
    BlankLocation,
    #[error("failed to parse key for location '{0}': {1}")]
    KeyParse(String, String),
    #[error("uid claim name must not be blank")]
    BlankUidClaim,
}
