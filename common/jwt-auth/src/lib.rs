//! Per-location JWT callback verification.
//!
//! A callback carries a compact token and a `location_id`. The location picks
//! the secret, the token is verified and decoded, required claims and `iat`
//! freshness are enforced, and the claims are projected into a uid and a
//! profile. Any failure ends the attempt with a [`VerificationFailure`] that
//! keeps the caller's `origin`.

pub mod claims;
pub mod config;
pub mod decoder;
pub mod error;
pub mod projector;
pub mod secrets;
pub mod validator;
pub mod verifier;

pub use claims::{is_blank, DecodedClaims};
pub use config::{parse_algorithm, FailureMode, InfoMap, ValidationConfig};
pub use decoder::{JwtDecoder, TokenDecoder};
pub use error::{AuthError, AuthResult, ConfigError, FailureKind, VerificationFailure};
pub use jsonwebtoken::Algorithm;
pub use projector::{Extra, IdentityProjector, Profile, VerifiedIdentity};
pub use secrets::{SecretMaterial, SecretResolver, SecretStore};
pub use validator::ClaimValidator;
pub use verifier::{
    AttemptState, CallbackRequest, JwtVerifier, JwtVerifierBuilder, VerificationAttempt,
};
