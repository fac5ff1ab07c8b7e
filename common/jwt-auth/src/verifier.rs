use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use once_cell::unsync::OnceCell;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::claims::DecodedClaims;
use crate::config::{FailureMode, ValidationConfig};
use crate::decoder::{JwtDecoder, TokenDecoder};
use crate::error::{AuthError, AuthResult, ConfigError, FailureKind, VerificationFailure};
use crate::projector::{IdentityProjector, Profile, VerifiedIdentity};
use crate::secrets::{SecretMaterial, SecretResolver, SecretStore};
use crate::validator::ClaimValidator;

/// Parameters the callback request carried. All of them are untrusted.
#[derive(Clone, Default, Deserialize)]
pub struct CallbackRequest {
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    /// Where to send the user after a failure. Passed through untouched.
    #[serde(default)]
    pub origin: Option<String>,
}

impl CallbackRequest {
    pub fn new(jwt: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            jwt: Some(jwt.into()),
            location_id: Some(location_id.into()),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl fmt::Debug for CallbackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRequest")
            .field("jwt", &self.jwt.as_ref().map(|_| "<redacted>"))
            .field("location_id", &self.location_id)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Progress of a single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Unstarted,
    SecretResolved,
    Decoded,
    Validated,
    Projected,
    Failed(AuthError),
}

/// Resolves the location secret, decodes, validates and projects a callback
/// token. Cheap to share behind an `Arc`; holds no per-request state.
pub struct JwtVerifier {
    config: ValidationConfig,
    resolver: Arc<dyn SecretResolver>,
    decoder: Arc<dyn TokenDecoder>,
    validator: ClaimValidator,
    projector: IdentityProjector,
}

impl JwtVerifier {
    pub fn new(
        config: ValidationConfig,
        resolver: Arc<dyn SecretResolver>,
    ) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self {
            config,
            resolver,
            decoder: Arc::new(JwtDecoder::new()),
            validator: ClaimValidator,
            projector: IdentityProjector,
        })
    }

    pub fn builder(config: ValidationConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn TokenDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Start a fresh attempt. Nothing is shared between attempts.
    pub fn attempt(&self, request: CallbackRequest) -> VerificationAttempt<'_> {
        VerificationAttempt {
            verifier: self,
            request,
            state: AttemptState::Unstarted,
            decoded: OnceCell::new(),
        }
    }

    pub fn verify(
        &self,
        request: CallbackRequest,
    ) -> Result<VerifiedIdentity, VerificationFailure> {
        self.attempt(request).finish()
    }

    fn decode_and_validate(
        &self,
        request: &CallbackRequest,
        state: &mut AttemptState,
    ) -> AuthResult<DecodedClaims> {
        let result = self.run_pipeline(request, state);
        if let Err(err) = &result {
            *state = AttemptState::Failed(err.clone());
        }
        result
    }

    fn run_pipeline(
        &self,
        request: &CallbackRequest,
        state: &mut AttemptState,
    ) -> AuthResult<DecodedClaims> {
        let key = self.resolver.resolve(request.location_id.as_deref())?;
        *state = AttemptState::SecretResolved;

        let token = request
            .jwt
            .as_deref()
            .ok_or_else(|| AuthError::MalformedToken("missing jwt parameter".to_string()))?;
        let segments = self.decoder.decode(token, key, self.config.algorithm)?;
        let claims = DecodedClaims::from_segments(segments);
        *state = AttemptState::Decoded;

        self.validator
            .validate(&claims, &self.config, Utc::now().timestamp())?;
        *state = AttemptState::Validated;
        Ok(claims)
    }

    fn failure(&self, error: &AuthError, origin: Option<String>) -> VerificationFailure {
        let hides_tenant = matches!(
            error.kind(),
            FailureKind::UnknownTenant | FailureKind::MalformedToken | FailureKind::SignatureInvalid
        );
        if self.config.failure_mode == FailureMode::Uniform && hides_tenant {
            VerificationFailure::uniform(origin)
        } else {
            VerificationFailure::new(error, origin)
        }
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct JwtVerifierBuilder {
    config: ValidationConfig,
    secrets: Vec<(String, SecretMaterial)>,
    decoder: Option<Arc<dyn TokenDecoder>>,
}

impl JwtVerifierBuilder {
    fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            secrets: Vec::new(),
            decoder: None,
        }
    }

    pub fn with_secret(
        mut self,
        location_id: impl Into<String>,
        secret: impl Into<SecretMaterial>,
    ) -> Self {
        self.secrets.push((location_id.into(), secret.into()));
        self
    }

    pub fn with_secrets<I, K, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<SecretMaterial>,
    {
        self.secrets.extend(
            secrets
                .into_iter()
                .map(|(location_id, secret)| (location_id.into(), secret.into())),
        );
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn TokenDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<JwtVerifier, ConfigError> {
        let store = SecretStore::from_secrets(self.config.algorithm, self.secrets)?;
        let verifier = JwtVerifier::new(self.config, Arc::new(store))?;
        Ok(match self.decoder {
            Some(decoder) => verifier.with_decoder(decoder),
            None => verifier,
        })
    }
}

/// One pass through the pipeline for one callback.
///
/// The decoded claims are computed at most once; every later call reuses them.
/// Once failed, the attempt keeps returning the same error.
pub struct VerificationAttempt<'v> {
    verifier: &'v JwtVerifier,
    request: CallbackRequest,
    state: AttemptState,
    decoded: OnceCell<DecodedClaims>,
}

impl VerificationAttempt<'_> {
    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn request(&self) -> &CallbackRequest {
        &self.request
    }

    /// Verified and validated claims, also exposed as `extra.raw_info`.
    pub fn decoded(&mut self) -> AuthResult<&DecodedClaims> {
        if let AttemptState::Failed(err) = &self.state {
            return Err(err.clone());
        }
        let verifier = self.verifier;
        let request = &self.request;
        let state = &mut self.state;
        self.decoded
            .get_or_try_init(|| verifier.decode_and_validate(request, state))
    }

    pub fn uid(&mut self) -> AuthResult<Option<String>> {
        let verifier = self.verifier;
        let result = self
            .decoded()
            .and_then(|claims| verifier.projector.uid(claims, &verifier.config));
        self.record(result)
    }

    pub fn info(&mut self) -> AuthResult<Profile> {
        let verifier = self.verifier;
        self.decoded()
            .map(|claims| verifier.projector.info(claims, &verifier.config))
    }

    pub fn project(&mut self) -> AuthResult<VerifiedIdentity> {
        let verifier = self.verifier;
        let result = self
            .decoded()
            .and_then(|claims| verifier.projector.project(claims, &verifier.config));
        let identity = self.record(result)?;
        self.state = AttemptState::Projected;
        Ok(identity)
    }

    /// Finish the attempt. Failures carry the request's `origin`.
    pub fn finish(mut self) -> Result<VerifiedIdentity, VerificationFailure> {
        match self.project() {
            Ok(identity) => {
                debug!(
                    location_id = ?self.request.location_id,
                    uid = ?identity.uid,
                    "verified JWT callback"
                );
                Ok(identity)
            }
            Err(err) => {
                warn!(
                    location_id = ?self.request.location_id,
                    kind = %err.kind(),
                    "JWT callback verification failed"
                );
                Err(self.verifier.failure(&err, self.request.origin.take()))
            }
        }
    }

    fn record<T>(&mut self, result: AuthResult<T>) -> AuthResult<T> {
        if let Err(err) = &result {
            self.state = AttemptState::Failed(err.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
    use serde_json::{json, Map, Value};

    const LOCATION: &str = "loc_42";
    const SECRET: &str = "s3cr3t";

    #[derive(Default)]
    struct CountingDecoder {
        calls: AtomicUsize,
    }

    impl TokenDecoder for CountingDecoder {
        fn decode(
            &self,
            token: &str,
            key: &DecodingKey,
            algorithm: Algorithm,
        ) -> AuthResult<Vec<Map<String, Value>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            JwtDecoder.decode(token, key, algorithm)
        }
    }

    fn token(claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("sign token")
    }

    fn verifier_with(config: ValidationConfig, decoder: Arc<CountingDecoder>) -> JwtVerifier {
        JwtVerifier::builder(config)
            .with_secret(LOCATION, SECRET)
            .with_decoder(decoder)
            .build()
            .expect("verifier")
    }

    fn ada() -> Value {
        json!({"name": "Ada", "email": "ada@example.com", "iat": Utc::now().timestamp()})
    }

    #[test]
    fn decodes_once_per_attempt() {
        let decoder = Arc::new(CountingDecoder::default());
        let verifier = verifier_with(ValidationConfig::default(), decoder.clone());

        let mut attempt = verifier.attempt(CallbackRequest::new(token(ada()), LOCATION));
        assert_eq!(attempt.state(), &AttemptState::Unstarted);
        attempt.decoded().expect("decoded");
        assert_eq!(attempt.state(), &AttemptState::Validated);
        attempt.uid().expect("uid");
        attempt.info().expect("info");
        attempt.decoded().expect("decoded again");
        attempt.project().expect("projected");
        assert_eq!(attempt.state(), &AttemptState::Projected);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

        let mut second = verifier.attempt(CallbackRequest::new(token(ada()), LOCATION));
        second.decoded().expect("decoded");
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_attempt_stays_failed_without_redecoding() {
        let decoder = Arc::new(CountingDecoder::default());
        let verifier = verifier_with(ValidationConfig::default(), decoder.clone());

        let mut attempt = verifier.attempt(CallbackRequest::new(
            token(json!({"name": "Ada"})),
            LOCATION,
        ));
        let first = attempt.decoded().expect_err("missing email");
        assert_eq!(first, AuthError::claim_invalid("Missing required 'email' claim."));
        assert_eq!(attempt.state(), &AttemptState::Failed(first.clone()));

        assert_eq!(attempt.uid().expect_err("still failed"), first);
        assert_eq!(attempt.info().expect_err("still failed"), first);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_tenant_never_reaches_the_decoder() {
        let decoder = Arc::new(CountingDecoder::default());
        let verifier = verifier_with(ValidationConfig::default(), decoder.clone());

        for location in [None, Some(String::new()), Some("  ".to_string())] {
            let request = CallbackRequest {
                jwt: Some(token(ada())),
                location_id: location,
                origin: Some("/back".to_string()),
            };
            let failure = verifier.verify(request).expect_err("missing tenant");
            assert_eq!(failure.kind, FailureKind::MissingTenant);
            assert_eq!(failure.reason, "missing location id");
            assert_eq!(failure.origin.as_deref(), Some("/back"));
        }
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strict_uid_failure_is_recorded_on_the_attempt() {
        let decoder = Arc::new(CountingDecoder::default());
        let config = ValidationConfig::default()
            .with_required_claims(["name"])
            .with_require_uid(true);
        let verifier = verifier_with(config, decoder);

        let mut attempt = verifier.attempt(CallbackRequest::new(
            token(json!({"name": "Ada"})),
            LOCATION,
        ));
        let err = attempt.uid().expect_err("uid required");
        assert_eq!(err.kind(), FailureKind::ClaimInvalid);
        assert!(matches!(attempt.state(), AttemptState::Failed(_)));
    }

    #[test]
    fn missing_jwt_is_malformed() {
        let verifier = verifier_with(
            ValidationConfig::default(),
            Arc::new(CountingDecoder::default()),
        );
        let request = CallbackRequest {
            jwt: None,
            location_id: Some(LOCATION.to_string()),
            origin: None,
        };
        let failure = verifier.verify(request).expect_err("no token");
        assert_eq!(failure.kind, FailureKind::MalformedToken);
    }

    #[test]
    fn request_debug_redacts_token() {
        let request = CallbackRequest::new("header.payload.signature", LOCATION);
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("payload"));
        assert!(rendered.contains(LOCATION));
    }
}
