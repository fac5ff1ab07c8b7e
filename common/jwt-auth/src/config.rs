use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::ConfigError;

/// How failures that could reveal which location ids exist are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Every failure keeps its own kind.
    #[default]
    Distinct,
    /// Unknown location, malformed token and bad signature all surface as
    /// `invalid_credentials`.
    Uniform,
}

/// Ordered mapping from profile field to the claim it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoMap(Vec<(String, String)>);

impl InfoMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self(Vec::new());
        for (field, claim) in entries {
            map.insert(field, claim);
        }
        map
    }

    /// Sets `field` to read from `claim`. A field that is already mapped keeps
    /// its position and takes the new claim.
    pub fn insert(&mut self, field: impl Into<String>, claim: impl Into<String>) {
        let field = field.into();
        let claim = claim.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = claim,
            None => self.0.push((field, claim)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, claim)| (field.as_str(), claim.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for InfoMap {
    fn default() -> Self {
        Self::new([("name", "name"), ("email", "email")])
    }
}

/// Process-wide verification policy. Built once at startup and shared
/// read-only between requests.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Signature algorithm every location signs with. Defaults to HS256.
    pub algorithm: Algorithm,
    /// Claim used as the caller's unique identifier. Defaults to `email`.
    pub uid_claim: String,
    /// Claims that must be present and non-blank, checked in this order.
    pub required_claims: Vec<String>,
    pub info_map: InfoMap,
    /// Symmetric tolerance in seconds between `iat` and now. `None` disables
    /// the freshness check entirely.
    pub valid_within: Option<u64>,
    /// Fail when the uid claim is absent or blank instead of yielding no uid.
    pub require_uid: bool,
    pub failure_mode: FailureMode,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            uid_claim: "email".to_string(),
            required_claims: vec!["name".to_string(), "email".to_string()],
            info_map: InfoMap::default(),
            valid_within: None,
            require_uid: false,
            failure_mode: FailureMode::Distinct,
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Parse an algorithm name such as `HS256` or `RS512`.
    pub fn with_algorithm_name(self, name: &str) -> Result<Self, ConfigError> {
        let algorithm = parse_algorithm(name)?;
        Ok(self.with_algorithm(algorithm))
    }

    pub fn with_uid_claim(mut self, claim: impl Into<String>) -> Self {
        self.uid_claim = claim.into();
        self
    }

    pub fn with_required_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_info_map(mut self, info_map: InfoMap) -> Self {
        self.info_map = info_map;
        self
    }

    pub fn with_valid_within(mut self, seconds: u64) -> Self {
        self.valid_within = Some(seconds);
        self
    }

    pub fn with_require_uid(mut self, require: bool) -> Self {
        self.require_uid = require;
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    pub(crate) fn check(&self) -> Result<(), ConfigError> {
        if self.uid_claim.trim().is_empty() {
            return Err(ConfigError::BlankUidClaim);
        }
        Ok(())
    }
}

pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    Algorithm::from_str(name.trim()).map_err(|_| ConfigError::UnknownAlgorithm(name.to_string()))
}
