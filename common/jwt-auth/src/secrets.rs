use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey};

use crate::error::{AuthError, AuthResult, ConfigError};

/// Raw signing secret for one location: an HMAC secret, or a PEM public key
/// for the asymmetric algorithms.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretMaterial {
    Text(String),
    Bytes(Vec<u8>),
}

impl SecretMaterial {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SecretMaterial::Text(text) => text.as_bytes(),
            SecretMaterial::Bytes(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretMaterial(<redacted>)")
    }
}

impl From<&str> for SecretMaterial {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SecretMaterial {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SecretMaterial {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for SecretMaterial {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Maps a location id to the key its tokens are verified with.
///
/// The location id comes straight from the request and is not authenticated
/// before it selects a key.
pub trait SecretResolver: Send + Sync {
    fn lookup(&self, location_id: &str) -> Option<&DecodingKey>;

    fn resolve(&self, location_id: Option<&str>) -> AuthResult<&DecodingKey> {
        let location_id = location_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(AuthError::MissingTenant)?;
        self.lookup(location_id)
            .ok_or_else(|| AuthError::UnknownTenant(location_id.to_string()))
    }
}

/// Immutable location → key map, shared across requests without locking.
#[derive(Clone, Default)]
pub struct SecretStore {
    keys: Arc<HashMap<String, DecodingKey>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build decoding keys for every location up front so a bad secret fails
    /// at startup instead of on the first request.
    pub fn from_secrets<I, K, S>(algorithm: Algorithm, secrets: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<SecretMaterial>,
    {
        let mut keys = HashMap::new();
        for (location_id, material) in secrets {
            let location_id = location_id.into();
            if location_id.trim().is_empty() {
                return Err(ConfigError::BlankLocation);
            }
            let key = decoding_key(algorithm, &location_id, &material.into())?;
            keys.insert(location_id, key);
        }
        Ok(Self {
            keys: Arc::new(keys),
        })
    }

    pub fn contains(&self, location_id: &str) -> bool {
        self.keys.contains_key(location_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn locations(&self) -> Vec<&str> {
        let mut locations = self.keys.keys().map(String::as_str).collect::<Vec<_>>();
        locations.sort_unstable();
        locations
    }
}

impl SecretResolver for SecretStore {
    fn lookup(&self, location_id: &str) -> Option<&DecodingKey> {
        self.keys.get(location_id)
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("locations", &self.locations())
            .finish()
    }
}

fn decoding_key(
    algorithm: Algorithm,
    location_id: &str,
    material: &SecretMaterial,
) -> Result<DecodingKey, ConfigError> {
    if material.is_empty() {
        return Err(ConfigError::EmptySecret(location_id.to_string()));
    }
    let bytes = material.as_bytes();
    let parsed = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Ok(DecodingKey::from_secret(bytes));
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        _ => DecodingKey::from_ed_pem(bytes),
    };
    parsed.map_err(|err| ConfigError::KeyParse(location_id.to_string(), err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SecretStore {
        SecretStore::from_secrets(
            Algorithm::HS256,
            [("loc_42", "s3cr3t"), ("loc_7", "another")],
        )
        .expect("store")
    }

    #[test]
    fn resolves_known_location() {
        let store = store();
        assert!(store.resolve(Some("loc_42")).is_ok());
        assert_eq!(store.locations(), vec!["loc_42", "loc_7"]);
    }

    #[test]
    fn missing_or_blank_location_is_missing_tenant() {
        let store = store();
        assert!(matches!(store.resolve(None), Err(AuthError::MissingTenant)));
        assert!(matches!(store.resolve(Some("")), Err(AuthError::MissingTenant)));
        assert!(matches!(store.resolve(Some("   ")), Err(AuthError::MissingTenant)));
    }

    #[test]
    fn unregistered_location_is_unknown_tenant() {
        let store = store();
        match store.resolve(Some("loc_99")) {
            Err(err) => assert_eq!(err, AuthError::UnknownTenant("loc_99".to_string())),
            Ok(_) => panic!("loc_99 should not resolve"),
        }
    }

    #[test]
    fn empty_secret_fails_at_startup() {
        let err = SecretStore::from_secrets(Algorithm::HS256, [("loc_1", "")])
            .expect_err("empty secret");
        assert!(matches!(err, ConfigError::EmptySecret(loc) if loc == "loc_1"));
    }

    #[test]
    fn garbage_pem_fails_at_startup() {
        let err = SecretStore::from_secrets(Algorithm::RS256, [("loc_1", "not a pem")])
            .expect_err("bad pem");
        assert!(matches!(err, ConfigError::KeyParse(loc, _) if loc == "loc_1"));
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let rendered = format!("{:?}", store());
        assert!(rendered.contains("loc_42"));
        assert!(!rendered.contains("s3cr3t"));
        assert_eq!(
            format!("{:?}", SecretMaterial::from("s3cr3t")),
            "SecretMaterial(<redacted>)"
        );
    }
}
