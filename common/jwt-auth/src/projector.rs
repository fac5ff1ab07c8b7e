use serde::Serialize;
use serde_json::{Map, Value};

use crate::claims::DecodedClaims;
use crate::config::ValidationConfig;
use crate::error::AuthResult;
use crate::validator::check_required;

/// Profile fields in info-map order. Fields whose source claim is missing
/// are present with a `null` value.
pub type Profile = Map<String, Value>;

/// Auxiliary output: the full merged claims, untouched by projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extra {
    pub raw_info: DecodedClaims,
}

/// Successful outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedIdentity {
    /// `None` when the uid claim is absent and `require_uid` is off.
    pub uid: Option<String>,
    pub info: Profile,
    pub extra: Extra,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjector;

impl IdentityProjector {
    pub fn uid(&self, claims: &DecodedClaims, config: &ValidationConfig) -> AuthResult<Option<String>> {
        if config.require_uid {
            check_required(claims, &config.uid_claim)?;
        }
        Ok(claims.get(&config.uid_claim).and_then(identity_string))
    }

    pub fn info(&self, claims: &DecodedClaims, config: &ValidationConfig) -> Profile {
        config
            .info_map
            .iter()
            .map(|(field, claim)| {
                let value = claims.get(claim).cloned().unwrap_or(Value::Null);
                (field.to_string(), value)
            })
            .collect()
    }

    pub fn project(
        &self,
        claims: &DecodedClaims,
        config: &ValidationConfig,
    ) -> AuthResult<VerifiedIdentity> {
        Ok(VerifiedIdentity {
            uid: self.uid(claims, config)?,
            info: self.info(claims, config),
            extra: Extra {
                raw_info: claims.clone(),
            },
        })
    }
}

fn identity_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
