use serde_json::Value;

use crate::claims::{is_blank, DecodedClaims};
use crate::config::ValidationConfig;
use crate::error::{AuthError, AuthResult};

/// Enforces required claims, then `iat` freshness when a window is set.
/// Checks short-circuit on the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimValidator;

impl ClaimValidator {
    pub fn validate(
        &self,
        claims: &DecodedClaims,
        config: &ValidationConfig,
        now: i64,
    ) -> AuthResult<()> {
        for name in &config.required_claims {
            check_required(claims, name)?;
        }

        if let Some(window) = config.valid_within {
            check_freshness(claims, window, now)?;
        }

        Ok(())
    }
}

pub(crate) fn check_required(claims: &DecodedClaims, name: &str) -> AuthResult<()> {
    let value = claims
        .get(name)
        .ok_or_else(|| AuthError::claim_invalid(format!("Missing required '{name}' claim.")))?;
    if is_blank(value) {
        return Err(AuthError::claim_invalid(format!("{name} cannot be blank.")));
    }
    Ok(())
}

fn check_freshness(claims: &DecodedClaims, window: u64, now: i64) -> AuthResult<()> {
    let iat = match claims.get("iat") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            return Err(AuthError::claim_invalid("Missing required 'iat' claim."));
        }
        Some(value) => value,
    };

    let expired = if let Some(issued_at) = iat.as_i64() {
        now.abs_diff(issued_at) > window
    } else if let Some(issued_at) = iat.as_f64() {
        (now as f64 - issued_at).abs() > window as f64
    } else {
        return Err(AuthError::claim_invalid("Invalid 'iat' claim."));
    };

    if expired {
        return Err(AuthError::claim_invalid("'iat' timestamp expired."));
    }
    Ok(())
}
