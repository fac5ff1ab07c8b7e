use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Verifies a compact token and hands back its JSON segments.
///
/// Implementations must not return anything until the signature has been
/// checked against `key` with `algorithm`. Segments are returned in the
/// order they are merged; later ones win on collision.
pub trait TokenDecoder: Send + Sync {
    fn decode(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> AuthResult<Vec<Map<String, Value>>>;
}

/// `jsonwebtoken`-backed decoder yielding `[payload, header]`.
///
/// `exp` and `nbf` are enforced when present, with no leeway. Audience and
/// issuer are not checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtDecoder;

impl JwtDecoder {
    pub fn new() -> Self {
        Self
    }

    fn validation(algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation
    }
}

impl TokenDecoder for JwtDecoder {
    fn decode(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> AuthResult<Vec<Map<String, Value>>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MalformedToken("token is empty".to_string()));
        }
        if token.split('.').count() != 3 {
            return Err(AuthError::MalformedToken(
                "expected header, payload and signature segments".to_string(),
            ));
        }

        let data = decode::<Value>(token, key, &Self::validation(algorithm))?;
        let payload = match data.claims {
            Value::Object(claims) => claims,
            _ => {
                return Err(AuthError::MalformedToken(
                    "payload is not a JSON object".to_string(),
                ))
            }
        };
        let header = raw_header(token)?;

        Ok(vec![payload, header])
    }
}

// Read the signed header segment as-is so fields the typed header drops
// (custom parameters) still reach the merged claims.
fn raw_header(token: &str) -> AuthResult<Map<String, Value>> {
    let segment = token
        .split('.')
        .next()
        .ok_or_else(|| AuthError::MalformedToken("missing header segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|err| AuthError::MalformedToken(format!("header is not base64url: {err}")))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(header)) => Ok(header),
        Ok(_) => Err(AuthError::MalformedToken(
            "header is not a JSON object".to_string(),
        )),
        Err(err) => Err(AuthError::MalformedToken(format!(
            "header is not valid JSON: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"s3cr3t";

    fn sign(header: &Header, claims: &Value, secret: &[u8]) -> String {
        encode(header, claims, &EncodingKey::from_secret(secret)).expect("sign token")
    }

    fn decode_hs256(token: &str, secret: &[u8]) -> AuthResult<Vec<Map<String, Value>>> {
        JwtDecoder::new().decode(token, &DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    #[test]
    fn returns_payload_then_header() {
        let token = sign(
            &Header::new(Algorithm::HS256),
            &json!({"name": "Ada", "email": "ada@example.com"}),
            SECRET,
        );
        let segments = decode_hs256(&token, SECRET).expect("decodes");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].get("name"), Some(&json!("Ada")));
        assert_eq!(segments[1].get("alg"), Some(&json!("HS256")));
        assert_eq!(segments[1].get("typ"), Some(&json!("JWT")));
    }

    #[test]
    fn no_registered_claims_are_required() {
        let token = sign(&Header::new(Algorithm::HS256), &json!({"name": "Ada"}), SECRET);
        assert!(decode_hs256(&token, SECRET).is_ok());
    }

    #[test]
    fn wrong_secret_is_signature_invalid() {
        let token = sign(&Header::new(Algorithm::HS256), &json!({"name": "Ada"}), b"other");
        let err = decode_hs256(&token, SECRET).expect_err("bad signature");
        assert!(matches!(err, AuthError::SignatureInvalid(_)), "{err:?}");
    }

    #[test]
    fn algorithm_mismatch_is_signature_invalid() {
        let token = sign(&Header::new(Algorithm::HS512), &json!({"name": "Ada"}), SECRET);
        let err = decode_hs256(&token, SECRET).expect_err("wrong alg");
        assert!(matches!(err, AuthError::SignatureInvalid(_)), "{err:?}");
    }

    #[test]
    fn structural_garbage_is_malformed() {
        for token in ["", "   ", "abc", "a.b", "a.b.c.d", "!!!.???.###"] {
            let err = decode_hs256(token, SECRET).expect_err("malformed");
            assert!(matches!(err, AuthError::MalformedToken(_)), "{token:?} -> {err:?}");
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let exp = Utc::now().timestamp() - 120;
        let token = sign(
            &Header::new(Algorithm::HS256),
            &json!({"name": "Ada", "exp": exp}),
            SECRET,
        );
        let err = decode_hs256(&token, SECRET).expect_err("expired");
        assert!(matches!(err, AuthError::TokenRejected(_)), "{err:?}");
    }

    #[test]
    fn not_yet_valid_token_is_rejected() {
        let nbf = Utc::now().timestamp() + 3600;
        let token = sign(
            &Header::new(Algorithm::HS256),
            &json!({"name": "Ada", "nbf": nbf}),
            SECRET,
        );
        let err = decode_hs256(&token, SECRET).expect_err("immature");
        assert!(matches!(err, AuthError::TokenRejected(_)), "{err:?}");
    }

    #[test]
    fn custom_header_fields_survive() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("loc-key-1".to_string());
        let token = sign(&header, &json!({"name": "Ada"}), SECRET);
        let segments = decode_hs256(&token, SECRET).expect("decodes");
        assert_eq!(segments[1].get("kid"), Some(&json!("loc-key-1")));
    }
}
