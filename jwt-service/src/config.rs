use anyhow::{anyhow, Context, Result};
use common_jwt_auth::{FailureMode, InfoMap, ValidationConfig};
use std::collections::BTreeMap;
use std::env;
use std::fmt;

const RESERVED_ROUTES: [&str; 4] = ["/healthz", "/metrics", "/auth/jwt", "/auth/jwt/callback"];

#[derive(Clone)]
pub struct ServiceConfig {
    pub validation: ValidationConfig,
    pub location_secrets: BTreeMap<String, String>,
    pub auth_url: Option<String>,
    pub failure_path: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("validation", &self.validation)
            .field("locations", &self.location_secrets.keys().collect::<Vec<_>>())
            .field("auth_url", &self.auth_url)
            .field("failure_path", &self.failure_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    config_from(|key| env::var(key).ok())
}

/// Build the service configuration from a variable lookup.
pub fn config_from<F>(lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let secrets_json = lookup("JWT_LOCATION_SECRETS")
        .ok_or_else(|| anyhow!("JWT_LOCATION_SECRETS must be set"))?;
    let location_secrets: BTreeMap<String, String> = serde_json::from_str(&secrets_json)
        .context("JWT_LOCATION_SECRETS must be a JSON object of location id to secret")?;

    let mut validation = ValidationConfig::default();

    if let Some(name) = lookup("JWT_ALGORITHM").and_then(|value| normalize_optional(&value)) {
        validation = validation
            .with_algorithm_name(&name)
            .context("Failed to parse JWT_ALGORITHM")?;
    }

    if let Some(claim) = lookup("JWT_UID_CLAIM").and_then(|value| normalize_optional(&value)) {
        validation = validation.with_uid_claim(claim);
    }

    if let Some(value) = lookup("JWT_REQUIRED_CLAIMS") {
        validation = validation.with_required_claims(parse_list(&value));
    }

    if let Some(value) = lookup("JWT_INFO_MAP") {
        let info_map = parse_info_map(&value).context("Failed to parse JWT_INFO_MAP")?;
        validation = validation.with_info_map(info_map);
    }

    if let Some(value) = lookup("JWT_VALID_WITHIN").and_then(|value| normalize_optional(&value)) {
        let seconds = value
            .parse::<u64>()
            .with_context(|| format!("JWT_VALID_WITHIN must be whole seconds, got '{value}'"))?;
        validation = validation.with_valid_within(seconds);
    }

    if bool_from(&lookup, "JWT_REQUIRE_UID").unwrap_or(false) {
        validation = validation.with_require_uid(true);
    }

    if bool_from(&lookup, "JWT_UNIFORM_FAILURES").unwrap_or(false) {
        validation = validation.with_failure_mode(FailureMode::Uniform);
    }

    let auth_url = lookup("JWT_AUTH_URL").and_then(|value| normalize_optional(&value));
    let failure_path = lookup("AUTH_FAILURE_PATH")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "/auth/failure".to_string());
    if !failure_path.starts_with('/') {
        return Err(anyhow!(
            "AUTH_FAILURE_PATH must be a path starting with '/', got '{failure_path}'"
        ));
    }
    let failure_route = failure_path.split('?').next().unwrap_or_default();
    if RESERVED_ROUTES.contains(&failure_route) {
        return Err(anyhow!(
            "AUTH_FAILURE_PATH '{failure_path}' collides with a built-in route"
        ));
    }

    let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = match lookup("PORT") {
        Some(value) => value
            .trim()
            .parse::<u16>()
            .with_context(|| format!("PORT must be a valid port, got '{value}'"))?,
        None => 8090,
    };

    Ok(ServiceConfig {
        validation,
        location_secrets,
        auth_url,
        failure_path,
        host,
        port,
    })
}

fn bool_from<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn parse_info_map(value: &str) -> Result<InfoMap> {
    let mut info_map = InfoMap::new(Vec::<(String, String)>::new());
    for item in value.split(',') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (field, claim) = trimmed
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid info map entry '{trimmed}', expected field=claim"))?;
        let field = field.trim();
        let claim = claim.trim();
        if field.is_empty() || claim.is_empty() {
            return Err(anyhow!(
                "Invalid info map entry '{trimmed}', expected field=claim"
            ));
        }
        info_map.insert(field, claim);
    }
    Ok(info_map)
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
