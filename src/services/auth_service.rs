use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use tracing::{debug, info};

use crate::config::Config;

const ANONYMOUS_USER: &str = "anonymous";

// Get the auth token from the request headers
pub fn get_auth_token(headers: &HeaderMap) -> Result<String, String> {
    // 1. Try to get token from Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header.to_str().map_err(|_| "Invalid Authorization header".to_string())?;
        Ok(auth_str
            .strip_prefix("Bearer ")
            .unwrap_or(auth_str)
            .to_string())
    }
    // 2. Try to get token from cookies
    else {
        let cookie_header = headers.get(header::COOKIE)
            .ok_or_else(|| "Missing Authorization header or Cookie".to_string())?
            .to_str()
            .map_err(|_| "Invalid Cookie header".to_string())?;

        for c in cookie::Cookie::split_parse(cookie_header).flatten() {
            if c.name() == "auth_token" {
                return Ok(c.value().to_string());
            }
        }
        Err("auth_token cookie not found".to_string())
    }
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<serde_json::Value>, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<serde_json::Value>(token, &decoding_key, &validation)
}

// Get the subject of a validated JWT token
pub fn user_from_token(token: &str, secret: &str) -> Result<String, String> {
    let token_data = validate_jwt(token, secret).map_err(|e| format!("JWT validation failed: {}", e))?;
    match token_data.claims.get("sub").and_then(|v| v.as_str()) {
        Some(uid) => {
            info!("JWT token validated successfully for user: {}", uid);
            Ok(uid.to_string())
        }
        None => Err("Can't extract a UID from the JWT token".to_string()),
    }
}

/// Identity of a connecting editor.
///
/// With a JWT secret configured the user is the token's subject; the token
/// may come from the headers or, for browsers that cannot set headers on a
/// WebSocket, the `token` query parameter. Without a secret the `user` query
/// parameter is trusted.
pub fn resolve_user(config: &Config, headers: &HeaderMap, token_param: Option<&str>, user_param: Option<&str>) -> Result<String, String> {
    match &config.cloud_auth_jwt_secret {
        Some(secret) => {
            let token = match token_param {
                Some(token) => token.to_string(),
                None => get_auth_token(headers)?,
            };
            user_from_token(&token, secret)
        }
        None => {
            let user = user_param
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(ANONYMOUS_USER);
            debug!("No JWT secret configured, trusting user '{}'", user);
            Ok(user.to_string())
        }
    }
}
