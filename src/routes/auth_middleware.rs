use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

use crate::services::auth_service::{get_auth_token, user_from_token};
use crate::AppState;

/// Require a valid JWT when a secret is configured.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {

    // Without a secret every caller is let through
    let Some(secret) = state.config.cloud_auth_jwt_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    // 1. Get the auth token from the request
    let token = match get_auth_token(req.headers()) {
        Ok(token) => token,
        Err(e) => {
            error!("Missing auth token: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 2. Validate the token and extract the subject
    let user = match user_from_token(&token, secret) {
        Ok(user) => user,
        Err(e) => {
            error!("{}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    info!("{} {} authenticated for {}", req.method(), req.uri().path(), user);

    Ok(next.run(req).await)
}
