use crate::{
    handlers::{diagnostics, health_check, ready_check},
    routes::auth_middleware::auth_middleware,
    ws::websocket_handler,
    AppState,
};
use axum::{middleware, routing::get, Router};

/// Create API routes
pub fn create_api_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/designs/:design_id/ws", get(websocket_handler))
        .merge(protected)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::testing::ScriptedStore;
    use crate::store::MemoryContentStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(config: Config) -> AppState {
        AppState::with_store(config, Arc::new(MemoryContentStore::new())).unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Rejections carry plain-text bodies
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = create_api_routes(state(Config::default()));
        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = get_json(app, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_reports_unavailable_store() {
        let store = ScriptedStore::new().unavailable();
        let app = create_api_routes(AppState::with_store(Config::default(), Arc::new(store)).unwrap());

        let (status, body) = get_json(app.clone(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");

        // Liveness does not depend on the store
        let (status, _) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_diagnostics_lists_operations() {
        let app = create_api_routes(state(Config::default()));
        let (status, body) = get_json(app, "/v1/diagnostics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["n_sessions"], 0);
        assert_eq!(body["n_conn"], 0);
        assert_eq!(body["service"], "design-hub");
        assert_eq!(body["environment"], "development");

        let ops: Vec<&str> = body["operations"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for op in ["ping", "undo", "redo", "command", "selection"] {
            assert!(ops.contains(&op), "missing {}", op);
        }
    }

    #[tokio::test]
    async fn test_diagnostics_requires_token_when_secret_set() {
        let config = Config {
            cloud_auth_jwt_secret: Some("s3cret".to_string()),
            ..Config::default()
        };
        let app = create_api_routes(state(config));

        let (status, _) = get_json(app.clone(), "/v1/diagnostics").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/diagnostics")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_websocket_route_rejects_plain_get() {
        let app = create_api_routes(state(Config::default()));
        let (status, _) = get_json(app, "/v1/designs/D1/ws?user=alice").await;
        assert!(status.is_client_error());
    }
}
