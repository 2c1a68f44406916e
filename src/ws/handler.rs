use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::connctx::Connection;
use crate::models::ErrorResponse;
use crate::services::auth_service;
use crate::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct ConnectQuery {
    pub user: Option<String>,
    pub token: Option<String>,
}

/// WebSocket upgrade for editing one design.
pub async fn websocket_handler(
    Path(design_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    info!("New WebSocket connection attempt for design {}", design_id);

    let user = match auth_service::resolve_user(&state.config, &headers, query.token.as_deref(), query.user.as_deref()) {
        Ok(user) => user,
        Err(e) => {
            warn!("Rejected WebSocket connection for design {}: {}", design_id, e);
            let status = StatusCode::UNAUTHORIZED;
            return Err((status, Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: e,
            })));
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, design_id, user, state)))
}

/// Drive one connection: a writer task drains the outbox into the socket while
/// this task reads frames and hands them to the engine one at a time.
async fn handle_socket(socket: WebSocket, design_id: String, user: String, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (connection, mut outbox) = Connection::channel();
    let connection_id = connection.id();

    if let Err(e) = state.engine.on_connect(connection, &user, &design_id).await {
        error!("Failed to join connection {} to design {}: {}", connection_id, design_id, e);
        return;
    }
    info!("WebSocket connection {} established for design {} as {}", connection_id, design_id, user);

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbox.recv().await {
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!("Socket write failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let idle_timeout = Duration::from_secs(state.config.idle_timeout_secs);
    loop {
        tokio::select! {
            _ = &mut send_task => {
                debug!("Writer for connection {} finished", connection_id);
                break;
            }
            frame = tokio::time::timeout(idle_timeout, stream.next()) => {
                match frame {
                    Err(_) => {
                        info!("Connection {} idle for {:?}, closing", connection_id, idle_timeout);
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        warn!("WebSocket error on connection {}: {}", connection_id, e);
                        break;
                    }
                    Ok(Some(Ok(Message::Text(text)))) => state.engine.on_message(connection_id, &text).await,
                    Ok(Some(Ok(Message::Close(_)))) => break,
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }

    state.engine.on_disconnect(connection_id).await;
    info!("WebSocket connection {} terminated", connection_id);
}
