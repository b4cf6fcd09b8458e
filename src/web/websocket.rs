use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::web::models::push_models::WsMessage;
use crate::web::AppState;

/// Public catalog push channel. No authentication: the feed carries the same
/// data the public catalog pages render.
pub async fn catalog_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(mut socket: WebSocket, app_state: Arc<AppState>) {
    debug!("Catalog websocket connection established.");

    // Initial snapshot, if the mirror is primed. An unprimed client simply
    // waits for the first broadcast.
    if let Some(push) = app_state.mirror.catalog_push().await {
        let message = WsMessage::FullCatalog(push);
        match serde_json::to_string(&message) {
            Ok(json) => {
                if socket.send(Message::Text(Utf8Bytes::from(json))).await.is_err() {
                    debug!("Client went away before the initial snapshot.");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize initial catalog snapshot.");
                return;
            }
        }
    }

    let mut rx = app_state.catalog_broadcaster_tx.subscribe();

    loop {
        tokio::select! {
            update = rx.recv() => {
                match update {
                    Ok(message) => {
                        match serde_json::to_string(&message) {
                            Ok(json) => {
                                if socket.send(Message::Text(Utf8Bytes::from(json))).await.is_err() {
                                    debug!("Error sending catalog update, closing connection.");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize catalog broadcast.");
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // The next broadcast is a full snapshot anyway.
                        debug!(skipped, "Catalog websocket lagged behind the broadcaster.");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Catalog broadcaster closed, ending connection.");
                        break;
                    }
                }
            }
            Some(Ok(msg)) = socket.next() => {
                match msg {
                    Message::Text(t) => {
                        if t == "ping"
                            && socket.send(Message::Text(Utf8Bytes::from("pong"))).await.is_err()
                        {
                            break;
                        }
                    }
                    Message::Ping(p) => {
                        if socket.send(Message::Pong(p)).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => {
                        debug!("Client closed the catalog websocket.");
                        break;
                    }
                    _ => {}
                }
            }
            else => {
                debug!("Catalog websocket client disconnected.");
                break;
            }
        }
    }
    debug!("Catalog websocket connection closed.");
}
