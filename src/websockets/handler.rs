use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    response::Response,
};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::messages::PROTOCOL;
use super::socket::SocketSession;
use crate::shared::AppState;

/// WebSocket endpoint speaking the subscription protocol
/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(app_state): State<AppState>,
) -> Response {
    info!(peer = %peer, "WebSocket connection requested");

    ws.protocols([PROTOCOL])
        .on_upgrade(move |socket| handle_websocket_connection(socket, peer.to_string(), app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    endpoint: String,
    app_state: AppState,
) {
    let connection_id = Uuid::new_v4().to_string();

    // Create the outbound channel (app -> client)
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    app_state
        .transport
        .attach(connection_id.clone(), outbound_sender)
        .await;

    if let Err(e) = app_state.server.on_connect(&connection_id, &endpoint).await {
        warn!(connection_id = %connection_id, error = %e, "Failed to register connection");
        app_state.transport.detach(&connection_id).await;
        return;
    }

    info!(
        connection_id = %connection_id,
        endpoint = %endpoint,
        "WebSocket connection established"
    );

    let session = SocketSession::new(
        connection_id.clone(),
        Box::new(socket),
        outbound_receiver,
        app_state.server.clone(),
    );

    // Run the session until disconnect
    match session.run().await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(connection_id = %connection_id, error = ?e, "WebSocket connection error");
        }
    }

    // Cleanup: the transport forgets the socket, the server forgets its subscriptions
    app_state.transport.detach(&connection_id).await;
    if let Err(e) = app_state.server.on_disconnect(&connection_id).await {
        warn!(connection_id = %connection_id, error = %e, "Disconnect cleanup failed");
    }
}
