//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Emitter, ParticipantId, PlayerAction};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let participant_id: ParticipantId = Uuid::new_v4();
    info!(participant_id = %participant_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Register before anything can be addressed to this participant
    let outbound_rx = state.hub.register(participant_id);
    state.hub.emit(
        participant_id,
        ServerMsg::Welcome {
            participant_id,
            server_time: unix_millis(),
        },
    );

    run_session(participant_id, &state, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    state.hub.unregister(&participant_id);
    state
        .matchmaking
        .submit(participant_id, PlayerAction::Disconnect)
        .await;

    info!(participant_id = %participant_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    participant_id: ParticipantId,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    // Spawn writer task: outbound messages -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(participant_id = %participant_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> matchmaking
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(participant_id = %participant_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => {
                        state.hub.emit(participant_id, ServerMsg::Pong { t });
                    }
                    Ok(client_msg) => {
                        let Some(action) = client_msg.into_action() else {
                            continue;
                        };
                        if !state.matchmaking.submit(participant_id, action).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(participant_id = %participant_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(participant_id = %participant_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(participant_id = %participant_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(participant_id = %participant_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(participant_id = %participant_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(participant_id = %participant_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
