//! WebSocket connection handler
//!
//! One UI client per socket. Each connection owns a private event channel
//! that sessions launched through it report into; lifecycle events are
//! forwarded to the client as they arrive, interleaved with direct replies
//! to control requests.

use axum::{
    extract::{
        State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use mbg_core::credstore::{self, SessionMeta, now_millis};
use mbg_core::{UiEvent, UiSender};

use crate::Result;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::WsState;

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(connection = %conn_id, "ui client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Channel for outgoing JSON frames
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    // Channel the sessions launched by this client report into
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    // Task to send frames to the client
    let send_task = async move {
        while let Some(raw) = out_rx.recv().await {
            if ws_tx.send(WsMessage::Text(raw.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to forward session lifecycle events
    let forward_out = out_tx.clone();
    let forward_task = async move {
        while let Some(event) = ui_rx.recv().await {
            let msg = ServerMessage::from(event);
            match serde_json::to_string(&msg) {
                Ok(raw) => {
                    if forward_out.send(raw).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "failed to encode lifecycle event"),
            }
        }
    };

    // Task to receive control requests from the client
    let recv_out = out_tx.clone();
    let recv_state = state.clone();
    let recv_conn = conn_id.clone();
    let recv_task = async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    match handle_client_message(&recv_state, &ui_tx, &text).await {
                        Ok(replies) => {
                            for reply in replies {
                                match serde_json::to_string(&reply) {
                                    Ok(raw) => {
                                        let _ = recv_out.send(raw);
                                    }
                                    Err(e) => warn!(error = %e, "failed to encode reply"),
                                }
                            }
                        }
                        Err(e) => {
                            error!(connection = %recv_conn, error = %e, "request failed");
                            let reply = ServerMessage::Error {
                                message: "request failed".to_string(),
                                detail: e.to_string(),
                            };
                            if let Ok(raw) = serde_json::to_string(&reply) {
                                let _ = recv_out.send(raw);
                            }
                        }
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    debug!(connection = %recv_conn, "client closed connection");
                    break;
                }
                Err(e) => {
                    warn!(connection = %recv_conn, error = %e, "websocket error");
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = send_task => {},
        _ = forward_task => {},
        _ = recv_task => {},
    }

    info!(connection = %conn_id, "ui client disconnected");
}

/// Handle one control request, returning the direct replies
pub(crate) async fn handle_client_message(
    state: &WsState,
    ui: &UiSender,
    text: &str,
) -> Result<Vec<ServerMessage>> {
    let msg: ClientMessage = serde_json::from_str(text)?;
    debug!(request = ?msg, "control request");

    match msg {
        ClientMessage::CreateSession {
            profile,
            name,
            phone,
        } => {
            let base = state.launcher.registry().base_dir();
            let folder = credstore::next_auth_folder(base)?;
            let session_id = uuid::Uuid::new_v4().to_string();

            let meta = SessionMeta {
                session_id: Some(session_id.clone()),
                folder_name: Some(folder.clone()),
                profile,
                name,
                phone,
                created_at: Some(now_millis()),
                ..Default::default()
            };
            meta.save(&base.join(&folder))?;

            state.launcher.launch(&session_id, &folder, ui.clone()).await?;
            info!(session = %session_id, folder = %folder, "session created");

            Ok(vec![
                ServerMessage::SessionCreated { session_id, folder },
                sessions_list(state).await?,
            ])
        }

        ClientMessage::ListSessions => Ok(vec![sessions_list(state).await?]),

        ClientMessage::DestroySession { folder } => {
            state.launcher.registry().destroy_by_folder(&folder).await?;
            Ok(vec![
                ServerMessage::SessionDestroyed { folder },
                sessions_list(state).await?,
            ])
        }
    }
}

async fn sessions_list(state: &WsState) -> Result<ServerMessage> {
    Ok(ServerMessage::SessionsList {
        sessions: state.launcher.registry().list().await?,
    })
}
