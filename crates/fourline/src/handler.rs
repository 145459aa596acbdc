//! Per-connection handler: WebSocket upgrade, identity, and command routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade the TCP stream to a WebSocket
//!   2. Assign a PlayerId, send Welcome and the current lobby snapshot
//!   3. Loop: receive commands → dispatch to the registry
//!   4. On disconnect, abandon whichever room the player was in

use std::sync::atomic::Ordering;
use std::sync::Arc;

use fourline_protocol::{ClientCommand, Codec, PlayerId, ServerEvent};
use fourline_room::{EventSender, LeaveReason, RoomError, COLS};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

use crate::server::ServerState;
use crate::FourlineError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), FourlineError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut ws_rx) = ws.split();

    let player_id =
        PlayerId(state.next_player_id.fetch_add(1, Ordering::Relaxed));
    tracing::info!(%player_id, "player connected");

    // All outgoing traffic for this connection funnels through one
    // channel: room broadcasts, command replies, and lobby pushes all
    // land here, so the writer below is the only task touching the sink.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let codec = state.codec;
    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Ok(bytes) = codec.encode(&event) else {
                continue;
            };
            let Ok(text) = String::from_utf8(bytes) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Forward lobby updates into the connection's event stream.
    let mut lobby_rx = state.lobby.subscribe();
    let lobby_events = event_tx.clone();
    let lobby_task = tokio::spawn(async move {
        loop {
            match lobby_rx.recv().await {
                Ok(rooms) => {
                    if lobby_events
                        .send(ServerEvent::ActiveRooms { rooms })
                        .is_err()
                    {
                        break;
                    }
                }
                // Lagged subscribers catch up on the next publish.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _ = event_tx.send(ServerEvent::Welcome { player_id });
    {
        let registry = state.registry.lock().await;
        let _ = event_tx.send(ServerEvent::ActiveRooms {
            rooms: registry.list_active(),
        });
    }

    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };
        let data: Vec<u8> = match msg {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(bytes) => bytes.to_vec(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                continue;
            }
        };

        let command: ClientCommand = match state.codec.decode(&data) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(
                    %player_id, error = %e, "failed to decode command"
                );
                let _ = event_tx.send(ServerEvent::Rejected {
                    message: format!("invalid command: {e}"),
                });
                continue;
            }
        };

        dispatch(&state, player_id, &event_tx, command).await;
    }

    // Disconnect cleanup: abandon whichever room the player was in so
    // the other participant hears about it.
    let room = state.registry.lock().await.find_by_participant(player_id);
    if let Some(code) = room {
        let mut registry = state.registry.lock().await;
        if let Err(e) = registry
            .leave_room(&code, player_id, LeaveReason::Disconnected)
            .await
        {
            tracing::debug!(%player_id, error = %e, "disconnect cleanup failed");
        }
    }
    tracing::info!(%player_id, "player disconnected");

    lobby_task.abort();
    drop(event_tx);
    let _ = writer.await;
    Ok(())
}

/// Routes one decoded command. Failures are per-command: the origin gets
/// a rejection event and the connection stays up.
async fn dispatch(
    state: &Arc<ServerState>,
    player_id: PlayerId,
    events: &EventSender,
    command: ClientCommand,
) {
    let outcome = match command {
        ClientCommand::CreateRoom => {
            let mut registry = state.registry.lock().await;
            match registry.create_room(player_id, events.clone()) {
                Ok(room) => {
                    let _ = events.send(ServerEvent::RoomCreated { room });
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }

        ClientCommand::JoinRoom { room } => {
            let result = {
                let mut registry = state.registry.lock().await;
                registry.join_room(&room, player_id, events.clone()).await
            };
            match result {
                Ok(()) => {
                    let _ = events.send(ServerEvent::RoomJoined { room });
                }
                Err(e) => {
                    tracing::debug!(%player_id, error = %e, "join refused");
                    let _ = events.send(ServerEvent::JoinError {
                        message: e.to_string(),
                    });
                }
            }
            return;
        }

        ClientCommand::SetPlayerName { name, room } => {
            state
                .registry
                .lock()
                .await
                .set_name(&room, player_id, name)
                .await
        }

        ClientCommand::MakeMove {
            room,
            column,
            player_id: mover,
        } => {
            // Range-check here so the board only ever sees valid input.
            // The mover id is taken from the wire; the room rejects ids
            // outside its roster.
            if column >= COLS {
                Err(RoomError::InvalidColumn(column))
            } else {
                state
                    .registry
                    .lock()
                    .await
                    .make_move(&room, mover, column)
                    .await
            }
        }

        ClientCommand::LeaveRoom { room } => {
            state
                .registry
                .lock()
                .await
                .leave_room(&room, player_id, LeaveReason::Left)
                .await
        }
    };

    if let Err(e) = outcome {
        tracing::debug!(%player_id, error = %e, "command refused");
        let _ = events.send(ServerEvent::Rejected {
            message: e.to_string(),
        });
    }
}
