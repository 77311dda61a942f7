//! Per-connection handler: decode, dispatch, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. spawn an event-forwarding task (room actor → socket);
//!   2. loop: receive frames, decode [`ClientCommand`]s, dispatch;
//!   3. on close or error, notify the member's room so their seat is
//!      marked disconnected (never removed — reconnects keep the seat).
//!
//! Request-scoped failures become `error` events with an HTTP-style
//! code and never tear down the connection; only transport failures do.

use std::future::Future;
use std::sync::Arc;

use ratrace_identity::IdentityError;
use ratrace_protocol::{AccountId, ClientCommand, Codec, ServerEvent};
use ratrace_room::{now_ms, RoomError, RoomHandle};
use ratrace_storage::RoomStore;
use tokio::sync::mpsc;

use crate::gateway::{ConnectionSender, GatewayConnection};
use crate::server::ServerState;
use crate::RatraceError;

/// The room binding of a connection: set on join/restore, cleared on
/// leave, consumed by disconnect cleanup.
struct RoomBinding {
    handle: RoomHandle,
    account_id: AccountId,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: RoomStore>(
    mut conn: GatewayConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), RatraceError> {
    let conn_id = conn.id();
    let sender = conn.sender();
    tracing::debug!(%conn_id, "handling new connection");

    // Room actors deliver events through this channel; the forwarding
    // task writes them to the socket. It exits when every clone of the
    // tx side is gone (actor dropped it on disconnect) and drains what
    // was already queued.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    {
        let sender = sender.clone();
        let codec = state.codec;
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                let bytes = match codec.encode(&event) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "failed to encode event");
                        continue;
                    }
                };
                if sender.send(&bytes).await.is_err() {
                    break;
                }
            }
        });
    }

    // Lobby registration: every live connection gets room-list pushes.
    state
        .connections
        .lock()
        .await
        .insert(conn_id, events_tx.clone());

    let mut binding: Option<RoomBinding> = None;

    let result = connection_loop(
        &mut conn,
        &sender,
        &state,
        &events_tx,
        &mut binding,
    )
    .await;

    // Cleanup runs regardless of how the loop ended: the member's room
    // marks the seat disconnected and handles host reassignment.
    state.connections.lock().await.remove(&conn_id);
    if let Some(b) = binding {
        b.handle.disconnected(conn_id).await;
        tracing::info!(%conn_id, account_id = %b.account_id, "connection cleanup: seat marked disconnected");
    }

    result
}

async fn connection_loop<S: RoomStore>(
    conn: &mut GatewayConnection,
    sender: &ConnectionSender,
    state: &Arc<ServerState<S>>,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
    binding: &mut Option<RoomBinding>,
) -> Result<(), RatraceError> {
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let command: ClientCommand = match state.codec.decode(&data) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode command");
                send_error(sender, state, 400, &format!("invalid message: {e}"))
                    .await?;
                continue;
            }
        };

        dispatch(conn, sender, state, events_tx, binding, command).await?;
    }
}

/// Routes one decoded command. Request failures are reported to the
/// client in-band; only transport errors propagate.
async fn dispatch<S: RoomStore>(
    conn: &GatewayConnection,
    sender: &ConnectionSender,
    state: &Arc<ServerState<S>>,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
    binding: &mut Option<RoomBinding>,
    command: ClientCommand,
) -> Result<(), RatraceError> {
    let conn_id = conn.id();

    match command {
        // -- Identity --
        ClientCommand::AuthenticateUser { username, email, password } => {
            let outcome = {
                let mut identity = state.identity.lock().await;
                identity
                    .authenticate(
                        username.as_deref(),
                        &email,
                        &password,
                        conn_id,
                        now_ms(),
                    )
                    .map(|outcome| {
                        identity
                            .find(outcome.account_id())
                            .map(|a| (a.id.clone(), a.username.clone(), a.email.clone()))
                    })
            };
            match outcome {
                Ok(Some((account_id, username, email))) => {
                    send_event(
                        sender,
                        state,
                        &ServerEvent::Authenticated { account_id, username, email },
                    )
                    .await?;
                }
                Ok(None) => {
                    // authenticate just inserted or found this account.
                    send_error(sender, state, 500, "account lookup failed").await?;
                }
                Err(e) => {
                    send_error(sender, state, identity_code(&e), &e.to_string())
                        .await?;
                }
            }
        }

        ClientCommand::CheckUserExists { email } => {
            let exists = state.identity.lock().await.user_exists(&email);
            send_event(sender, state, &ServerEvent::UserExists { exists }).await?;
        }

        ClientCommand::CheckUsernameUnique { username } => {
            let unique = state.identity.lock().await.username_unique(&username);
            send_event(sender, state, &ServerEvent::UsernameUnique { unique })
                .await?;
        }

        // -- Room lifecycle --
        ClientCommand::CreateRoom {
            name,
            password,
            max_players,
            duration_minutes,
            profession_mode,
            shared_profession,
        } => {
            let result = {
                let mut rooms = state.rooms.lock().await;
                rooms
                    .create_room(ratrace_room::RoomOptions {
                        name,
                        password,
                        max_players,
                        duration_minutes,
                        profession_mode,
                        shared_profession,
                    })
                    .await
            };
            match result {
                Ok(handle) => {
                    match handle.snapshot().await {
                        Ok(room) => {
                            send_event(
                                sender,
                                state,
                                &ServerEvent::RoomData { room },
                            )
                            .await?;
                        }
                        Err(e) => {
                            send_error(
                                sender,
                                state,
                                room_code(&e),
                                &e.to_string(),
                            )
                            .await?;
                        }
                    }
                    // Everyone's lobby view just changed.
                    state.broadcast_room_list().await;
                }
                Err(e) => {
                    send_error(sender, state, room_code(&e), &e.to_string())
                        .await?;
                }
            }
        }

        ClientCommand::JoinRoom { room_id, account_id, display_name, password } => {
            let result = match state.rooms.lock().await.find(&room_id) {
                Ok(handle) => handle
                    .join(
                        account_id.clone(),
                        conn_id,
                        display_name,
                        password,
                        events_tx.clone(),
                    )
                    .await
                    .map(|()| handle),
                Err(e) => Err(e),
            };
            match result {
                Ok(handle) => {
                    if let Ok(room) = handle.snapshot().await {
                        send_event(sender, state, &ServerEvent::RoomData { room })
                            .await?;
                    }
                    *binding = Some(RoomBinding { handle, account_id });
                }
                Err(e) => {
                    send_error(sender, state, room_code(&e), &e.to_string())
                        .await?;
                }
            }
        }

        ClientCommand::LeaveRoom { room_id, account_id } => {
            let result = match state.rooms.lock().await.find(&room_id) {
                Ok(handle) => handle.leave(account_id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    *binding = None;
                }
                Err(e) => {
                    send_error(sender, state, room_code(&e), &e.to_string())
                        .await?;
                }
            }
        }

        ClientCommand::ListRooms => {
            let rooms = {
                let identity = state.identity.lock().await;
                let registry = state.rooms.lock().await;
                registry.list_rooms(&identity).await
            };
            send_event(sender, state, &ServerEvent::RoomsList { rooms }).await?;
        }

        ClientCommand::RestoreRoomState { room_id, account_id } => {
            let result = match state.rooms.lock().await.find(&room_id) {
                Ok(handle) => handle
                    .restore(account_id.clone(), conn_id, events_tx.clone())
                    .await
                    .map(|()| handle),
                Err(e) => Err(e),
            };
            match result {
                Ok(handle) => {
                    // The actor already sent roomData on this channel.
                    *binding = Some(RoomBinding { handle, account_id });
                }
                Err(e) => {
                    send_error(sender, state, room_code(&e), &e.to_string())
                        .await?;
                }
            }
        }

        // -- Lobby / game control --
        ClientCommand::PlayerReady { room_id, account_id, profession_id, dream_id } => {
            let profession = state.catalog.resolve(profession_id);
            if profession.is_none() {
                tracing::warn!(
                    %conn_id,
                    profession_id,
                    "unknown profession id at ready-up, member stays unseeded"
                );
            }
            room_op(sender, state, &room_id, |handle| async move {
                handle.ready(account_id, profession, dream_id).await
            })
            .await?;
        }

        ClientCommand::StartGame { room_id } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle.start_game(conn_id).await
            })
            .await?;
        }

        ClientCommand::EndGame { room_id } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle.end_game(conn_id).await
            })
            .await?;
        }

        // -- Turns --
        ClientCommand::ChangePlayerTurn { room_id, target_index } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle.change_turn(conn_id, target_index).await
            })
            .await?;
        }

        ClientCommand::SyncTurnTimer { room_id, time_left } => {
            // Fire-and-forget: no reply even when the room is unknown.
            if let Ok(handle) = state.rooms.lock().await.find(&room_id) {
                handle.sync_timer(conn_id, time_left).await;
            }
        }

        ClientCommand::AutoPassTurn { room_id } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle.auto_pass(conn_id).await
            })
            .await?;
        }

        // -- Ledger --
        ClientCommand::BankTransfer {
            room_id,
            sender_id,
            recipient_name,
            amount,
            reported_balance,
            transaction_id,
        } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle
                    .transfer(
                        conn_id,
                        sender_id,
                        recipient_name,
                        amount,
                        reported_balance,
                        transaction_id,
                    )
                    .await
            })
            .await?;
        }

        ClientCommand::CreditPayment { room_id, account_id, credit_type, amount } => {
            room_op(sender, state, &room_id, |handle| async move {
                handle.pay_credit(account_id, credit_type, amount).await
            })
            .await?;
        }
    }

    Ok(())
}

/// Looks up the room and runs `op` against its handle, reporting any
/// failure to the client in-band.
async fn room_op<S, F, Fut>(
    sender: &ConnectionSender,
    state: &Arc<ServerState<S>>,
    room_id: &ratrace_protocol::RoomId,
    op: F,
) -> Result<(), RatraceError>
where
    S: RoomStore,
    F: FnOnce(RoomHandle) -> Fut,
    Fut: Future<Output = Result<(), RoomError>>,
{
    let result = match state.rooms.lock().await.find(room_id) {
        Ok(handle) => op(handle).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        send_error(sender, state, room_code(&e), &e.to_string()).await?;
    }
    Ok(())
}

async fn send_event<S: RoomStore>(
    sender: &ConnectionSender,
    state: &Arc<ServerState<S>>,
    event: &ServerEvent,
) -> Result<(), RatraceError> {
    let bytes = state.codec.encode(event)?;
    sender.send(&bytes).await?;
    Ok(())
}

async fn send_error<S: RoomStore>(
    sender: &ConnectionSender,
    state: &Arc<ServerState<S>>,
    code: u16,
    message: &str,
) -> Result<(), RatraceError> {
    send_event(
        sender,
        state,
        &ServerEvent::Error { code, message: message.to_string() },
    )
    .await
}

/// HTTP-style code for a room failure.
fn room_code(e: &RoomError) -> u16 {
    match e {
        RoomError::Validation(_)
        | RoomError::InvalidTurnTarget { .. }
        | RoomError::InsufficientFunds { .. }
        | RoomError::CreditExceeded { .. }
        | RoomError::NotEnoughReady { .. } => 400,
        RoomError::WrongPassword
        | RoomError::NotHost
        | RoomError::NotYourTurn => 403,
        RoomError::NotFound(_) | RoomError::MemberNotFound(_) => 404,
        RoomError::RoomFull(_) | RoomError::WrongStatus { .. } => 409,
        RoomError::Unavailable(_) => 503,
    }
}

/// HTTP-style code for an identity failure.
fn identity_code(e: &IdentityError) -> u16 {
    match e {
        IdentityError::MissingUsername => 400,
        IdentityError::WrongPassword => 401,
        IdentityError::NotFound(_) => 404,
        IdentityError::UsernameTaken(_) => 409,
    }
}
