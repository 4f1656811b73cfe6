//! WebSocket Connection Handler
//!
//! Handles one gateway connection: identify handshake, event dispatch and
//! disconnect cleanup. Every handled frame is acknowledged; a connection
//! that fails the handshake is terminated without further processing.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::application::dto::{
    Ack, ChatMessage, ChatUserEvent, ChatUserStatusChanged, ClientEvent, ClientFrame, RoomUser,
    ServerEvent,
};
use crate::application::services::{Connection, DmOutcome};
use crate::domain::{Membership, MembershipRepository, RoomRepository, RoomRole, RoomType, UserRepository};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims carried by the handshake token.
#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
    /// Connections that have not completed two-factor auth are rejected.
    #[serde(default)]
    two_factor_passed: bool,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4().to_string();
    tracing::debug!(session_id = %session_id, "New gateway connection");

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Channel for outgoing events
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Spawn task to forward events from the outbox to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Wait for Identify (with timeout)
    let identify_timeout = Duration::from_secs(state.settings.websocket.identify_timeout_secs);
    let identify_result = timeout(identify_timeout, async {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) {
                        if let ClientEvent::Identify { token } = frame.event {
                            return Some((frame.seq, token));
                        }
                    }
                }
                Ok(Message::Close(_)) => return None,
                Err(_) => return None,
                _ => continue,
            }
        }
        None
    })
    .await;

    // Unauthenticated: terminate immediately, no further processing.
    let (identify_seq, token) = match identify_result {
        Ok(Some(pair)) => pair,
        Ok(None) | Err(_) => {
            tracing::debug!(session_id = %session_id, "Connection closed before identify");
            sender_task.abort();
            return;
        }
    };

    let user_id = match validate_token(&token, &state) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(session_id = %session_id, error = %e, "Invalid handshake token");
            sender_task.abort();
            return;
        }
    };

    let connection = Arc::new(Connection::new(session_id.clone(), user_id, tx));
    let first = state.registry.register(Arc::clone(&connection));

    // Subscribe the fresh connection to every persisted membership.
    if let Err(e) = state.sync.resubscribe_on_connect(&connection).await {
        tracing::error!(user_id, error = %e, "Failed to resubscribe memberships");
        state.registry.unregister(&session_id);
        sender_task.abort();
        return;
    }

    if let Err(e) = state.presence.on_connection_added(user_id, first).await {
        tracing::error!(user_id, error = %e, "Presence transition failed on connect");
    }

    connection.send(ServerEvent::Ack(Ack::ok(identify_seq)));
    tracing::info!(user_id, session_id = %session_id, "User connected and identified");

    // Main event loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame = match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(f) => f,
                    Err(e) => {
                        connection.send(ServerEvent::Ack(Ack {
                            seq: None,
                            status: 400,
                            room_id: None,
                            message: Some(format!("Malformed frame: {}", e)),
                        }));
                        continue;
                    }
                };

                let ack = match dispatch(&state, &connection, frame.event).await {
                    Ok(ack) => Ack { seq: frame.seq, ..ack },
                    Err(e) => Ack {
                        seq: frame.seq,
                        status: e.status_code(),
                        room_id: None,
                        message: Some(e.client_message()),
                    },
                };
                connection.send(ServerEvent::Ack(ack));
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(session_id = %session_id, "Connection closed");
                break;
            }
            Ok(Message::Ping(_)) => {
                // Pong is handled automatically by axum
            }
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    if let Some((uid, last)) = state.registry.unregister(&session_id) {
        if let Err(e) = state.presence.on_connection_removed(uid, last).await {
            tracing::error!(uid, error = %e, "Presence transition failed on disconnect");
        }
    }
    sender_task.abort();

    tracing::info!(user_id, session_id = %session_id, "User disconnected");
}

/// Dispatch a client event to the chat core. Returns the success ack;
/// errors are mapped onto the ack taxonomy by the caller.
async fn dispatch(
    state: &AppState,
    connection: &Arc<Connection>,
    event: ClientEvent,
) -> Result<Ack, AppError> {
    let uid = connection.user_id;
    match event {
        ClientEvent::Identify { .. } => {
            // Already identified; a second handshake is a protocol error.
            Err(AppError::BadRequest("Already identified".into()))
        }

        ClientEvent::Send { room_id, content } => {
            // DM delivery force-joins both participants, bypassing the
            // password gate but never the ban list. Best-effort per uid.
            let room = state.rooms.find_by_id(room_id).await?;
            if let Some((low, high)) = room.as_ref().and_then(|r| r.dm_participants) {
                for participant in [low, high] {
                    if let Err(e) = state.sync.join_all(participant, room_id, None, true).await {
                        tracing::debug!(
                            participant,
                            room_id,
                            error = %e,
                            "DM force-join skipped"
                        );
                    }
                }
            }

            state.router.deliver_message(uid, room_id, &content).await?;
            Ok(Ack::ok(None))
        }

        ClientEvent::Join { room_id, password } => {
            state
                .sync
                .join_all(uid, room_id, password.as_deref(), false)
                .await?;
            state.router.notify(
                room_id,
                ServerEvent::Notice(ChatMessage::new(room_id, uid, "join")),
            );
            Ok(Ack::ok(None).with_room(room_id))
        }

        ClientEvent::Leave { room_id } => {
            if state.moderation.is_owner(uid, room_id).await? {
                // Owner leaving destroys the room: one destroyed notice to
                // the pre-destruction roster, then atomic teardown.
                state
                    .router
                    .notify(room_id, ServerEvent::Destroyed(RoomUser { room_id, uid }));
                state.sync.destroy_room(room_id).await?;
                state.moderation.forget_room(room_id);
                tracing::info!(uid, room_id, "Owner left; room destroyed");
            } else {
                state.sync.leave_all(uid, room_id).await?;
                state.router.notify(
                    room_id,
                    ServerEvent::Notice(ChatMessage::new(room_id, uid, "leave")),
                );
            }
            Ok(Ack::ok(None))
        }

        ClientEvent::Create {
            title,
            room_type,
            password,
        } => {
            if room_type == RoomType::Dm {
                return Err(AppError::BadRequest(
                    "DM rooms are created through invite_dm".into(),
                ));
            }
            let password_hash = match (&room_type, password.as_deref()) {
                (RoomType::Protected, Some(p)) if !p.is_empty() => {
                    Some(crate::shared::password::hash_password(p)?)
                }
                (RoomType::Protected, _) => {
                    return Err(AppError::BadRequest(
                        "Protected rooms require a password".into(),
                    ))
                }
                _ => None,
            };

            let room = state
                .rooms
                .create(&title, room_type, password_hash.as_deref(), uid)
                .await?;
            state
                .memberships
                .upsert(&Membership::new(room.id, uid, RoomRole::Owner))
                .await?;
            state.sync.subscribe_connections(uid, room.id);
            state.router.notify(
                room.id,
                ServerEvent::Notice(ChatMessage::new(room.id, uid, "join")),
            );
            Ok(Ack::ok(None).with_room(room.id))
        }

        ClientEvent::Invite { room_id, nickname } => {
            let invitee = state
                .users
                .find_uid_by_nickname(&nickname)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Nickname {} not found", nickname)))?;

            if !connection.is_in_room(room_id) {
                return Err(AppError::BadRequest("You are not in this room".into()));
            }
            if state.memberships.find(room_id, invitee).await?.is_some() {
                return Err(AppError::BadRequest("User is already in room".into()));
            }
            if !state.registry.is_online(invitee) {
                return Err(AppError::BadRequest("User is not online".into()));
            }

            state.sync.join_all(invitee, room_id, None, true).await?;
            state.router.notify(
                room_id,
                ServerEvent::Notice(ChatMessage::new(room_id, invitee, "join")),
            );
            Ok(Ack::ok(None))
        }

        ClientEvent::InviteDm { invitee } => {
            let (room, outcome) = state.dm.resolve_or_create(uid, invitee).await?;
            match outcome {
                DmOutcome::AlreadyMember => Ok(Ack {
                    seq: None,
                    status: 400,
                    room_id: Some(room.id),
                    message: Some(format!(
                        "DM for {} and {} already exists (room {})",
                        uid, invitee, room.id
                    )),
                }),
                DmOutcome::Rejoined => {
                    state.router.notify(
                        room.id,
                        ServerEvent::Notice(ChatMessage::new(room.id, uid, "join")),
                    );
                    Ok(Ack::ok(None).with_room(room.id))
                }
                DmOutcome::Created => {
                    for participant in [uid, invitee] {
                        state.router.notify(
                            room.id,
                            ServerEvent::Notice(ChatMessage::new(room.id, participant, "join")),
                        );
                    }
                    Ok(Ack::ok(None).with_room(room.id))
                }
            }
        }

        ClientEvent::AddAdmin { room_id, uid: target } => {
            state.moderation.grant_admin(uid, target, room_id).await?;
            notify_status_change(state, room_id, target, ChatUserEvent::AdminAdded);
            Ok(Ack::ok(None))
        }

        ClientEvent::RemoveAdmin { room_id, uid: target } => {
            state.moderation.revoke_admin(uid, target, room_id).await?;
            notify_status_change(state, room_id, target, ChatUserEvent::AdminRemoved);
            Ok(Ack::ok(None))
        }

        ClientEvent::Ban { room_id, uid: target } => {
            state.moderation.ban(uid, target, room_id).await?;
            let notice = ChatMessage::new(room_id, target, "banned");
            state
                .router
                .notify(room_id, ServerEvent::Notice(notice.clone()));
            // The target's connections already lost the group; tell them
            // directly.
            for c in state.registry.connections_of(target) {
                c.send(ServerEvent::Notice(notice.clone()));
            }
            Ok(Ack::ok(None))
        }

        ClientEvent::Unban { room_id, uid: target } => {
            state.moderation.unban(uid, target, room_id).await?;
            let notice = ChatMessage::new(room_id, target, "unbanned");
            state
                .router
                .notify(room_id, ServerEvent::Notice(notice.clone()));
            for c in state.registry.connections_of(target) {
                c.send(ServerEvent::Notice(notice.clone()));
            }
            Ok(Ack::ok(None))
        }

        ClientEvent::Mute {
            room_id,
            uid: target,
            seconds,
        } => {
            state.moderation.mute(uid, target, room_id, seconds).await?;
            notify_status_change(state, room_id, target, ChatUserEvent::Muted);
            Ok(Ack::ok(None))
        }

        ClientEvent::Unmute { room_id, uid: target } => {
            state.moderation.unmute(uid, target, room_id).await?;
            notify_status_change(state, room_id, target, ChatUserEvent::Unmuted);
            Ok(Ack::ok(None))
        }

        ClientEvent::Password {
            room_id,
            command,
            password,
        } => {
            state
                .moderation
                .set_password(uid, room_id, command, password.as_deref())
                .await?;
            Ok(Ack::ok(None))
        }
    }
}

fn notify_status_change(state: &AppState, room_id: i64, uid: i64, change: ChatUserEvent) {
    state.router.notify(
        room_id,
        ServerEvent::ChatUserStatus(ChatUserStatusChanged {
            room_id,
            uid,
            change,
        }),
    );
}

/// Validate the handshake JWT and return the user ID.
fn validate_token(token: &str, state: &AppState) -> Result<i64, String> {
    let secret = &state.settings.jwt.secret;

    let token_data = decode::<Claims>(
        token.trim(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| format!("Invalid token: {}", e))?;

    if !token_data.claims.two_factor_passed {
        return Err("Two-factor authentication not completed".into());
    }

    token_data
        .claims
        .sub
        .parse::<i64>()
        .map_err(|e| format!("Invalid user ID in token: {}", e))
}
