//! Admission of a new connection into a room, and the matching departure.

use crate::app_state::AppState;
use crate::error::{AdmissionError, RoomError};
use crate::pump::{read_pump, write_pump};
use crate::room::Room;
use crate::session::Session;
use crate::signal::SignalingMessage;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

/// Who is connecting and where to. Taken from the request before upgrade.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub participant_id: String,
    /// `None` asks for a freshly created room.
    pub room_id: Option<String>,
}

impl JoinRequest {
    pub fn new(
        participant_id: Option<String>,
        room_id: Option<String>,
    ) -> Result<Self, AdmissionError> {
        let participant_id = participant_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(AdmissionError::MissingParticipant)?;
        let room_id = room_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        Ok(Self {
            participant_id,
            room_id,
        })
    }
}

/// Runs admission for an upgraded socket. On success the session's pumps are
/// running and the call returns once they have both finished.
#[instrument(skip_all, fields(participant = %request.participant_id))]
pub async fn handle_socket(socket: WebSocket, request: JoinRequest, state: AppState) {
    let admitted = match admit(&state, request).await {
        Ok(admitted) => admitted,
        Err((request, e)) => {
            reject(socket, &request, &e, &state).await;
            return;
        }
    };

    let Admitted {
        room,
        session,
        outbound,
        created,
    } = admitted;

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(
        sink,
        outbound,
        session.clone(),
        state.config.clone(),
    ));
    let reader = tokio::spawn(read_pump(stream, session.clone(), state.clone()));

    announce(&room, &session, created).await;

    let _ = tokio::join!(reader, writer);
}

struct Admitted {
    room: Arc<Room>,
    session: Arc<Session>,
    outbound: mpsc::Receiver<String>,
    /// The room was generated for this participant.
    created: bool,
}

/// Resolves the room and registers a new session in it.
async fn admit(
    state: &AppState,
    request: JoinRequest,
) -> Result<Admitted, (JoinRequest, AdmissionError)> {
    let (room_id, created) = match &request.room_id {
        Some(id) => (id.clone(), false),
        None => (state.registry.create().await.id().to_string(), true),
    };
    let (session, outbound) = Session::new(
        request.participant_id.clone(),
        room_id.clone(),
        state.config.send_queue_capacity,
    );
    let session = Arc::new(session);

    loop {
        let room = state.registry.get_or_create(&room_id).await;
        match room.add_member(session.clone()).await {
            Ok(()) => {
                let members = room.len().await;
                info!(conn = %session.conn_id(), room = %room_id, members, "participant admitted");
                return Ok(Admitted {
                    room,
                    session,
                    outbound,
                    created,
                });
            }
            // Emptied and dropped between lookup and insert; look it up again.
            Err(RoomError::Retired) => continue,
            Err(e) => return Err((request, e.into())),
        }
    }
}

/// Tells the room about the newcomer and the newcomer about the room.
async fn announce(room: &Room, session: &Session, created: bool) {
    let participant_id = session.participant_id();

    room.broadcast(
        participant_id,
        &SignalingMessage::user_joined(participant_id, room.id()).encode(),
    )
    .await;

    if created {
        session.enqueue(SignalingMessage::room_created(participant_id, room.id()).encode());
    }
    let others = room.other_members(participant_id).await;
    session.enqueue(SignalingMessage::room_info(participant_id, &others).encode());
}

async fn reject(
    mut socket: WebSocket,
    request: &JoinRequest,
    error: &AdmissionError,
    state: &AppState,
) {
    warn!(room = ?request.room_id, error = %error, "admission rejected");
    let notice = match error {
        AdmissionError::Room(RoomError::Full { .. }) => {
            SignalingMessage::room_full(&request.participant_id, &error.to_string())
        }
        _ => SignalingMessage::error(&request.participant_id, &error.to_string()),
    };
    let deadline = state.config.write_timeout;
    let _ = timeout(deadline, socket.send(Message::Text(notice.encode()))).await;
    let close = Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: Cow::Borrowed("admission rejected"),
    }));
    let _ = timeout(deadline, socket.send(close)).await;
}

/// Removes a finished session from its room and tells whoever is left.
/// Drops the room from the registry if it is now empty.
pub async fn depart(state: &AppState, session: &Session) {
    let room_id = session.room_id();
    let participant_id = session.participant_id();
    let Some(room) = state.registry.get(room_id).await else {
        return;
    };
    if room.remove_member(participant_id).await.is_none() {
        return;
    }
    let notice = SignalingMessage::user_left(participant_id, room_id).encode();
    room.broadcast(participant_id, &notice).await;
    state.registry.remove_if_empty(room_id).await;
    info!(
        conn = %session.conn_id(),
        participant = participant_id,
        room = room_id,
        "participant left"
    );
}
