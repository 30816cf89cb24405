use crate::error::RouteError;
use crate::registry::RoomRegistry;
use crate::session::Session;
use crate::signal::SignalingMessage;
use tracing::{debug, instrument, warn};

/// Where an inbound message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Broadcast { recipients: usize },
    Unicast { to: String },
}

/// Decodes one inbound frame from `session` and relays it.
///
/// Failures are answered with an `error` message to the sender; the session
/// carries on either way.
#[instrument(skip_all, fields(participant = %session.participant_id(), room = %session.room_id()))]
pub async fn route(
    registry: &RoomRegistry,
    session: &Session,
    frame: &[u8],
) -> Result<Delivery, RouteError> {
    let result = dispatch(registry, session, frame).await;
    if let Err(e) = &result {
        warn!(error = %e, "rejected inbound message");
        let reply = SignalingMessage::error(session.participant_id(), &e.to_string());
        session.enqueue(reply.encode());
    }
    result
}

async fn dispatch(
    registry: &RoomRegistry,
    session: &Session,
    frame: &[u8],
) -> Result<Delivery, RouteError> {
    let mut msg = SignalingMessage::decode(frame).map_err(|e| {
        debug!(error = %e, "failed to decode signaling message");
        RouteError::InvalidMessage
    })?;
    msg.from = session.participant_id().to_string();

    if msg.kind.is_empty() {
        return Err(RouteError::MissingType);
    }
    if session.room_id().is_empty() {
        return Err(RouteError::NoRoom);
    }
    let room = registry
        .get(session.room_id())
        .await
        .ok_or(RouteError::RoomNotFound)?;

    let payload = msg.encode();
    if msg.is_broadcast() {
        let recipients = room.broadcast(&msg.from, &payload).await;
        debug!(kind = %msg.kind, recipients, "broadcast");
        Ok(Delivery::Broadcast { recipients })
    } else if room.send_to(&msg.to, &payload).await {
        debug!(kind = %msg.kind, to = %msg.to, "forwarded");
        Ok(Delivery::Unicast { to: msg.to })
    } else {
        Err(RouteError::TargetNotInRoom)
    }
}
