use crate::room::Participant;
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// One admitted participant's connection.
///
/// The session owns the sending half of a bounded outbound queue; the write
/// pump owns the receiving half. Closing the session drops the sender, so the
/// write pump flushes what is already queued and then sends a close frame,
/// and cancels the shutdown token, which stops the read pump.
pub struct Session {
    conn_id: Uuid,
    participant_id: String,
    room_id: String,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        participant_id: impl Into<String>,
        room_id: impl Into<String>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let session = Session {
            conn_id: Uuid::new_v4(),
            participant_id: participant_id.into(),
            room_id: room_id.into(),
            outbound: Mutex::new(Some(tx)),
            shutdown: CancellationToken::new(),
        };
        (session, rx)
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Non-blocking enqueue. A full queue means the peer cannot keep up, and
    /// the session is closed instead of buffering without bound.
    pub fn enqueue(&self, payload: String) {
        let mut outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return;
        };
        match tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    conn = %self.conn_id,
                    participant = %self.participant_id,
                    room = %self.room_id,
                    "outbound queue full, disconnecting slow peer"
                );
                outbound.take();
                self.shutdown.cancel();
            }
            Err(TrySendError::Closed(_)) => {
                outbound.take();
            }
        }
    }

    /// Closes the outbound queue and signals both pumps. Idempotent.
    pub fn close(&self) {
        if self.outbound.lock().take().is_some() {
            debug!(conn = %self.conn_id, participant = %self.participant_id, "session closing");
        }
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Participant for Session {
    fn id(&self) -> &str {
        &self.participant_id
    }

    fn send(&self, payload: &str) {
        self.enqueue(payload.to_string());
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("conn_id", &self.conn_id)
            .field("participant_id", &self.participant_id)
            .field("room_id", &self.room_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
