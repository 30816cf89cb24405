//! Error types for rooms, routing, sessions and admission.
//!
//! `RouteError` is recoverable: its text goes back to the sender as an
//! `error` message. `SessionError` ends one session and nothing else.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room is full (max {capacity} participants)")]
    Full { capacity: usize },

    #[error("participant {0} is already in the room")]
    DuplicateParticipant(String),

    /// The room emptied and was dropped from the registry.
    #[error("room has been closed")]
    Retired,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("invalid message format")]
    InvalidMessage,

    #[error("missing 'type' field")]
    MissingType,

    #[error("not in a room")]
    NoRoom,

    #[error("room not found")]
    RoomNotFound,

    #[error("target user not in room")]
    TargetNotInRoom,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("read deadline expired")]
    ReadTimeout,

    #[error("write deadline expired")]
    WriteTimeout,

    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("user_id is required")]
    MissingParticipant,

    #[error(transparent)]
    Room(#[from] RoomError),
}
