//! WebRTC signaling relay.
//!
//! Peers connect over WebSocket, are grouped into rooms of at most four, and
//! exchange small JSON control messages (offer/answer/ICE and anything else)
//! either with the whole room or with one named member. No media passes
//! through here and nothing is persisted.

pub mod admission;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod pump;
pub mod registry;
pub mod room;
pub mod router;
pub mod server;
pub mod session;
pub mod signal;

pub use app_state::AppState;
pub use config::Config;
