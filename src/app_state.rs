use crate::auth::{AccessGate, SharedTokenGate};
use crate::config::Config;
use crate::registry::RoomRegistry;
use std::sync::Arc;

// Shared application state, built once in main and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub config: Arc<Config>,
    pub gate: Arc<dyn AccessGate>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let gate = SharedTokenGate::new(config.auth_token.clone());
        Self::with_gate(config, Arc::new(gate))
    }

    pub fn with_gate(config: Config, gate: Arc<dyn AccessGate>) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new(config.room_capacity)),
            config: Arc::new(config),
            gate,
        }
    }
}
