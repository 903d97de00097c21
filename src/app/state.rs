//! Application state shared across routes

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::game::SessionHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    /// Set while a guest websocket is attached
    pub guest_connected: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: Config, session: SessionHandle) -> Self {
        Self {
            config: Arc::new(config),
            session,
            guest_connected: Arc::new(AtomicBool::new(false)),
        }
    }
}
