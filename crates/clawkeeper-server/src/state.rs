use std::sync::Arc;

use clawkeeper_core::Keeper;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub keeper: Arc<Keeper>,
}

impl AppState {
    pub fn new(keeper: Arc<Keeper>) -> Self {
        Self { keeper }
    }
}
