//! Shared application state for all routes.

use crate::exec::CommandGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CommandGateway>,
}

impl AppState {
    pub fn new(gateway: Arc<CommandGateway>) -> Self {
        AppState { gateway }
    }
}
