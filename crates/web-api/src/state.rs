use std::sync::Arc;

use application::{MessageRouter, ParticipantRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ParticipantRegistry>,
    pub message_router: Arc<MessageRouter>,
}

impl AppState {
    pub fn new(registry: Arc<ParticipantRegistry>, message_router: Arc<MessageRouter>) -> Self {
        Self {
            registry,
            message_router,
        }
    }
}
