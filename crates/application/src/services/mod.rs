mod message_router;
mod participant_registry;

pub use message_router::{MessageRouter, MessageRouterDependencies};
pub use participant_registry::{ParticipantRegistry, ParticipantRegistryDependencies};
