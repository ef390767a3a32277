//! Domain models for the simulator service.

pub mod interaction;
pub mod message;

pub use interaction::{InteractionRecord, SessionRecord, SESSION_STATUS_IN_PROGRESS};
pub use message::{ChatTurn, Message, Role};
