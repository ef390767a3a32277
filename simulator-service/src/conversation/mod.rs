//! Conversation core: phases, prompts, output cleanup and the session
//! controller that ties them to the relay.

pub mod phase;
pub mod prompts;
pub mod sanitize;
pub mod session;

pub use phase::{next_phase, Phase};
pub use prompts::{build_system_prompt, FormOfAddress, ParticipantProfile, OPENING_MESSAGE};
pub use sanitize::sanitize;
pub use session::{
    ChatSession, SessionError, SessionHandle, SessionState, TurnOutcome, APOLOGY_MESSAGE,
};
