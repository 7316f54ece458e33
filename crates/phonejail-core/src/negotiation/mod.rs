//! Conversational unlock negotiation with the Jailkeeper.
//!
//! The user argues for access in free text. The completion service is told
//! a secret codeword and asked to include it only when it decides to grant
//! access. A reply received in access control mode that contains the
//! codeword unlocks the gate for the personality's grant duration.
//!
//! ## Limitations
//!
//! Grant detection is a plain substring match on model output. A model
//! that echoes the codeword while refusing still grants, and anyone who can
//! read the prompt or tamper with responses can unlock. This is a
//! self-accountability aid, not a security boundary.
//!
//! ## Stale completions
//!
//! Every mode transition bumps the session epoch and a reset changes the
//! session id. A completion that returns after either changed is dropped
//! without touching the transcript or the gate.

mod progress;
pub mod prompt;
mod protocol;
mod session;

pub use progress::TherapeuticProgress;
pub use protocol::{NegotiationOutcome, NegotiationState, Negotiator};
pub use session::{
    Codeword, ConversationTheme, Message, NegotiationMode, NegotiationSession, Sender,
};
