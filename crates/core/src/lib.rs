pub mod cart;
pub mod catalog;
pub mod conversation;
pub mod driver;
pub mod error;
pub mod intake;
pub mod llm_client;
pub mod payload;
pub mod store;
pub mod tools;
pub mod usage;

pub use error::{CoreError, Result};

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum is the primary API for decoupling the agent's decision-making
/// from the runtime's execution of side effects (like speaking text or
/// finalizing a session).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Command the runtime to speak the given text to the user.
    SpeakText(String),
    /// Command indicating the session is complete, with a final message.
    SessionComplete(String),
}

impl Command {
    pub fn text(&self) -> &str {
        match self {
            Command::SpeakText(text) | Command::SessionComplete(text) => text,
        }
    }
}
