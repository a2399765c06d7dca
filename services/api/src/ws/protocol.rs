//! Defines the WebSocket message protocol between the client and the API server.
//!
//! Agent replies do not appear here: they travel as `transcript` payloads
//! pushed through the data channel.

use parley_core::usage::UsageSummary;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Picks the demo for this connection. This must be the first message.
    #[serde(rename = "init")]
    Init { demo: String },
    /// A text message from the user to the agent.
    #[serde(rename = "user_message")]
    UserMessage { text: String },
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the demo session was opened.
    Initialized {
        session_id: Uuid,
        demo: String,
        mode: String,
    },
    /// Reports an error to the client.
    Error { message: String },
    /// The demo reached its terminal state, or the session was torn down.
    SessionEnded { usage: UsageSummary },
}
