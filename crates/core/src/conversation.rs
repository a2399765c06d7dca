use crate::error::{CoreError, Result};
use crate::tools::{ToolDefinition, ToolOutput};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// How a demo decides what to do with each user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    /// A fixed prompt sequence answers every message directly.
    Scripted,
    /// The model reads the message and picks tools to call.
    ToolCalling,
}

impl TurnMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnMode::Scripted => "scripted",
            TurnMode::ToolCalling => "tool_calling",
        }
    }
}

/// One live conversation with one demo agent.
///
/// Implementors own all session state; the driver only ever reaches it
/// through these methods, one call at a time.
#[async_trait]
pub trait Conversation: Send {
    /// Short identifier of the demo (e.g. `"grocery"`).
    fn demo(&self) -> &'static str;

    fn mode(&self) -> TurnMode;

    /// System instructions for the model. Scripted demos may return an empty string.
    fn instructions(&self) -> String;

    /// The first thing the agent says when the session starts.
    async fn opening(&mut self) -> Result<String>;

    /// Answers a message directly. Only called for [`TurnMode::Scripted`].
    async fn respond(&mut self, _message: &str) -> Result<String> {
        Ok(String::new())
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn call_tool(&mut self, name: &str, _args: Value) -> Result<ToolOutput> {
        Err(CoreError::UnknownTool(name.to_string()))
    }

    /// State metadata attached to outbound payloads.
    fn meta(&self) -> Map<String, Value> {
        Map::new()
    }

    /// True once the terminal condition (order placed, case closed) is reached.
    fn is_finished(&self) -> bool {
        false
    }

    /// Flushes anything that must survive the process.
    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
