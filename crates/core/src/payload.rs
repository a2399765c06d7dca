//! Outbound data-channel payloads.
//!
//! Agents push a small JSON message describing what they just said plus some
//! state metadata so a client UI can render it. When no channel is attached
//! the payload is only logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub text: String,
    pub meta: Map<String, Value>,
}

impl AgentPayload {
    /// A transcript line spoken by the agent.
    pub fn transcript(text: impl Into<String>, meta: Map<String, Value>) -> Self {
        Self {
            kind: "transcript".to_string(),
            role: "agent".to_string(),
            text: text.into(),
            meta,
        }
    }
}

/// Something that can broadcast raw bytes to the other side of a conversation.
#[async_trait]
pub trait DataChannel: Send + Sync {
    async fn send_data(&self, data: Vec<u8>) -> anyhow::Result<()>;
}

/// Sends `payload` over `channel`, or logs it when there is none.
///
/// Delivery failures are logged and swallowed; they never abort a turn.
pub async fn broadcast(channel: Option<&dyn DataChannel>, payload: &AgentPayload) {
    let blob = match serde_json::to_vec(payload) {
        Ok(blob) => blob,
        Err(e) => {
            warn!(error = %e, "Failed to serialize agent payload");
            return;
        }
    };
    match channel {
        Some(channel) => {
            if let Err(e) = channel.send_data(blob).await {
                warn!(error = ?e, "Failed to send data payload");
            }
        }
        None => {
            info!(
                payload = %String::from_utf8_lossy(&blob),
                "No data channel attached; payload logged"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl DataChannel for Recorder {
        async fn send_data(&self, data: Vec<u8>) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl DataChannel for Broken {
        async fn send_data(&self, _data: Vec<u8>) -> anyhow::Result<()> {
            anyhow::bail!("room is gone")
        }
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut meta = Map::new();
        meta.insert("health".into(), json!(90));
        let payload = AgentPayload::transcript("What do you do?", meta);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "transcript",
                "role": "agent",
                "text": "What do you do?",
                "meta": { "health": 90 }
            })
        );
    }

    #[tokio::test]
    async fn test_broadcast_sends_json_bytes() {
        let recorder = Recorder::default();
        let payload = AgentPayload::transcript("hello", Map::new());
        broadcast(Some(&recorder), &payload).await;

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let decoded: AgentPayload = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_broadcast_without_channel_or_with_failure_does_not_panic() {
        let payload = AgentPayload::transcript("hello", Map::new());
        broadcast(None, &payload).await;
        broadcast(Some(&Broken), &payload).await;
    }
}
