use anyhow::Result;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use parley_core::payload::DataChannel;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Forwards agent payloads to the client as text frames.
pub struct WsChannel {
    sink: SocketSink,
}

impl WsChannel {
    pub fn new(sink: SocketSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl DataChannel for WsChannel {
    async fn send_data(&self, data: Vec<u8>) -> Result<()> {
        let text = String::from_utf8(data)?;
        self.sink.lock().await.send(Message::Text(text.into())).await?;
        Ok(())
    }
}
