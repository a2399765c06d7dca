//! Manages the WebSocket connection lifecycle for one demo session.

use super::{
    channel::{SocketSink, WsChannel},
    protocol::{ClientMessage, ServerMessage},
};
use crate::state::AppState;
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use parley_core::{
    Command,
    conversation::{Conversation, TurnMode},
    driver::ConversationDriver,
};
use parley_demos::{DemoKind, open_demo};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection.
///
/// Waits for the `init` message, opens the requested demo and spawns the
/// session loop. Any failure before that point is reported to the client
/// and closes the connection.
#[instrument(name = "ws_session", skip_all, fields(session_id, demo))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx: SocketSink = Arc::new(Mutex::new(socket_tx));

    let opened = match socket_rx.next().await {
        Some(Ok(Message::Text(text))) => initialize_session(&text, &state).await,
        Some(Ok(_)) => Err(anyhow!("First message was not a text `init` message.")),
        _ => {
            info!("Client disconnected before sending init message.");
            return;
        }
    };
    let (kind, conversation) = match opened {
        Ok(opened) => opened,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let _ = send_msg(
                &mut *socket_tx.lock().await,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Initialized {
            session_id,
            demo: kind.to_string(),
            mode: kind.mode().as_str().to_string(),
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let session_span = tracing::info_span!("demo_session", %session_id, demo = %kind);
    tokio::spawn(
        async move {
            if let Err(e) = run_demo_session(state, socket_tx, socket_rx, conversation).await {
                error!(error = ?e, "Demo session terminated with error.");
            }
            info!("Demo session finished.");
        }
        .instrument(session_span),
    );
}

/// Parses the `init` message and opens the demo it names.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(DemoKind, Box<dyn Conversation>)> {
    let ClientMessage::Init { demo } = serde_json::from_str::<ClientMessage>(init_text)? else {
        return Err(anyhow!("First message must be `init`"));
    };
    let kind = demo.parse::<DemoKind>().map_err(|e| anyhow!(e))?;
    tracing::Span::current().record("demo", kind.as_str());

    if kind.mode() == TurnMode::ToolCalling && state.llm_client.is_none() {
        return Err(anyhow!(
            "The '{}' demo needs a language model, but no provider key is configured",
            kind
        ));
    }

    let conversation = open_demo(kind, &state.ctx).await?;
    info!("Demo opened");
    Ok((kind, conversation))
}

/// The main loop for an active session.
///
/// Each user message is one driver turn; the reply reaches the client through
/// the data channel. The loop ends when the demo completes or the client
/// goes away, after which the session is shut down and its usage reported.
async fn run_demo_session(
    state: Arc<AppState>,
    socket_tx: SocketSink,
    mut socket_rx: SplitStream<WebSocket>,
    mut conversation: Box<dyn Conversation>,
) -> Result<()> {
    let channel = Arc::new(WsChannel::new(socket_tx.clone()));
    let mut driver = ConversationDriver::new(state.llm_client.clone()).with_channel(channel);

    let mut completed = matches!(
        driver.start(conversation.as_mut()).await?,
        Command::SessionComplete(_)
    );

    while !completed {
        let Some(msg_result) = socket_rx.next().await else {
            break;
        };
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::UserMessage { text }) => {
                    match driver.turn(conversation.as_mut(), &text).await {
                        Ok(Command::SessionComplete(_)) => completed = true,
                        Ok(Command::SpeakText(_)) => {}
                        Err(e) => {
                            error!(error = ?e, "Turn failed");
                            send_msg(
                                &mut *socket_tx.lock().await,
                                ServerMessage::Error {
                                    message: "Sorry, something went wrong handling that message."
                                        .to_string(),
                                },
                            )
                            .await?;
                        }
                    }
                }
                Ok(ClientMessage::Init { .. }) => warn!("Ignoring repeated init message."),
                Err(e) => warn!(error = %e, "Ignoring malformed client message."),
            },
            Ok(Message::Binary(_)) => warn!("Ignoring binary frame; only text is supported."),
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
    }

    let usage = driver.finish(conversation.as_mut()).await?;
    if completed {
        send_msg(&mut *socket_tx.lock().await, ServerMessage::SessionEnded { usage }).await?;
    }
    Ok(())
}

/// Serializes a `ServerMessage` and sends it to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
