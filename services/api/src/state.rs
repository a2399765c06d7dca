//! Shared Application State

use parley_core::llm_client::LLMClient;
use parley_demos::DemoContext;
use std::sync::Arc;

/// Created once at startup and handed to every handler and socket.
#[derive(Clone)]
pub struct AppState {
    pub ctx: DemoContext,
    /// Absent when no provider key is configured; only scripted demos can run then.
    pub llm_client: Option<Arc<dyn LLMClient>>,
}
