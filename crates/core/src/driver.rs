//! Turn-taking driver.
//!
//! Feeds each user message to a [`Conversation`]. Scripted demos answer
//! directly; tool-calling demos go through a Reason-Act cycle: the model
//! decides on tool calls, the tools run against the session, and the model
//! phrases the final answer from their results. Every reply is broadcast as
//! an [`AgentPayload`] and turned into a [`Command`] for the runtime.

use crate::Command;
use crate::conversation::{Conversation, TurnMode};
use crate::llm_client::{LLMAction, LLMClient, LLMStreamEvent};
use crate::payload::{AgentPayload, DataChannel, broadcast};
use crate::tools::ToolDefinition;
use crate::usage::{UsageCollector, UsageSummary};
use anyhow::{Context, Result, anyhow};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs,
};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Converts registry definitions into the OpenAI tool format.
pub fn to_openai_tools(definitions: Vec<ToolDefinition>) -> Result<Vec<ChatCompletionTool>> {
    definitions
        .into_iter()
        .map(|def| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(def.name)
                        .description(def.description)
                        .parameters(def.parameters)
                        .build()?,
                )
                .build()?)
        })
        .collect()
}

pub struct ConversationDriver {
    llm: Option<Arc<dyn LLMClient>>,
    channel: Option<Arc<dyn DataChannel>>,
    history: Vec<ChatCompletionRequestMessage>,
    usage: UsageCollector,
}

impl ConversationDriver {
    /// `llm` may be `None` when only scripted demos will be driven.
    pub fn new(llm: Option<Arc<dyn LLMClient>>) -> Self {
        Self {
            llm,
            channel: None,
            history: Vec::new(),
            usage: UsageCollector::new(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn DataChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn usage(&self) -> UsageSummary {
        self.usage.summary()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Speaks the demo's opening line.
    pub async fn start(&mut self, conv: &mut dyn Conversation) -> Result<Command> {
        let opening = conv.opening().await?;
        self.push_assistant(&opening)?;
        Ok(self.emit(conv, opening).await)
    }

    /// Handles one user message and returns what the runtime should do next.
    pub async fn turn(&mut self, conv: &mut dyn Conversation, user_text: &str) -> Result<Command> {
        self.usage.record_turn();
        self.history.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_text.to_string())
                .build()?
                .into(),
        );

        let reply = match conv.mode() {
            TurnMode::Scripted => conv.respond(user_text).await?,
            TurnMode::ToolCalling => self.react(conv).await?,
        };

        self.push_assistant(&reply)?;
        Ok(self.emit(conv, reply).await)
    }

    /// Flushes the conversation and logs the usage summary.
    pub async fn finish(&mut self, conv: &mut dyn Conversation) -> Result<UsageSummary> {
        conv.shutdown()
            .await
            .with_context(|| format!("Failed to shut down '{}' demo", conv.demo()))?;
        let summary = self.usage.summary();
        info!(demo = conv.demo(), %summary, "Usage");
        Ok(summary)
    }

    async fn react(&mut self, conv: &mut dyn Conversation) -> Result<String> {
        let llm = self
            .llm
            .clone()
            .ok_or_else(|| anyhow!("The '{}' demo needs a language model.", conv.demo()))?;

        let tools = to_openai_tools(conv.tools())?;
        self.usage.record_llm_call();
        let action = llm
            .decide_action(conv.instructions(), self.history.clone(), tools)
            .await?;

        let tool_calls = match action {
            LLMAction::TextResponse(text) => return Ok(text),
            LLMAction::ToolCall(tool_calls) => tool_calls,
        };

        let mut results = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            let outcome = match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(args) => conv.call_tool(&call.function.name, args).await,
                Err(e) => Err(e.into()),
            };
            self.usage.record_tool_call(outcome.is_ok());
            let text = match outcome {
                Ok(output) => output.text(),
                Err(e) => {
                    warn!(tool = %call.function.name, error = %e, "Tool call failed");
                    format!("Error: {}", e)
                }
            };
            results.push(text);
        }

        self.history.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .tool_calls(tool_calls.clone())
                .build()?
                .into(),
        );
        for (call, result) in tool_calls.iter().zip(&results) {
            self.history.push(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call.id.clone())
                    .content(result.clone())
                    .build()?
                    .into(),
            );
        }

        self.usage.record_llm_call();
        let mut stream = llm
            .stream_after_tools(conv.instructions(), self.history.clone())
            .await?;
        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(LLMStreamEvent::TextChunk(chunk)) => reply.push_str(&chunk),
                Err(e) => warn!(error = %e, "Error in LLM stream"),
            }
        }

        // The tool sentence already ends with the next prompt; fall back to it.
        if reply.trim().is_empty() {
            reply = results.pop().unwrap_or_default();
        }
        Ok(reply)
    }

    fn push_assistant(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.history.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(text.to_string())
                .build()?
                .into(),
        );
        Ok(())
    }

    async fn emit(&self, conv: &mut dyn Conversation, text: String) -> Command {
        let payload = AgentPayload::transcript(text.clone(), conv.meta());
        let finished = conv.is_finished();
        broadcast(self.channel.as_deref(), &payload).await;
        if finished {
            Command::SessionComplete(text)
        } else {
            Command::SpeakText(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CoreResult;
    use crate::llm_client::{LLMStream, MockLLMClient, ToolCall};
    use crate::tools::{ToolOutput, ToolRegistry};
    use async_openai::error::OpenAIError;
    use async_openai::types::{ChatCompletionToolType, FunctionCall};
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::{Map, json};

    #[derive(Deserialize, JsonSchema)]
    struct AddArgs {
        by: i64,
    }

    struct Tally {
        total: i64,
        tools: Arc<ToolRegistry<Tally>>,
    }

    impl Tally {
        fn new() -> Self {
            let tools = ToolRegistry::new().register(
                "add",
                "Add to the tally.",
                |t: &mut Tally, args: AddArgs| {
                    Box::pin(async move {
                        t.total += args.by;
                        Ok(ToolOutput::Text(format!("Tally is {}. What next?", t.total)))
                    })
                },
            );
            Self {
                total: 0,
                tools: Arc::new(tools),
            }
        }
    }

    #[async_trait]
    impl Conversation for Tally {
        fn demo(&self) -> &'static str {
            "tally"
        }
        fn mode(&self) -> TurnMode {
            TurnMode::ToolCalling
        }
        fn instructions(&self) -> String {
            "Keep a tally.".into()
        }
        async fn opening(&mut self) -> CoreResult<String> {
            Ok("Ready to count.".into())
        }
        fn tools(&self) -> Vec<ToolDefinition> {
            self.tools.definitions()
        }
        async fn call_tool(&mut self, name: &str, args: Value) -> CoreResult<ToolOutput> {
            let tools = Arc::clone(&self.tools);
            tools.dispatch(self, name, args).await
        }
        fn meta(&self) -> Map<String, Value> {
            let mut meta = Map::new();
            meta.insert("total".into(), json!(self.total));
            meta
        }
        fn is_finished(&self) -> bool {
            self.total >= 10
        }
    }

    struct Echo;

    #[async_trait]
    impl Conversation for Echo {
        fn demo(&self) -> &'static str {
            "echo"
        }
        fn mode(&self) -> TurnMode {
            TurnMode::Scripted
        }
        fn instructions(&self) -> String {
            String::new()
        }
        async fn opening(&mut self) -> CoreResult<String> {
            Ok("Say something.".into())
        }
        async fn respond(&mut self, message: &str) -> CoreResult<String> {
            Ok(format!("You said {}.", message))
        }
    }

    fn add_call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: "add".into(),
                arguments: arguments.into(),
            },
        }
    }

    fn text_stream(chunks: &[&str]) -> LLMStream {
        let items: Vec<std::result::Result<LLMStreamEvent, OpenAIError>> = chunks
            .iter()
            .map(|c| Ok(LLMStreamEvent::TextChunk(c.to_string())))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_scripted_turn_needs_no_model() {
        let mut driver = ConversationDriver::new(None);
        let mut echo = Echo;

        let opening = driver.start(&mut echo).await.unwrap();
        assert!(matches!(opening, Command::SpeakText(ref t) if t == "Say something."));

        let reply = driver.turn(&mut echo, "hi").await.unwrap();
        assert!(matches!(reply, Command::SpeakText(ref t) if t == "You said hi."));
        assert_eq!(driver.usage().turns, 1);
        assert_eq!(driver.usage().llm_calls, 0);
    }

    #[tokio::test]
    async fn test_tool_calling_turn_runs_tools_then_streams() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .times(1)
            .returning(|_, _, tools| {
                assert_eq!(tools.len(), 1);
                Ok(LLMAction::ToolCall(vec![add_call(r#"{"by": 4}"#)]))
            });
        llm.expect_stream_after_tools()
            .times(1)
            .returning(|_, _| Ok(text_stream(&["Four ", "so far."])));

        let mut driver = ConversationDriver::new(Some(Arc::new(llm)));
        let mut tally = Tally::new();
        let reply = driver.turn(&mut tally, "add four").await.unwrap();

        assert!(matches!(reply, Command::SpeakText(ref t) if t == "Four so far."));
        assert_eq!(tally.total, 4);
        let usage = driver.usage();
        assert_eq!((usage.llm_calls, usage.tool_calls, usage.tool_errors), (2, 1, 0));
    }

    #[tokio::test]
    async fn test_empty_stream_falls_back_to_tool_sentence_and_completes() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .returning(|_, _, _| Ok(LLMAction::ToolCall(vec![add_call(r#"{"by": 12}"#)])));
        llm.expect_stream_after_tools()
            .returning(|_, _| Ok(text_stream(&[])));

        let mut driver = ConversationDriver::new(Some(Arc::new(llm)));
        let mut tally = Tally::new();
        let reply = driver.turn(&mut tally, "add twelve").await.unwrap();
        assert!(matches!(reply, Command::SessionComplete(ref t) if t == "Tally is 12. What next?"));
    }

    #[tokio::test]
    async fn test_bad_tool_arguments_are_reported_to_model() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .returning(|_, _, _| Ok(LLMAction::ToolCall(vec![add_call(r#"{"by": "lots"}"#)])));
        llm.expect_stream_after_tools()
            .returning(|_, _| Ok(text_stream(&["Sorry, how many?"])));

        let mut driver = ConversationDriver::new(Some(Arc::new(llm)));
        let mut tally = Tally::new();
        let reply = driver.turn(&mut tally, "add lots").await.unwrap();
        assert!(matches!(reply, Command::SpeakText(ref t) if t == "Sorry, how many?"));
        assert_eq!(tally.total, 0);
        assert_eq!(driver.usage().tool_errors, 1);
    }

    #[tokio::test]
    async fn test_tool_calling_without_model_is_an_error() {
        let mut driver = ConversationDriver::new(None);
        let mut tally = Tally::new();
        assert!(driver.turn(&mut tally, "add one").await.is_err());
    }

    #[tokio::test]
    async fn test_plain_text_decision_is_returned_verbatim() {
        let mut llm = MockLLMClient::new();
        llm.expect_decide_action()
            .returning(|_, _, _| Ok(LLMAction::TextResponse("Hello there.".into())));

        let mut driver = ConversationDriver::new(Some(Arc::new(llm)));
        let mut tally = Tally::new();
        driver.start(&mut tally).await.unwrap();
        let reply = driver.turn(&mut tally, "hi").await.unwrap();
        assert!(matches!(reply, Command::SpeakText(ref t) if t == "Hello there."));
        // opening, user, reply
        assert_eq!(driver.history_len(), 3);
        let summary = driver.finish(&mut tally).await.unwrap();
        assert_eq!(summary.turns, 1);
    }
}
