//! Explicit tool registry.
//!
//! A registry maps tool names to a parameter schema and a handler. Incoming
//! arguments are deserialized into the declared argument type before the
//! handler runs, so handlers only ever see well-typed input. Handlers get the
//! session object they operate on as `&mut S`; nothing is global.

use crate::error::{CoreError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tracing::info;

/// What a tool hands back to the driving model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A sentence, usually ending in the prompt for the next user action.
    Text(String),
    /// A small JSON-serializable object.
    Json(Value),
}

impl ToolOutput {
    pub fn text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

/// Arguments for tools that take none.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Public description of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput>> + Send + 'a>>;

type Handler<S> = Box<dyn for<'a> Fn(&'a mut S, Value) -> ToolFuture<'a> + Send + Sync>;

struct RegisteredTool<S> {
    definition: ToolDefinition,
    handler: Handler<S>,
}

/// Ordered set of tools operating on session type `S`.
pub struct ToolRegistry<S> {
    tools: Vec<RegisteredTool<S>>,
}

impl<S> Default for ToolRegistry<S> {
    fn default() -> Self {
        Self { tools: Vec::new() }
    }
}

impl<S: Send + 'static> ToolRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool whose arguments deserialize into `A`.
    pub fn register<A, F>(mut self, name: &str, description: &str, handler: F) -> Self
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        F: for<'a> Fn(&'a mut S, A) -> ToolFuture<'a> + Send + Sync + 'static,
    {
        let tool_name = name.to_string();
        let erased = erase(move |state: &mut S, raw: Value| {
            let args = match parse_args::<A>(&tool_name, raw) {
                Ok(args) => args,
                Err(e) => return Box::pin(std::future::ready(Err(e))),
            };
            handler(state, args)
        });
        self.tools.push(RegisteredTool {
            definition: ToolDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters: parameters_schema::<A>(),
            },
            handler: erased,
        });
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|t| t.definition.name.as_str())
            .collect()
    }

    /// Validates `args` and runs the named tool against `state`.
    pub async fn dispatch(&self, state: &mut S, name: &str, args: Value) -> Result<ToolOutput> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition.name == name)
            .ok_or_else(|| CoreError::UnknownTool(name.to_string()))?;
        info!(tool = %name, args = %args, "Executing tool");
        (tool.handler)(state, args).await
    }
}

fn erase<S, F>(f: F) -> Handler<S>
where
    F: for<'a> Fn(&'a mut S, Value) -> ToolFuture<'a> + Send + Sync + 'static,
{
    Box::new(f)
}

fn parse_args<A: DeserializeOwned>(tool: &str, raw: Value) -> Result<A> {
    let raw = match raw {
        Value::Null => Value::Object(Default::default()),
        obj @ Value::Object(_) => obj,
        other => {
            return Err(CoreError::InvalidArguments {
                tool: tool.to_string(),
                reason: format!("expected a JSON object, got {}", other),
            });
        }
    };
    serde_json::from_value(raw).map_err(|e| CoreError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn parameters_schema<A: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(A);
    match serde_json::to_value(&schema) {
        Ok(Value::Object(mut map)) => {
            map.remove("$schema");
            map.remove("title");
            map.entry("type").or_insert_with(|| Value::from("object"));
            Value::Object(map)
        }
        _ => serde_json::json!({ "type": "object" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        total: i64,
    }

    impl Counter {
        fn bump(&mut self, args: BumpArgs) -> Result<ToolOutput> {
            self.total += args.by;
            Ok(format!("Total is now {}. Anything else?", self.total).into())
        }
    }

    #[derive(Deserialize, JsonSchema)]
    struct BumpArgs {
        /// How much to add.
        by: i64,
    }

    fn registry() -> ToolRegistry<Counter> {
        ToolRegistry::new()
            .register("bump", "Add to the counter.", |c: &mut Counter, args: BumpArgs| {
                Box::pin(async move { c.bump(args) })
            })
            .register("peek", "Read the counter.", |c: &mut Counter, _: NoArgs| {
                Box::pin(async move { Ok(ToolOutput::Json(json!({ "total": c.total }))) })
            })
    }

    #[tokio::test]
    async fn test_dispatch_runs_typed_handler() {
        let tools = registry();
        let mut counter = Counter::default();

        let out = tools
            .dispatch(&mut counter, "bump", json!({ "by": 3 }))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::Text("Total is now 3. Anything else?".into()));

        let out = tools.dispatch(&mut counter, "peek", Value::Null).await.unwrap();
        assert_eq!(out.text(), r#"{"total":3}"#);
    }

    #[tokio::test]
    async fn test_mistyped_arguments_never_reach_handler() {
        let tools = registry();
        let mut counter = Counter::default();

        let err = tools
            .dispatch(&mut counter, "bump", json!({ "by": "three" }))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArguments { ref tool, .. } if tool == "bump"));

        let err = tools
            .dispatch(&mut counter, "bump", json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArguments { .. }));
        assert_eq!(counter.total, 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = registry();
        let mut counter = Counter::default();
        let err = tools
            .dispatch(&mut counter, "reset", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownTool(name) if name == "reset"));
    }

    #[test]
    fn test_definitions_carry_schema() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].name, "bump");
        assert_eq!(defs[0].parameters["type"], "object");
        assert!(defs[0].parameters["properties"]["by"].is_object());
        assert_eq!(registry().names(), vec!["bump", "peek"]);
    }
}
