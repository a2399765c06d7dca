//! REST models, documented for OpenAPI with `utoipa`.

use parley_core::tools::ToolDefinition;
use parley_demos::DemoKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct DemoInfo {
    #[schema(example = "game_master")]
    pub name: String,
    /// `scripted` or `tool_calling`.
    #[schema(example = "tool_calling")]
    pub mode: String,
    pub description: String,
}

impl From<DemoKind> for DemoInfo {
    fn from(kind: DemoKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            mode: kind.mode().as_str().to_string(),
            description: kind.description().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    /// JSON Schema of the tool arguments.
    #[schema(value_type = Object)]
    pub parameters: Value,
}

impl From<ToolDefinition> for ToolInfo {
    fn from(def: ToolDefinition) -> Self {
        Self {
            name: def.name,
            description: def.description,
            parameters: def.parameters,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
