//! Axum Handlers for the REST API
//!
//! Read-only endpoints describing the hosted demos. Each handler carries
//! `utoipa` doc comments for the generated OpenAPI document.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use parley_demos::{DemoKind, tool_definitions};

use crate::models::{DemoInfo, ErrorResponse, ToolInfo};

pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
        }
    }
}

/// List every demo the server can host.
#[utoipa::path(
    get,
    path = "/demos",
    responses(
        (status = 200, description = "Available demos", body = [DemoInfo])
    )
)]
pub async fn list_demos() -> Json<Vec<DemoInfo>> {
    Json(DemoKind::all().into_iter().map(DemoInfo::from).collect())
}

/// List the tools a demo exposes to the model. Scripted demos expose none.
#[utoipa::path(
    get,
    path = "/demos/{demo}/tools",
    responses(
        (status = 200, description = "Tools of the demo", body = [ToolInfo]),
        (status = 404, description = "Unknown demo", body = ErrorResponse)
    ),
    params(
        ("demo" = String, Path, description = "Demo name, e.g. `grocery`")
    )
)]
pub async fn list_tools(Path(demo): Path<String>) -> Result<Json<Vec<ToolInfo>>, ApiError> {
    let kind = demo.parse::<DemoKind>().map_err(ApiError::NotFound)?;
    Ok(Json(
        tool_definitions(kind).into_iter().map(ToolInfo::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_demos() {
        let Json(demos) = list_demos().await;
        assert_eq!(demos.len(), 8);
        assert_eq!(demos[0].name, "fraud");
        assert!(demos.iter().any(|d| d.name == "wellness" && d.mode == "scripted"));
    }

    #[tokio::test]
    async fn test_list_tools_for_tool_calling_demo() {
        let Ok(Json(tools)) = list_tools(Path("grocery".to_string())).await else {
            panic!("grocery tools should be listed");
        };
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"add_to_cart"));
        assert!(names.contains(&"place_order"));
        assert_eq!(tools[0].parameters["type"], "object");
    }

    #[tokio::test]
    async fn test_list_tools_for_scripted_demo_is_empty() {
        let Ok(Json(tools)) = list_tools(Path("coffee".to_string())).await else {
            panic!("coffee should be listed");
        };
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_list_tools_unknown_demo() {
        let result = list_tools(Path("karaoke".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(msg)) if msg.contains("karaoke")));
    }
}
