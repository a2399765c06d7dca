//! Axum Router Configuration
//!
//! REST listing, the WebSocket endpoint and the Swagger UI.

use crate::{
    handlers,
    models::{DemoInfo, ErrorResponse, ToolInfo},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::list_demos, handlers::list_tools),
    components(schemas(DemoInfo, ToolInfo, ErrorResponse)),
    tags(
        (name = "Parley API", description = "Conversational demo agents")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/demos", get(handlers::list_demos))
        .route("/demos/{demo}/tools", get(handlers::list_tools))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
