pub mod scan;
pub mod search;
pub mod server;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::llm::TextTransformer;
use crate::pipeline::Pipeline;
use crate::search::DocumentIndex;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            code: 400,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Shared handler state / 应用状态
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    pub index: Arc<dyn DocumentIndex>,
    pub transformer: Box<dyn TextTransformer>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(server::health_check))
        .route("/api/search", post(search::search))
        .route("/api/scan/status", get(scan::get_scan_status))
        .route("/api/scan/rescan", post(scan::rescan))
        .route("/api/scan/stop", post(scan::stop_scan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
