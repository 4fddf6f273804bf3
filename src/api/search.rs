use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState};
use crate::models::FileMetadataRecord;
use crate::search::{SearchOptions, SortField, SortOrder};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Normal,
    /// Translate to English keywords first / 先翻译为英文关键词
    Chinese,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub translated_query: Option<String>,
    pub results: Vec<FileMetadataRecord>,
    pub total: usize,
}

/// POST /api/search
///
/// Falls back to a substring match over the cache while the index is empty.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Json<ApiResponse<SearchResponse>> {
    let query = req.query.trim();
    if query.is_empty() {
        return Json(ApiResponse::error("搜索关键词不能为空"));
    }

    let translated_query = match req.query_type {
        QueryType::Chinese => Some(state.transformer.translate_to_keywords(query).await),
        QueryType::Normal => None,
    };
    let search_query = translated_query.as_deref().unwrap_or(query);
    let size = req.size.unwrap_or(state.config.search.default_limit);

    let results: Vec<FileMetadataRecord> = if state.index.document_count() == 0 {
        tracing::debug!("Index empty, searching cached records for '{}'", search_query);
        state.pipeline.cache().local_search(search_query, size, req.sort_by, req.order)
    } else {
        let options = SearchOptions::new(search_query)
            .sorted(req.sort_by, req.order)
            .with_limit(size);
        state.index.search(&options).into_iter().map(|hit| hit.record).collect()
    };

    let total = results.len();
    Json(ApiResponse::success(SearchResponse {
        translated_query,
        results,
        total,
    }))
}
