use std::sync::Arc;

use axum::{extract::State, Json};

use super::{ApiResponse, AppState};
use crate::error::PipelineError;
use crate::models::FileMetadataRecord;
use crate::pipeline::ProcessOutcome;
use crate::search::synonyms::build_synonym_table;
use crate::state::ScanProgress;

/// Process files, rebuild synonyms and re-index / 扫描并重建索引
///
/// A stopped scan leaves the current index alone. With nothing indexed yet it
/// indexes the whole cache, which holds every record fetched so far.
pub async fn refresh_index(state: &AppState) -> Result<ProcessOutcome, PipelineError> {
    let outcome = state.pipeline.process_files().await?;

    if outcome.cancelled {
        if state.index.document_count() > 0 {
            tracing::info!("Scan stopped, keeping {} indexed files", state.index.document_count());
            return Ok(outcome);
        }
        let cached = state.pipeline.cache().records();
        tracing::info!("Scan stopped, indexing {} cached records", cached.len());
        rebuild(state, &cached).await;
        return Ok(outcome);
    }

    if outcome.degraded {
        tracing::warn!("Indexing {} cached records, remote server unavailable", outcome.records.len());
    }
    rebuild(state, &outcome.records).await;
    Ok(outcome)
}

async fn rebuild(state: &AppState, records: &[FileMetadataRecord]) {
    let table = build_synonym_table(records, state.transformer.as_ref(), state.config.search.synonym_top_n).await;
    state.index.set_synonyms(&table);
    state.index.index_records(records);
}

/// GET /api/scan/status
pub async fn get_scan_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ScanProgress>> {
    Json(ApiResponse::success(state.pipeline.state().get_progress()))
}

/// POST /api/scan/rescan - 后台重新扫描
pub async fn rescan(State(state): State<Arc<AppState>>) -> Json<ApiResponse<()>> {
    if state.pipeline.state().is_running() {
        return Json(ApiResponse::error("扫描正在进行中"));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        match refresh_index(&task_state).await {
            Ok(outcome) => tracing::info!("Rescan finished with {} records", outcome.records.len()),
            Err(e) => tracing::warn!("Rescan not started: {}", e),
        }
    });

    Json(ApiResponse::success(()))
}

/// POST /api/scan/stop
pub async fn stop_scan(State(state): State<Arc<AppState>>) -> Json<ApiResponse<()>> {
    if !state.pipeline.state().is_running() {
        return Json(ApiResponse::error("没有正在运行的扫描任务"));
    }

    state.pipeline.state().cancel();
    tracing::info!("Scan stop requested");
    Json(ApiResponse::success(()))
}
