//! Metadata pipeline / 元数据处理流水线
//!
//! walker -> fetcher -> cache, driven by the parallel processor. The pipeline
//! adds the single-run guard and the offline fallback on top.

pub mod cache;
pub mod fetcher;
pub mod processor;
pub mod walker;

use std::sync::Arc;

pub use cache::{Decision, ReconciliationCache};
pub use fetcher::MetadataFetcher;
pub use processor::{ParallelProcessor, RunSummary};
pub use walker::{RemoteDirectoryWalker, WalkReport};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::models::FileMetadataRecord;
use crate::remote::SessionFactory;
use crate::state::ScanState;

/// Result of one pipeline run / 处理结果
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub records: Vec<FileMetadataRecord>,
    /// Records came from the cache because the run failed / 来自缓存的降级结果
    pub degraded: bool,
    /// Stopped on request; records cover only the processed part / 扫描被中止
    pub cancelled: bool,
}

pub struct Pipeline {
    processor: ParallelProcessor,
    root: String,
    state: Arc<ScanState>,
}

impl Pipeline {
    pub fn new(config: &AppConfig, factory: Arc<dyn SessionFactory>, state: Arc<ScanState>) -> Self {
        let cache = Arc::new(ReconciliationCache::load(config.get_cache_path()));
        let processor = ParallelProcessor::new(
            factory,
            RemoteDirectoryWalker::new(config.scan.extension.clone()),
            cache,
            state.clone(),
            config.scan.worker_count(),
        )
        .prune_missing(config.cache.prune_missing);

        Self {
            processor,
            root: config.scan.root_path.clone(),
            state,
        }
    }

    pub fn cache(&self) -> &Arc<ReconciliationCache> {
        self.processor.cache()
    }

    pub fn state(&self) -> &Arc<ScanState> {
        &self.state
    }

    /// Run once, falling back to the cached records on failure / 处理文件
    ///
    /// Only a concurrent run is reported as an error. A stopped run is not
    /// marked done.
    pub async fn process_files(&self) -> Result<ProcessOutcome, PipelineError> {
        if !self.state.try_start() {
            return Err(PipelineError::AlreadyRunning);
        }

        match self.processor.run(&self.root).await {
            Ok(RunSummary { records, cancelled: true }) => {
                tracing::info!("Scan stopped after {} files", records.len());
                self.state.finish_cancelled();
                Ok(ProcessOutcome {
                    records,
                    degraded: false,
                    cancelled: true,
                })
            }
            Ok(RunSummary { records, cancelled: false }) => {
                self.state.finish(false, None);
                Ok(ProcessOutcome {
                    records,
                    degraded: false,
                    cancelled: false,
                })
            }
            Err(e) => {
                tracing::warn!("Remote scan failed, using cached data: {}", e);
                let records = self.cache().records();
                if records.is_empty() {
                    tracing::error!("No cached data available");
                } else {
                    tracing::info!("Loaded {} files from cache", records.len());
                }
                self.state.finish(true, Some(e.to_string()));
                Ok(ProcessOutcome {
                    records,
                    degraded: true,
                    cancelled: false,
                })
            }
        }
    }
}
