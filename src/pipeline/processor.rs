//! Parallel metadata processor / 并行元数据处理
//!
//! One sequential walk over a root session, then a bounded fan-out where every
//! file gets its own session on a blocking thread.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use super::cache::{Decision, ReconciliationCache};
use super::fetcher::MetadataFetcher;
use super::walker::{RemoteDirectoryWalker, WalkReport};
use crate::error::{PipelineError, RemoteError};
use crate::models::FileMetadataRecord;
use crate::remote::{SessionFactory, SessionGuard};
use crate::state::{Counter, ScanState};

/// Records of one run / 单次处理结果
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub records: Vec<FileMetadataRecord>,
    /// The walk or some files were skipped after a stop request / 被中止
    pub cancelled: bool,
}

enum Item {
    Record(FileMetadataRecord),
    Dropped,
    Skipped,
}

pub struct ParallelProcessor {
    factory: Arc<dyn SessionFactory>,
    walker: RemoteDirectoryWalker,
    cache: Arc<ReconciliationCache>,
    state: Arc<ScanState>,
    workers: usize,
    prune_missing: bool,
}

impl ParallelProcessor {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        walker: RemoteDirectoryWalker,
        cache: Arc<ReconciliationCache>,
        state: Arc<ScanState>,
        workers: usize,
    ) -> Self {
        Self {
            factory,
            walker,
            cache,
            state,
            workers: workers.max(1),
            prune_missing: false,
        }
    }

    /// Remove cache entries not seen by a complete walk / 清理远程已删除的条目
    pub fn prune_missing(mut self, enabled: bool) -> Self {
        self.prune_missing = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<ReconciliationCache> {
        &self.cache
    }

    /// Walk, reconcile every file against the cache, persist / 执行一次完整处理
    ///
    /// Only a failed root connection is an error. Result order follows worker
    /// completion, not the walk.
    pub async fn run(&self, root: &str) -> Result<RunSummary, PipelineError> {
        let report = self.walk(root).await?;
        let paths = report.paths();
        tracing::info!("Total {} files found: {}", self.walker.extension(), paths.len());

        let outcomes: Vec<_> = stream::iter(paths.iter().cloned())
            .map(|path| {
                let factory = self.factory.clone();
                let cache = self.cache.clone();
                let state = self.state.clone();
                tokio::task::spawn_blocking(move || process_one(factory.as_ref(), &cache, &state, &path))
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut records = Vec::with_capacity(outcomes.len());
        let mut skipped = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(Item::Record(record)) => records.push(record),
                Ok(Item::Dropped) => {}
                Ok(Item::Skipped) => skipped += 1,
                Err(e) => {
                    tracing::warn!("Metadata worker failed: {}", e);
                    self.state.add(Counter::Dropped, 1);
                }
            }
        }

        let cancelled = report.cancelled || skipped > 0;
        if cancelled {
            tracing::info!("Scan cancelled, {} files not processed", skipped);
        }

        if self.prune_missing && report.is_complete() {
            let seen: HashSet<String> = paths.into_iter().collect();
            let removed = self.cache.retain_paths(&seen);
            if removed > 0 {
                tracing::info!("Pruned {} cache entries missing on the server", removed);
            }
        }

        if let Err(e) = self.cache.persist() {
            tracing::error!("Failed to save cache: {}", e);
        }

        tracing::info!("Processed {} of {} files", records.len(), report.files.len());
        Ok(RunSummary { records, cancelled })
    }

    async fn walk(&self, root: &str) -> Result<WalkReport, PipelineError> {
        let factory = self.factory.clone();
        let walker = self.walker.clone();
        let state = self.state.clone();
        let root = root.to_string();

        let walked = tokio::task::spawn_blocking(move || -> Result<WalkReport, RemoteError> {
            let session = factory.connect()?;
            let mut guard = SessionGuard::new(session);
            Ok(walker.walk(guard.session(), &root, &state))
        })
        .await?;

        walked.map_err(PipelineError::Connection)
    }
}

/// Reconcile one file / 处理单个文件
fn process_one(factory: &dyn SessionFactory, cache: &ReconciliationCache, state: &ScanState, remote_path: &str) -> Item {
    if state.is_cancelled() {
        return Item::Skipped;
    }

    let session = match factory.connect() {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Error processing {}: {}", remote_path, e);
            state.add(Counter::Dropped, 1);
            return Item::Dropped;
        }
    };
    let mut guard = SessionGuard::new(session);

    let Some(modified) = MetadataFetcher::probe_modified(guard.session(), remote_path) else {
        state.add(Counter::Dropped, 1);
        return Item::Dropped;
    };

    match cache.decide(remote_path, &modified) {
        Decision::Reuse(record) => {
            state.add(Counter::Reused, 1);
            Item::Record(record)
        }
        Decision::Refetch => match MetadataFetcher::fetch_with(guard.session(), remote_path) {
            Some(record) => {
                cache.put(record.clone());
                state.add(Counter::Fetched, 1);
                Item::Record(record)
            }
            None => {
                state.add(Counter::Dropped, 1);
                Item::Dropped
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::tempdir;

    fn scenario() -> MemoryRemote {
        MemoryRemote::new()
            .file("/a/x.wav", 100, "20240101000000")
            .file("/a/b/y.wav", 200, "20240102000000")
            .inaccessible_dir("/c")
    }

    fn processor(remote: &MemoryRemote, cache_path: &Path) -> ParallelProcessor {
        ParallelProcessor::new(
            Arc::new(remote.clone()),
            RemoteDirectoryWalker::new(".wav"),
            Arc::new(ReconciliationCache::load(cache_path)),
            Arc::new(ScanState::new()),
            4,
        )
    }

    fn sorted(mut records: Vec<FileMetadataRecord>) -> Vec<FileMetadataRecord> {
        records.sort_by(|a, b| a.remote_path.cmp(&b.remote_path));
        records
    }

    #[tokio::test]
    async fn test_first_run_then_changed_timestamp() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("cache/audio_cache.json");
        let remote = scenario();

        let first = sorted(processor(&remote, &cache_path).run("/").await.unwrap().records);
        assert_eq!(
            first,
            vec![
                FileMetadataRecord::new("/a/b/y.wav", 200, "20240102000000"),
                FileMetadataRecord::new("/a/x.wav", 100, "20240101000000"),
            ]
        );
        assert_eq!(ReconciliationCache::load(&cache_path).len(), 2);
        assert_eq!(remote.size_calls(), 2);

        remote.set_modified("/a/x.wav", "20240103000000");
        let second_processor = processor(&remote, &cache_path);
        let second = sorted(second_processor.run("/").await.unwrap().records);

        assert_eq!(second.len(), 2);
        assert_eq!(second[1], FileMetadataRecord::new("/a/x.wav", 100, "20240103000000"));
        assert_eq!(second[0], first[0]);
        // Only x.wav was fetched again
        assert_eq!(remote.size_calls(), 3);
        let progress = second_processor.state.get_progress();
        assert_eq!(progress.reused, 1);
        assert_eq!(progress.fetched, 1);

        let on_disk = ReconciliationCache::load(&cache_path);
        assert_eq!(on_disk.get("/a/x.wav").unwrap().modified_at, "20240103000000");
    }

    #[tokio::test]
    async fn test_unchanged_second_run_reuses_everything() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("audio_cache.json");
        let remote = scenario();

        let first = sorted(processor(&remote, &cache_path).run("/").await.unwrap().records);
        let calls_after_first = remote.size_calls();

        let second = sorted(processor(&remote, &cache_path).run("/").await.unwrap().records);
        assert_eq!(first, second);
        assert_eq!(remote.size_calls(), calls_after_first);
    }

    #[tokio::test]
    async fn test_missing_items_are_dropped() {
        let dir = tempdir().unwrap();
        let remote = MemoryRemote::new()
            .file("/ok.wav", 1, "1")
            .sizeless_file("/vanished.wav", "20240101000000")
            .inaccessible_dir("/locked.wav");
        let processor = processor(&remote, &dir.path().join("c.json"));

        let records = processor.run("/").await.unwrap().records;
        assert_eq!(records, vec![FileMetadataRecord::new("/ok.wav", 1, "1")]);
        assert_eq!(processor.state.get_progress().dropped, 2);
        assert_eq!(processor.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_every_session_is_closed() {
        let dir = tempdir().unwrap();
        let remote = scenario();
        processor(&remote, &dir.path().join("c.json")).run("/").await.unwrap();

        let connects = remote.calls.connects.load(Ordering::SeqCst);
        assert_eq!(connects, 3);
        assert_eq!(remote.calls.closes.load(Ordering::SeqCst), connects);
    }

    #[tokio::test]
    async fn test_offline_root_is_connection_error() {
        let dir = tempdir().unwrap();
        let remote = scenario();
        remote.set_offline(true);

        let result = processor(&remote, &dir.path().join("c.json")).run("/").await;
        assert!(matches!(result, Err(PipelineError::Connection(_))));
    }

    #[tokio::test]
    async fn test_prune_only_after_complete_walk() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("c.json");
        let remote = MemoryRemote::new().file("/a.wav", 1, "1").file("/b.wav", 2, "1");
        processor(&remote, &cache_path).run("/").await.unwrap();

        remote.remove_file("/b.wav");
        let kept = processor(&remote, &cache_path);
        kept.run("/").await.unwrap();
        assert_eq!(kept.cache().len(), 2);

        let pruning = processor(&remote, &cache_path).prune_missing(true);
        pruning.run("/").await.unwrap();
        assert_eq!(pruning.cache().len(), 1);
        assert_eq!(ReconciliationCache::load(&cache_path).len(), 1);

        // A failed subtree makes the walk incomplete, nothing is pruned
        let partial = MemoryRemote::new().file("/a.wav", 1, "1").inaccessible_dir("/sub");
        let partial = partial.typed();
        let guarded = processor(&partial, &dir.path().join("c.json")).prune_missing(true);
        guarded.cache().put(FileMetadataRecord::new("/sub/old.wav", 9, "1"));
        guarded.run("/").await.unwrap();
        assert!(guarded.cache().get("/sub/old.wav").is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_still_persists() {
        let dir = tempdir().unwrap();
        let cache_path = dir.path().join("c.json");
        let remote = scenario();
        let processor = processor(&remote, &cache_path);
        processor.state.cancel();

        let summary = processor.run("/").await.unwrap();
        assert!(summary.records.is_empty());
        assert!(summary.cancelled);
        assert!(cache_path.exists());
    }

    #[tokio::test]
    async fn test_cancel_during_fan_out_is_reported() {
        let dir = tempdir().unwrap();
        let mut remote = MemoryRemote::new();
        for i in 0..10 {
            remote = remote.file(&format!("/f{:02}.wav", i), i, "1");
        }
        let processor = ParallelProcessor::new(
            Arc::new(remote.clone()),
            RemoteDirectoryWalker::new(".wav"),
            Arc::new(ReconciliationCache::load(dir.path().join("c.json"))),
            Arc::new(ScanState::new()),
            1,
        );
        // walk session, then two workers, then stop
        remote.cancel_on_connect(processor.state.clone(), 3);

        let summary = processor.run("/").await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(processor.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_pool_is_bounded() {
        let dir = tempdir().unwrap();
        let mut remote = MemoryRemote::new().with_latency(Duration::from_millis(2));
        for i in 0..50 {
            remote = remote.file(&format!("/d{}/f{:02}.wav", i % 5, i), i, "20240101000000");
        }
        let processor = ParallelProcessor::new(
            Arc::new(remote.clone()),
            RemoteDirectoryWalker::new(".wav"),
            Arc::new(ReconciliationCache::load(dir.path().join("c.json"))),
            Arc::new(ScanState::new()),
            3,
        );

        let summary = processor.run("/").await.unwrap();
        assert!(!summary.cancelled);
        assert_eq!(summary.records.len(), 50);
        assert_eq!(processor.cache().len(), 50);
        assert!(remote.calls.peak_open.load(Ordering::SeqCst) <= 3);
        assert_eq!(remote.calls.open.load(Ordering::SeqCst), 0);
        assert_eq!(remote.size_calls(), 50);
    }
}
