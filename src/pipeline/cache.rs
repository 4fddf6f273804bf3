use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::CacheError;
use crate::models::FileMetadataRecord;
use crate::search::{SortField, SortOrder};
use crate::search::schema::compare_records;

/// Outcome of comparing a fresh timestamp with the cached one / 缓存判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Cached record is still valid / 复用缓存
    Reuse(FileMetadataRecord),
    /// Full metadata must be fetched again / 需要重新获取
    Refetch,
}

/// File-backed path -> record cache / 元数据缓存
///
/// Reads may run concurrently, writes are serialized by the lock. The file
/// is a single JSON object keyed by remote path.
pub struct ReconciliationCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, FileMetadataRecord>>,
}

impl ReconciliationCache {
    /// Load from disk; a missing or unreadable file gives an empty cache / 加载缓存
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, FileMetadataRecord>>(&content) {
                Ok(entries) => {
                    tracing::info!("Loaded {} cached records from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    tracing::error!("Failed to load cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache file at {}", path.display());
                HashMap::new()
            }
            Err(e) => {
                tracing::error!("Failed to load cache {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reuse only when the path is cached with the same timestamp / 判定是否复用
    pub fn decide(&self, remote_path: &str, fresh_modified_at: &str) -> Decision {
        match self.entries.read().get(remote_path) {
            Some(record) if record.modified_at == fresh_modified_at => {
                tracing::debug!("Cache hit: {}", remote_path);
                Decision::Reuse(record.clone())
            }
            Some(_) => {
                tracing::debug!("Cache stale: {}", remote_path);
                Decision::Refetch
            }
            None => {
                tracing::debug!("Cache miss: {}", remote_path);
                Decision::Refetch
            }
        }
    }

    /// Insert or replace the entry under the record's path / 写入缓存
    pub fn put(&self, record: FileMetadataRecord) {
        self.entries.write().insert(record.remote_path.clone(), record);
    }

    pub fn get(&self, remote_path: &str) -> Option<FileMetadataRecord> {
        self.entries.read().get(remote_path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Every cached record, ordered by path / 全部缓存记录
    pub fn records(&self) -> Vec<FileMetadataRecord> {
        let mut records: Vec<FileMetadataRecord> = self.entries.read().values().cloned().collect();
        records.sort_by(|a, b| a.remote_path.cmp(&b.remote_path));
        records
    }

    /// Drop entries whose path is not in `seen`, returns how many went / 清理失效条目
    pub fn retain_paths(&self, seen: &HashSet<String>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|path, _| seen.contains(path));
        before - entries.len()
    }

    /// Write the snapshot atomically next to the target file / 原子写入
    pub fn persist(&self) -> Result<(), CacheError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        // Stable key order keeps the file diffable
        let snapshot: BTreeMap<String, FileMetadataRecord> =
            self.entries.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        serde_json::to_writer(&mut tmp, &snapshot)?;
        tmp.flush()?;
        tmp.persist(&self.path)?;

        tracing::info!("Saved {} records to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    /// Case-insensitive substring search over cached names and paths / 离线搜索
    pub fn local_search(&self, query: &str, size: usize, sort_by: SortField, order: SortOrder) -> Vec<FileMetadataRecord> {
        let entries = self.entries.read();
        if entries.is_empty() {
            tracing::warn!("No cached data for local search");
            return Vec::new();
        }

        let query = query.to_lowercase();
        let mut results: Vec<FileMetadataRecord> = entries
            .values()
            .filter(|r| r.file_name.to_lowercase().contains(&query) || r.remote_path.to_lowercase().contains(&query))
            .cloned()
            .collect();

        results.sort_by(|a, b| compare_records(a, b, sort_by, order));
        results.truncate(size);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn x_wav() -> FileMetadataRecord {
        FileMetadataRecord::new("/a/x.wav", 100, "20240101000000")
    }

    #[test]
    fn test_persist_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/cache/audio_cache.json");

        let cache = ReconciliationCache::load(&path);
        assert!(cache.is_empty());
        cache.put(x_wav());
        cache.put(FileMetadataRecord::new("/a/b/y.wav", 200, "20240102000000"));
        cache.persist().unwrap();

        let reloaded = ReconciliationCache::load(&path);
        assert_eq!(reloaded.records(), cache.records());

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["/a/x.wav"]["ftp_path"], "/a/x.wav");
        assert_eq!(raw["/a/x.wav"]["size"], 100);
        assert_eq!(raw["/a/x.wav"]["modified"], "20240101000000");
        assert_eq!(raw["/a/x.wav"]["file_name"], "x.wav");
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audio_cache.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = ReconciliationCache::load(&path);
        assert!(cache.is_empty());

        // Persist still replaces the broken file
        cache.put(x_wav());
        cache.persist().unwrap();
        assert_eq!(ReconciliationCache::load(&path).len(), 1);
    }

    #[test]
    fn test_decide() {
        let dir = tempdir().unwrap();
        let cache = ReconciliationCache::load(dir.path().join("c.json"));
        assert_eq!(cache.decide("/a/x.wav", "20240101000000"), Decision::Refetch);

        cache.put(x_wav());
        assert_eq!(cache.decide("/a/x.wav", "20240101000000"), Decision::Reuse(x_wav()));
        assert_eq!(cache.decide("/a/x.wav", "20240103000000"), Decision::Refetch);
    }

    #[test]
    fn test_put_replaces_under_same_key() {
        let dir = tempdir().unwrap();
        let cache = ReconciliationCache::load(dir.path().join("c.json"));
        cache.put(x_wav());
        cache.put(FileMetadataRecord::new("/a/x.wav", 150, "20240103000000"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/a/x.wav").unwrap().size_bytes, 150);
    }

    #[test]
    fn test_retain_paths() {
        let dir = tempdir().unwrap();
        let cache = ReconciliationCache::load(dir.path().join("c.json"));
        cache.put(x_wav());
        cache.put(FileMetadataRecord::new("/gone.wav", 1, "1"));

        let seen: HashSet<String> = ["/a/x.wav".to_string()].into_iter().collect();
        assert_eq!(cache.retain_paths(&seen), 1);
        assert_eq!(cache.records(), vec![x_wav()]);
    }

    #[test]
    fn test_local_search() {
        let dir = tempdir().unwrap();
        let cache = ReconciliationCache::load(dir.path().join("c.json"));
        assert!(cache.local_search("wind", 20, SortField::Size, SortOrder::Asc).is_empty());

        cache.put(FileMetadataRecord::new("/sfx/Wind_Forest.wav", 300, "20240101000000"));
        cache.put(FileMetadataRecord::new("/wind/gust.wav", 100, "20240103000000"));
        cache.put(FileMetadataRecord::new("/sfx/rain.wav", 200, "20240102000000"));

        let hits = cache.local_search("WIND", 20, SortField::Size, SortOrder::Desc);
        let paths: Vec<&str> = hits.iter().map(|r| r.remote_path.as_str()).collect();
        assert_eq!(paths, vec!["/sfx/Wind_Forest.wav", "/wind/gust.wav"]);

        let hits = cache.local_search("", 1, SortField::Modified, SortOrder::Asc);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].remote_path, "/sfx/Wind_Forest.wav");
    }
}
