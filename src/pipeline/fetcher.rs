use std::sync::Arc;

use crate::models::FileMetadataRecord;
use crate::remote::{RemoteSession, SessionFactory, SessionGuard};
use crate::utils::normalize_remote_path;

/// Retrieves size and modification time of one remote file / 获取单个文件元数据
///
/// Missing files are reported as `None`, never as an error.
#[derive(Clone)]
pub struct MetadataFetcher {
    factory: Arc<dyn SessionFactory>,
}

impl MetadataFetcher {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self { factory }
    }

    /// Fetch over a fresh session that is closed on every exit path / 使用独立会话获取
    pub fn fetch(&self, remote_path: &str) -> Option<FileMetadataRecord> {
        let session = match self.factory.connect() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to get metadata for {}: {}", remote_path, e);
                return None;
            }
        };
        let mut guard = SessionGuard::new(session);
        Self::fetch_with(guard.session(), remote_path)
    }

    /// Full fetch over a session owned by the caller / 使用已有会话获取
    pub fn fetch_with(session: &mut dyn RemoteSession, remote_path: &str) -> Option<FileMetadataRecord> {
        let path = normalize_remote_path(remote_path);

        let size = match session.size(&path) {
            Ok(Some(size)) => size,
            Ok(None) => {
                tracing::warn!("File not found via SIZE: {}", path);
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to get metadata for {}: {}", path, e);
                return None;
            }
        };

        let modified = Self::probe_modified(session, &path)?;
        Some(FileMetadataRecord::new(&path, size, modified))
    }

    /// Cheap probe: only the modification token / 仅查询修改时间
    pub fn probe_modified(session: &mut dyn RemoteSession, remote_path: &str) -> Option<String> {
        let path = normalize_remote_path(remote_path);
        match session.modified_at(&path) {
            Ok(token) => {
                let token = token.trim().to_string();
                if token.is_empty() {
                    tracing::warn!("Empty modification time for {}", path);
                    return None;
                }
                Some(token)
            }
            Err(e) => {
                tracing::warn!("Failed to get modification time for {}: {}", path, e);
                None
            }
        }
    }
}
