use serde::{Deserialize, Serialize};

use crate::utils::{basename, normalize_remote_path};

/// One remote audio file / 远程音频文件元数据
///
/// Serialized with the field names the cache file and the search index use:
/// `file_name`, `ftp_path`, `size`, `modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub file_name: String,
    #[serde(rename = "ftp_path")]
    pub remote_path: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Server-native timestamp token, compared for equality only / 服务器时间戳，仅做相等比较
    #[serde(rename = "modified")]
    pub modified_at: String,
}

impl FileMetadataRecord {
    /// Build a record, deriving the file name from the normalized path / 构造记录
    pub fn new(remote_path: &str, size_bytes: u64, modified_at: impl Into<String>) -> Self {
        let remote_path = normalize_remote_path(remote_path);
        Self {
            file_name: basename(&remote_path).to_string(),
            remote_path,
            size_bytes,
            modified_at: modified_at.into(),
        }
    }
}

/// Entry kind as reported by a listing / 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One name from a directory listing / 目录列表条目
///
/// `kind` is `None` when the listing protocol gave no type information and
/// the walker has to classify the entry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: Option<EntryKind>,
}

impl RemoteEntry {
    pub fn typed(name: impl Into<String>, kind: EntryKind) -> Self {
        Self { name: name.into(), kind: Some(kind) }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: None }
    }
}
