//! Search query schema / 搜索查询定义

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::FileMetadataRecord;

/// Sort key for results / 排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Size,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Search hit / 搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: FileMetadataRecord,
    /// Relevance score / 相关性分数
    pub score: f32,
}

/// Search query options / 搜索查询选项
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Search keywords / 搜索关键词
    pub query: String,
    pub sort_by: SortField,
    pub order: SortOrder,
    /// Enable fuzzy search / 启用模糊搜索
    pub fuzzy: bool,
    /// Maximum number of results to return / 最大返回结果数
    pub limit: usize,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort_by: SortField::default(),
            order: SortOrder::default(),
            fuzzy: true,
            limit: 20,
        }
    }

    pub fn sorted(mut self, sort_by: SortField, order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn fuzzy(mut self, enabled: bool) -> Self {
        self.fuzzy = enabled;
        self
    }
}

/// Compare two records by the requested key / 按字段比较
///
/// Modification tokens are fixed-width digit strings, so string order is
/// time order. Ties fall back to the path to keep output stable.
pub fn compare_records(a: &FileMetadataRecord, b: &FileMetadataRecord, sort_by: SortField, order: SortOrder) -> Ordering {
    let primary = match sort_by {
        SortField::Size => a.size_bytes.cmp(&b.size_bytes),
        SortField::Modified => a.modified_at.cmp(&b.modified_at),
    };
    let primary = match order {
        SortOrder::Asc => primary,
        SortOrder::Desc => primary.reverse(),
    };
    primary.then_with(|| a.remote_path.cmp(&b.remote_path))
}
