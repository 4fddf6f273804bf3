//! Search module - only provides search capabilities (primitives), does not control flow / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - Search module only exposes primitive operations: index_records, search, set_synonyms
//! - The pipeline controls scanning, the API decides when to re-index
//! - Call direction: Core → Search (unidirectional) / 调用方向
//!
//! Index features / 索引特性：
//! - In-memory inverted index keyed by remote path
//! - Chinese segmentation through jieba, prefix and fuzzy matching for the rest
//! - Synonym expansion from a generated table

pub mod engine;
pub mod schema;
pub mod synonyms;
pub mod tokenizer;

pub use engine::SearchEngine;
pub use schema::{SearchHit, SearchOptions, SortField, SortOrder};

use crate::models::FileMetadataRecord;

/// Contract every document index honors / 索引接口
pub trait DocumentIndex: Send + Sync {
    /// Replace the whole document set, returns the indexed count / 替换全部文档
    fn index_records(&self, records: &[FileMetadataRecord]) -> usize;

    fn search(&self, options: &SearchOptions) -> Vec<SearchHit>;

    /// Install `word => a, b, c` synonym lines / 设置近义词
    fn set_synonyms(&self, table: &[String]);

    fn document_count(&self) -> usize;

    fn clear(&self);
}
