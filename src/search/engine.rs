//! Search engine - in-memory full-text search implementation / 搜索引擎
//!
//! Architecture principle: only expose primitive operations, do not control flow / 架构原则
//! - index_records: replace the document set / 替换全部文档
//! - search: search / 搜索
//! - set_synonyms: install a synonym table / 设置近义词表
//! - clear: clear index / 清空索引

use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::schema::{compare_records, SearchHit, SearchOptions};
use super::synonyms::parse_synonym_table;
use super::tokenizer::{contains_chinese, generate_ngrams, tokenize, tokenize_query};
use super::DocumentIndex;
use crate::models::FileMetadataRecord;

/// File name hits weigh more than path hits / 文件名权重更高
const NAME_BOOST: f32 = 2.0;
const PATH_BOOST: f32 = 1.0;

/// Inverted index entry / 倒排索引条目
#[derive(Debug, Clone)]
struct PostingEntry {
    doc_id: String,
    score_boost: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub token_count: usize,
    pub last_updated: Option<i64>,
}

/// Search engine / 搜索引擎
///
/// Documents are keyed by remote path. Every query term must match a
/// document (directly, by prefix, fuzzily, or through a synonym) for the
/// document to be returned.
pub struct SearchEngine {
    /// Document storage: path -> record / 文档存储
    documents: RwLock<HashMap<String, FileMetadataRecord>>,
    /// Inverted index: token -> postings / 倒排索引
    inverted_index: RwLock<HashMap<String, Vec<PostingEntry>>>,
    /// N-gram index over Chinese file names / N-gram 索引
    ngram_index: RwLock<HashMap<String, HashSet<String>>>,
    /// word -> synonym tokens / 近义词
    synonyms: RwLock<HashMap<String, Vec<String>>>,
    stats: Mutex<IndexStats>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            inverted_index: RwLock::new(HashMap::new()),
            ngram_index: RwLock::new(HashMap::new()),
            synonyms: RwLock::new(HashMap::new()),
            stats: Mutex::new(IndexStats::default()),
        }
    }

    /// Get index statistics / 获取索引统计信息
    pub fn stats(&self) -> IndexStats {
        self.stats.lock().clone()
    }

    fn index_document(&self, record: &FileMetadataRecord) {
        let doc_id = record.remote_path.clone();

        {
            let mut index = self.inverted_index.write();
            for (tokens, boost) in [(tokenize(&record.file_name), NAME_BOOST), (tokenize(&record.remote_path), PATH_BOOST)] {
                for token in tokens {
                    index.entry(token).or_default().push(PostingEntry {
                        doc_id: doc_id.clone(),
                        score_boost: boost,
                    });
                }
            }
        }

        if contains_chinese(&record.file_name) {
            let mut ngram_idx = self.ngram_index.write();
            for ngram in generate_ngrams(&record.file_name, 1, 3) {
                ngram_idx.entry(ngram).or_default().insert(doc_id.clone());
            }
        }

        self.documents.write().insert(doc_id, record.clone());
    }

    /// Score every document matching one query term or its synonyms / 单个查询词打分
    fn score_term(&self, term: &str, fuzzy: bool) -> HashMap<String, f32> {
        let mut alternatives = vec![term.to_string()];
        if let Some(extra) = self.synonyms.read().get(term) {
            alternatives.extend(extra.iter().cloned());
        }

        let index = self.inverted_index.read();
        let mut scores: HashMap<String, f32> = HashMap::new();

        for alt in &alternatives {
            for (token, postings) in index.iter() {
                let weight = if token == alt {
                    1.0
                } else if token.starts_with(alt.as_str()) {
                    0.5
                } else if fuzzy && !contains_chinese(alt) && fuzzy_match(alt, token, auto_distance(alt)) {
                    0.3
                } else {
                    continue;
                };
                for posting in postings {
                    *scores.entry(posting.doc_id.clone()).or_default() += posting.score_boost * weight;
                }
            }

            if fuzzy && contains_chinese(alt) {
                let n = alt.chars().count().min(2);
                let ngram_idx = self.ngram_index.read();
                for ngram in generate_ngrams(alt, n, n) {
                    if let Some(doc_ids) = ngram_idx.get(&ngram) {
                        for doc_id in doc_ids {
                            *scores.entry(doc_id.clone()).or_default() += 0.3;
                        }
                    }
                }
            }
        }

        scores
    }
}

impl DocumentIndex for SearchEngine {
    fn index_records(&self, records: &[FileMetadataRecord]) -> usize {
        self.clear();
        for record in records {
            self.index_document(record);
        }

        let mut stats = self.stats.lock();
        stats.document_count = self.documents.read().len();
        stats.token_count = self.inverted_index.read().len();
        stats.last_updated = Some(chrono::Utc::now().timestamp());
        tracing::info!("Indexed {} audio files", stats.document_count);
        stats.document_count
    }

    fn search(&self, options: &SearchOptions) -> Vec<SearchHit> {
        let terms = tokenize_query(&options.query);
        if terms.is_empty() {
            return Vec::new();
        }

        // AND: a document has to match every term / 所有词都需匹配
        let mut matched: Option<HashMap<String, f32>> = None;
        for term in &terms {
            let term_scores = self.score_term(term, options.fuzzy);
            matched = Some(match matched {
                None => term_scores,
                Some(previous) => previous
                    .into_iter()
                    .filter_map(|(doc_id, score)| term_scores.get(&doc_id).map(|s| (doc_id, score + s)))
                    .collect(),
            });
        }

        let docs = self.documents.read();
        let mut results: Vec<SearchHit> = matched
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(doc_id, score)| {
                docs.get(&doc_id).map(|record| SearchHit {
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| compare_records(&a.record, &b.record, options.sort_by, options.order));
        results.truncate(options.limit);
        results
    }

    fn set_synonyms(&self, table: &[String]) {
        let parsed = parse_synonym_table(table);
        tracing::info!("Loaded {} synonym rules", parsed.len());
        *self.synonyms.write() = parsed;
    }

    fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    fn clear(&self) {
        self.documents.write().clear();
        self.inverted_index.write().clear();
        self.ngram_index.write().clear();
        *self.stats.lock() = IndexStats::default();
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Allowed edits by term length, like `fuzziness: AUTO` / 按长度决定编辑距离
fn auto_distance(term: &str) -> usize {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// 简单的编辑距离模糊匹配
fn fuzzy_match(s1: &str, s2: &str, max_distance: usize) -> bool {
    if s1 == s2 {
        return true;
    }
    if max_distance == 0 {
        return false;
    }

    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    // 长度差太大直接返回
    if len1.abs_diff(len2) > max_distance {
        return false;
    }

    levenshtein_distance(s1, s2) <= max_distance
}

/// 计算 Levenshtein 编辑距离
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    if s1_chars.is_empty() {
        return s2_chars.len();
    }
    if s2_chars.is_empty() {
        return s1_chars.len();
    }

    let mut prev: Vec<usize> = (0..=s2_chars.len()).collect();
    let mut curr = vec![0usize; s2_chars.len() + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[s2_chars.len()]
}
