//! Chinese tokenizer - uses jieba-rs for Chinese word segmentation / 中文分词器
//!
//! Text is first split on anything that is not a letter or digit, so file
//! name separators (`_`, `-`, `.`, `/`) always break words. Segments holding
//! Chinese go through jieba, everything else is lowercased as-is.

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

/// Global jieba tokenizer instance / 全局 jieba 分词器实例
static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Tokenize text / 对文本进行分词
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for segment in text.split(|c: char| !c.is_alphanumeric()) {
        if segment.is_empty() {
            continue;
        }
        if contains_chinese(segment) {
            // Search engine mode, finer granularity / 搜索引擎模式
            for word in JIEBA.cut_for_search(segment, true) {
                let word = word.trim();
                if !word.is_empty() {
                    tokens.push(word.to_lowercase());
                }
            }
        } else {
            tokens.push(segment.to_lowercase());
        }
    }

    tokens
}

/// Tokenize search query, deduplicated in order / 对搜索查询进行分词
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Generate N-grams (for fuzzy matching) / 生成 N-gram
///
/// Example: "测试" -> ["测", "试", "测试"] / 例如
pub fn generate_ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut ngrams = Vec::new();

    for n in min_n..=max_n {
        if n == 0 || n > chars.len() {
            continue;
        }
        for window in chars.windows(n) {
            let ngram: String = window.iter().collect();
            if !ngram.trim().is_empty() {
                ngrams.push(ngram.to_lowercase());
            }
        }
    }

    ngrams
}

/// Check if text contains Chinese characters / 检测文本是否包含中文字符
pub fn contains_chinese(text: &str) -> bool {
    text.chars().any(|c| matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}'))
}
