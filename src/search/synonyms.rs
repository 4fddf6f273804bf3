//! Dynamic synonym table / 动态近义词表
//!
//! Lines have the form `word => a, b, c`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::tokenizer::tokenize;
use crate::llm::TextTransformer;
use crate::models::FileMetadataRecord;

static WORD_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-_]+").unwrap());

/// Most frequent alphabetic words in file names / 文件名高频词
///
/// Names are lowercased and lose their extension before splitting. Only
/// purely alphabetic words longer than two characters count. Equal counts
/// are ordered alphabetically.
pub fn frequent_words(records: &[FileMetadataRecord], top_n: usize) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();

    for record in records {
        let name = record.file_name.to_lowercase();
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => name.as_str(),
        };
        for word in WORD_SEPARATOR.split(stem) {
            if word.chars().count() > 2 && word.chars().all(char::is_alphabetic) {
                *freq.entry(word.to_string()).or_default() += 1;
            }
        }
    }

    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.into_iter().take(top_n).map(|(word, _)| word).collect()
}

/// Ask the transformer for synonyms of every frequent word / 生成近义词表
pub async fn build_synonym_table(
    records: &[FileMetadataRecord],
    transformer: &dyn TextTransformer,
    top_n: usize,
) -> Vec<String> {
    let words = frequent_words(records, top_n);
    tracing::info!("Top {} frequent words: {:?}", top_n, words);

    let mut table = Vec::with_capacity(words.len());
    for word in words {
        match transformer.synonyms(&word).await {
            Ok(synonyms) => {
                tracing::debug!("Generated synonym: {} => {}", word, synonyms);
                table.push(format!("{} => {}", word, synonyms));
            }
            Err(e) => {
                tracing::error!("Failed to generate synonyms for '{}': {}", word, e);
                table.push(format!("{} => {}", word, word));
            }
        }
    }
    table
}

/// Parse table lines into word -> synonym tokens / 解析近义词表
///
/// Malformed lines are skipped. Synonyms are tokenized the same way indexed
/// text is, so multi-word entries still match.
pub fn parse_synonym_table(lines: &[String]) -> HashMap<String, Vec<String>> {
    let mut table: HashMap<String, Vec<String>> = HashMap::new();

    for line in lines {
        let Some((word, synonyms)) = line.split_once("=>") else {
            continue;
        };
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            continue;
        }

        let entry = table.entry(word.clone()).or_default();
        for synonym in synonyms.split(',') {
            for token in tokenize(synonym) {
                if token != word && !entry.contains(&token) {
                    entry.push(token);
                }
            }
        }
    }

    table.retain(|_, synonyms| !synonyms.is_empty());
    table
}
