//! Text transformation service / 文本转换服务
//!
//! Chinese phrase -> English keywords, word -> comma-separated synonyms.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

#[async_trait]
pub trait TextTransformer: Send + Sync {
    /// Translate a phrase into search keywords; returns the input on failure / 翻译为关键词
    async fn translate_to_keywords(&self, input: &str) -> String;

    /// Comma-separated English synonyms for one word / 获取近义词
    async fn synonyms(&self, word: &str) -> Result<String>;
}

/// Build the transformer selected by configuration / 按配置创建
pub fn from_config(config: &LlmConfig) -> Result<Box<dyn TextTransformer>> {
    if !config.enabled {
        tracing::info!("Language model disabled, queries are used as-is");
        return Ok(Box::new(Passthrough));
    }
    Ok(Box::new(OllamaClient::new(config)?))
}

/// Used when no language model is configured / 未启用语言模型时使用
pub struct Passthrough;

#[async_trait]
impl TextTransformer for Passthrough {
    async fn translate_to_keywords(&self, input: &str) -> String {
        input.to_string()
    }

    async fn synonyms(&self, word: &str) -> Result<String> {
        Ok(word.to_string())
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Ollama chat API client / Ollama 客户端
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("chat request failed: {}", response.status()));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed.message.content.trim().to_string();
        if content.is_empty() {
            return Err(anyhow!("empty response from model"));
        }
        Ok(content)
    }
}

#[async_trait]
impl TextTransformer for OllamaClient {
    async fn translate_to_keywords(&self, input: &str) -> String {
        let prompt = format!("将以下中文短语转换为适合搜索的英文关键词（简洁且相关）：{}", input);
        match self.chat(prompt).await {
            Ok(keywords) => {
                tracing::info!("Translated '{}' to '{}'", input, keywords);
                keywords
            }
            Err(e) => {
                tracing::error!("Failed to translate '{}': {}", input, e);
                input.to_string()
            }
        }
    }

    async fn synonyms(&self, word: &str) -> Result<String> {
        self.chat(format!("Provide synonyms for '{}' in English (comma-separated).", word)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough() {
        let transformer = from_config(&LlmConfig::default()).unwrap();
        assert_eq!(transformer.translate_to_keywords("风声").await, "风声");
        assert_eq!(transformer.synonyms("wind").await.unwrap(), "wind");
    }

    #[tokio::test]
    async fn test_unreachable_model_returns_input() {
        let config = LlmConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..LlmConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.translate_to_keywords("雨声").await, "雨声");
        assert!(client.synonyms("rain").await.is_err());
    }

    #[test]
    fn test_chat_response_shape() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"model":"m","message":{"role":"assistant","content":" wind, breeze \n"},"done":true}"#).unwrap();
        assert_eq!(parsed.message.content.trim(), "wind, breeze");
    }
}
