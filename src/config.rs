//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location / 配置文件路径环境变量
pub const CONFIG_ENV: &str = "WAVINDEX_CONFIG";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote FTP server / FTP 服务器配置
    pub ftp: FtpConfig,
    /// Crawl configuration / 扫描配置
    pub scan: ScanConfig,
    /// Metadata cache / 元数据缓存配置
    pub cache: CacheConfig,
    /// HTTP server / 服务器配置
    pub server: ServerConfig,
    /// Search configuration / 搜索配置
    pub search: SearchConfig,
    /// Language model service / 语言模型配置
    pub llm: LlmConfig,
}

/// FTP configuration / FTP 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpConfig {
    /// Server address, host:port / 服务器地址
    pub address: String,
    pub username: String,
    pub password: String,
    /// Connect timeout in seconds / 连接超时（秒）
    pub connect_timeout_secs: u64,
    /// Read/write timeout per command in seconds / 单条命令读写超时（秒）
    pub operation_timeout_secs: u64,
    /// Encoding of file names on the server, e.g. `utf-8` or `gbk` / 文件名编码
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Remote directory the crawl starts from / 扫描根路径
    pub root_path: String,
    /// Case-sensitive file name suffix / 目标扩展名（区分大小写）
    pub extension: String,
    /// Number of concurrent metadata workers / 并发数
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache file path / 缓存文件路径
    pub file: String,
    /// Drop cached entries not seen in a completed walk / 清理远端已删除的条目
    pub prune_missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default number of hits returned / 默认返回条数
    pub default_limit: usize,
    /// How many frequent file-name words get synonyms / 生成近义词的高频词数量
    pub synonym_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// Base URL of the chat service / 服务地址
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:21".to_string(),
            username: "anonymous".to_string(),
            password: String::new(),
            connect_timeout_secs: 5,
            operation_timeout_secs: 30,
            encoding: "utf-8".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: "/".to_string(),
            extension: ".wav".to_string(),
            workers: 10,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: "cache/audio_cache.json".to_string(),
            prune_missing: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            synonym_top_n: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2:1b".to_string(),
            timeout_secs: 10,
        }
    }
}

impl FtpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs.max(1))
    }
}

impl ScanConfig {
    /// Worker count, never zero / 并发数（至少为 1）
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

impl AppConfig {
    /// Get the cache file path / 获取缓存文件路径
    pub fn get_cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache.file)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
