//! Error types / 错误类型
//!
//! Only connection loss at the root is a pipeline failure. Subtree and item
//! failures are absorbed where they happen and never show up here.

use thiserror::Error;

/// Errors raised by a remote session / 远程会话错误
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Could not reach or log in to the server / 无法连接或登录
    #[error("connect to {address} failed: {message}")]
    Connect { address: String, message: String },

    /// A command did not complete in time / 命令超时
    #[error("remote operation timed out: {0}")]
    Timeout(String),

    /// The server rejected a command / 服务器拒绝命令
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// The path does not exist on the server / 路径不存在
    #[error("not found: {0}")]
    NotFound(String),

    /// A name cannot be carried in the server's encoding / 文件名编码错误
    #[error("name encoding error: {0}")]
    Encoding(String),
}

/// Pipeline-level failures / 流水线级错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The root connection could not be established / 根连接失败
    #[error("remote server unavailable: {0}")]
    Connection(#[source] RemoteError),

    /// A run is already in progress / 已有扫描在运行
    #[error("a scan is already running")]
    AlreadyRunning,

    /// A blocking worker did not complete / 工作线程异常退出
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Cache persistence errors / 缓存读写错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
}
