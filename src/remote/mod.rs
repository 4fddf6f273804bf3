//! Remote file server access / 远程文件服务器访问
//!
//! A session is stateful (it has a current directory), so it is never shared
//! between workers. Every worker asks the factory for its own session.

pub mod codec;
pub mod ftp;

#[cfg(test)]
pub(crate) mod memory;

use crate::error::RemoteError;
use crate::models::RemoteEntry;

pub use codec::NameCodec;
pub use ftp::{FtpSession, FtpSessionFactory};

/// One authenticated connection to the file server / 远程会话
///
/// All calls block the calling thread.
pub trait RemoteSession: Send {
    /// Change the current directory; fails when the path cannot be entered / 切换目录
    fn change_dir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// List the entries of a directory in server order / 列出目录
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Size in bytes, `None` when the server reports no size / 文件大小
    fn size(&mut self, path: &str) -> Result<Option<u64>, RemoteError>;

    /// Last-modified token as reported by the server / 修改时间
    fn modified_at(&mut self, path: &str) -> Result<String, RemoteError>;

    /// Close the session. Errors are ignored by callers / 关闭会话
    fn close(&mut self);
}

/// Opens new remote sessions / 会话工厂
pub trait SessionFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError>;

    /// Human readable target, for logs / 目标地址
    fn describe(&self) -> String;
}

/// Closes the wrapped session when dropped / 自动关闭会话
pub struct SessionGuard {
    session: Box<dyn RemoteSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn RemoteSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn RemoteSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}
