//! Remote directory walker / 远程目录遍历
//!
//! Depth-first, pre-order: the files of a directory come before the files of
//! its subdirectories, and each subdirectory is finished before its next
//! sibling starts. Uses an explicit stack instead of recursion.

use crate::models::EntryKind;
use crate::remote::RemoteSession;
use crate::state::{Counter, ScanState};
use crate::utils::{has_extension, join_remote_path, normalize_remote_path};

/// Walk result / 遍历结果
#[derive(Debug, Clone, Default)]
pub struct WalkReport {
    /// (directory, file name) in traversal order / 按遍历顺序
    pub files: Vec<(String, String)>,
    /// Directories that could not be entered or listed / 访问失败的目录
    pub failed_dirs: Vec<String>,
    pub cancelled: bool,
}

impl WalkReport {
    /// Every directory was listed and the walk ran to the end / 完整遍历
    pub fn is_complete(&self) -> bool {
        self.failed_dirs.is_empty() && !self.cancelled
    }

    /// Full remote paths of the files found / 完整路径
    pub fn paths(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|(dir, name)| join_remote_path(dir, name))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RemoteDirectoryWalker {
    extension: String,
}

impl RemoteDirectoryWalker {
    pub fn new(extension: impl Into<String>) -> Self {
        Self { extension: extension.into() }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Enumerate every matching file under `root` / 遍历根目录下的目标文件
    ///
    /// A directory that cannot be entered or listed is logged and skipped;
    /// its siblings are still walked.
    pub fn walk(&self, session: &mut dyn RemoteSession, root: &str, state: &ScanState) -> WalkReport {
        let mut report = WalkReport::default();
        let mut pending = vec![normalize_remote_path(root)];

        while let Some(dir) = pending.pop() {
            if state.is_cancelled() {
                tracing::info!("Walk cancelled before {}", dir);
                report.cancelled = true;
                break;
            }

            tracing::debug!("Scanning directory: {}", dir);
            let entries = match session.change_dir(&dir).and_then(|_| session.list(&dir)) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Error accessing {}: {}", dir, e);
                    report.failed_dirs.push(dir);
                    continue;
                }
            };
            state.add(Counter::Directories, 1);

            let mut subdirs = Vec::new();
            let mut found = 0u64;
            for entry in entries {
                if entry.name == "." || entry.name == ".." {
                    continue;
                }
                let child = join_remote_path(&dir, &entry.name);
                let is_dir = match entry.kind {
                    Some(EntryKind::Directory) => true,
                    Some(EntryKind::File) => false,
                    None => Self::try_enter(session, &dir, &child),
                };

                if is_dir {
                    subdirs.push(child);
                } else if has_extension(&entry.name, &self.extension) {
                    report.files.push((dir.clone(), entry.name));
                    found += 1;
                }
            }

            state.add(Counter::FilesFound, found);
            tracing::debug!("Found {} {} files in {}", found, self.extension, dir);

            // 逆序入栈，保证第一个子目录最先处理
            pending.extend(subdirs.into_iter().rev());
        }

        report
    }

    /// Untyped entry: it is a directory if we can change into it / 尝试进入以判断是否为目录
    ///
    /// A directory we are not allowed to enter is reported as a file.
    fn try_enter(session: &mut dyn RemoteSession, parent: &str, child: &str) -> bool {
        if session.change_dir(child).is_err() {
            return false;
        }
        if let Err(e) = session.change_dir(parent) {
            tracing::warn!("Could not return to {} after probing {}: {}", parent, child, e);
        }
        true
    }
}
