//! In-memory remote tree for tests / 测试用内存远程目录树

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{RemoteSession, SessionFactory};
use crate::error::RemoteError;
use crate::models::{EntryKind, RemoteEntry};
use crate::state::ScanState;
use crate::utils::{basename, normalize_remote_path};

#[derive(Default)]
struct Tree {
    /// directory -> child names in listing order
    children: HashMap<String, Vec<String>>,
    files: HashMap<String, (Option<u64>, String)>,
    inaccessible: HashSet<String>,
    offline: bool,
    typed_listing: bool,
    /// Delay added to every SIZE and MDTM call
    latency: Option<Duration>,
    /// Cancel the scan when this many more connects have happened
    cancel_trigger: Option<(Arc<ScanState>, usize)>,
}

#[derive(Default)]
pub(crate) struct Calls {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub lists: AtomicUsize,
    pub sizes: AtomicUsize,
    pub modified: AtomicUsize,
    /// Sessions currently open / 当前打开的会话数
    pub open: AtomicUsize,
    pub peak_open: AtomicUsize,
}

#[derive(Clone)]
pub(crate) struct MemoryRemote {
    tree: Arc<Mutex<Tree>>,
    pub calls: Arc<Calls>,
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => path[..pos].to_string(),
    }
}

/// Registers `path` and any missing ancestors, parents first
fn add_dir_locked(tree: &mut Tree, path: &str) {
    if path == "/" || tree.children.contains_key(path) {
        return;
    }
    let parent = parent_of(path);
    add_dir_locked(tree, &parent);
    tree.children.insert(path.to_string(), Vec::new());
    tree.children.entry(parent).or_default().push(basename(path).to_string());
}

impl MemoryRemote {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.children.insert("/".to_string(), Vec::new());
        Self {
            tree: Arc::new(Mutex::new(tree)),
            calls: Arc::new(Calls::default()),
        }
    }

    /// Listings carry entry kinds (like a parsed LIST) / 列表带类型
    pub fn typed(self) -> Self {
        self.tree.lock().typed_listing = true;
        self
    }

    pub fn dir(self, path: &str) -> Self {
        self.add_dir(&normalize_remote_path(path));
        self
    }

    pub fn file(self, path: &str, size: u64, modified: &str) -> Self {
        self.put_file(path, Some(size), modified);
        self
    }

    /// A listed file whose SIZE query reports nothing / SIZE 无结果的文件
    pub fn sizeless_file(self, path: &str, modified: &str) -> Self {
        self.put_file(path, None, modified);
        self
    }

    /// Listed in its parent but cannot be entered or listed / 无权限目录
    pub fn inaccessible_dir(self, path: &str) -> Self {
        let path = normalize_remote_path(path);
        self.add_dir(&path);
        self.tree.lock().inaccessible.insert(path);
        self
    }

    pub fn set_modified(&self, path: &str, modified: &str) {
        if let Some(file) = self.tree.lock().files.get_mut(path) {
            file.1 = modified.to_string();
        }
    }

    pub fn remove_file(&self, path: &str) {
        let mut tree = self.tree.lock();
        tree.files.remove(path);
        let parent = parent_of(path);
        let name = basename(path).to_string();
        if let Some(children) = tree.children.get_mut(&parent) {
            children.retain(|child| *child != name);
        }
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.tree.lock().latency = Some(latency);
        self
    }

    /// Call `state.cancel()` on the `nth` connect from now / 第 n 次连接时取消扫描
    pub fn cancel_on_connect(&self, state: Arc<ScanState>, nth: usize) {
        self.tree.lock().cancel_trigger = Some((state, nth));
    }

    pub fn set_offline(&self, offline: bool) {
        self.tree.lock().offline = offline;
    }

    pub fn size_calls(&self) -> usize {
        self.calls.sizes.load(Ordering::SeqCst)
    }

    fn add_dir(&self, path: &str) {
        add_dir_locked(&mut self.tree.lock(), path);
    }

    fn put_file(&self, path: &str, size: Option<u64>, modified: &str) {
        let path = normalize_remote_path(path);
        let parent = parent_of(&path);
        let mut tree = self.tree.lock();
        add_dir_locked(&mut tree, &parent);
        tree.children.entry(parent).or_default().push(basename(&path).to_string());
        tree.files.insert(path, (size, modified.to_string()));
    }
}

impl SessionFactory for MemoryRemote {
    fn connect(&self) -> Result<Box<dyn RemoteSession>, RemoteError> {
        {
            let mut tree = self.tree.lock();
            if tree.offline {
                return Err(RemoteError::Connect {
                    address: "memory".to_string(),
                    message: "server offline".to_string(),
                });
            }
            if let Some((state, remaining)) = tree.cancel_trigger.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    state.cancel();
                    tree.cancel_trigger = None;
                }
            }
        }
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        let open = self.calls.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.peak_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(MemorySession { remote: self.clone() }))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

struct MemorySession {
    remote: MemoryRemote,
}

impl MemorySession {
    fn delay(&self) {
        let latency = self.remote.tree.lock().latency;
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
    }

    fn denied(command: &str, path: &str) -> RemoteError {
        RemoteError::Command {
            command: format!("{} {}", command, path),
            message: "550 Permission denied".to_string(),
        }
    }
}

impl RemoteSession for MemorySession {
    fn change_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        let path = normalize_remote_path(path);
        let tree = self.remote.tree.lock();
        if tree.inaccessible.contains(&path) || !tree.children.contains_key(&path) {
            return Err(Self::denied("CWD", &path));
        }
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.remote.calls.lists.fetch_add(1, Ordering::SeqCst);
        let path = normalize_remote_path(path);
        let tree = self.remote.tree.lock();
        if tree.inaccessible.contains(&path) {
            return Err(Self::denied("LIST", &path));
        }
        let children = tree.children.get(&path).ok_or_else(|| Self::denied("LIST", &path))?;
        Ok(children
            .iter()
            .map(|name| {
                if !tree.typed_listing {
                    return RemoteEntry::untyped(name.clone());
                }
                let child = crate::utils::join_remote_path(&path, name);
                let kind = if tree.children.contains_key(&child) {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                RemoteEntry::typed(name.clone(), kind)
            })
            .collect())
    }

    fn size(&mut self, path: &str) -> Result<Option<u64>, RemoteError> {
        self.remote.calls.sizes.fetch_add(1, Ordering::SeqCst);
        self.delay();
        let tree = self.remote.tree.lock();
        Ok(tree.files.get(path).and_then(|(size, _)| *size))
    }

    fn modified_at(&mut self, path: &str) -> Result<String, RemoteError> {
        self.remote.calls.modified.fetch_add(1, Ordering::SeqCst);
        self.delay();
        let tree = self.remote.tree.lock();
        tree.files
            .get(path)
            .map(|(_, modified)| modified.clone())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    fn close(&mut self) {
        self.remote.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.remote.calls.open.fetch_sub(1, Ordering::SeqCst);
    }
}
