use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Scan progress snapshot / 扫描进度
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    pub is_running: bool,
    pub is_done: bool,
    pub directories_scanned: u64,
    pub files_found: u64,
    pub reused: u64,
    pub fetched: u64,
    pub dropped: u64,
    /// Last run served cached data because the server was unreachable / 离线回退
    pub degraded: bool,
    /// Last run was stopped before it finished / 扫描被中止
    pub cancelled: bool,
    pub error: Option<String>,
    pub last_done_time: Option<i64>,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            is_running: false,
            is_done: false,
            directories_scanned: 0,
            files_found: 0,
            reused: 0,
            fetched: 0,
            dropped: 0,
            degraded: false,
            cancelled: false,
            error: None,
            last_done_time: None,
        }
    }
}

/// Counter selector for [`ScanState::add`] / 计数器
#[derive(Debug, Clone, Copy)]
pub enum Counter {
    Directories,
    FilesFound,
    Reused,
    Fetched,
    Dropped,
}

/// Scan state management / 扫描状态管理
///
/// Shared by the walker, the workers and the HTTP status endpoint.
pub struct ScanState {
    running: AtomicBool,
    cancel_flag: AtomicBool,
    directories: AtomicU64,
    files_found: AtomicU64,
    reused: AtomicU64,
    fetched: AtomicU64,
    dropped: AtomicU64,
    progress: RwLock<ScanProgress>,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel_flag: AtomicBool::new(false),
            directories: AtomicU64::new(0),
            files_found: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            fetched: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            progress: RwLock::new(ScanProgress::default()),
        }
    }

    /// Mark a run as started; false if one is already running / 开始扫描
    pub fn try_start(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.cancel_flag.store(false, Ordering::SeqCst);
        for counter in [&self.directories, &self.files_found, &self.reused, &self.fetched, &self.dropped] {
            counter.store(0, Ordering::SeqCst);
        }
        let mut progress = self.progress.write();
        let last_done_time = progress.last_done_time;
        *progress = ScanProgress {
            is_running: true,
            last_done_time,
            ..ScanProgress::default()
        };
        true
    }

    pub fn add(&self, counter: Counter, n: u64) {
        let cell = match counter {
            Counter::Directories => &self.directories,
            Counter::FilesFound => &self.files_found,
            Counter::Reused => &self.reused,
            Counter::Fetched => &self.fetched,
            Counter::Dropped => &self.dropped,
        };
        cell.fetch_add(n, Ordering::SeqCst);
    }

    pub fn finish(&self, degraded: bool, error: Option<String>) {
        self.running.store(false, Ordering::SeqCst);
        let mut progress = self.progress.write();
        progress.is_running = false;
        progress.is_done = error.is_none();
        progress.degraded = degraded;
        progress.error = error;
        progress.last_done_time = Some(chrono::Utc::now().timestamp());
    }

    /// Run stopped on request; not a clean finish / 扫描已中止
    pub fn finish_cancelled(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut progress = self.progress.write();
        progress.is_running = false;
        progress.is_done = false;
        progress.cancelled = true;
        progress.degraded = false;
        progress.error = None;
        progress.last_done_time = Some(chrono::Utc::now().timestamp());
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn get_progress(&self) -> ScanProgress {
        let mut progress = self.progress.read().clone();
        progress.directories_scanned = self.directories.load(Ordering::SeqCst);
        progress.files_found = self.files_found.load(Ordering::SeqCst);
        progress.reused = self.reused.load(Ordering::SeqCst);
        progress.fetched = self.fetched.load(Ordering::SeqCst);
        progress.dropped = self.dropped.load(Ordering::SeqCst);
        progress
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}
