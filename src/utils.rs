/// Remote path utility functions / 远程路径工具函数

/// Normalize a remote path / 规范化远程路径
/// 1. Trim surrounding whitespace / 去除首尾空白
/// 2. Collapse runs of / into one / 合并重复的 /
/// 3. Drop a trailing / except for the root / 去除末尾的 /
pub fn normalize_remote_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.trim().chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Join a directory and an entry name with a single separator / 拼接路径
pub fn join_remote_path(dir: &str, name: &str) -> String {
    normalize_remote_path(&format!("{}/{}", dir, name))
}

/// Last path segment / 获取文件名
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Exact, case-sensitive suffix check / 扩展名匹配（区分大小写）
pub fn has_extension(name: &str, extension: &str) -> bool {
    !extension.is_empty() && name.ends_with(extension)
}
