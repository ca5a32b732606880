use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Regular files directly under `dir` whose extension matches `extension`,
/// sorted by file name.
pub fn top_level_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("failed to read {}: {e}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Case-sensitive extension check, `extension` given without the dot.
#[must_use]
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

/// Final path segment of a URL, ignoring any query string or fragment.
pub fn file_name_from_url(url: &str) -> Result<String, String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid URL {url}: {e}"))?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(format!("cannot derive a file name from {url}"));
    }
    Ok(name.to_owned())
}

/// Effective pool size for a fan-out over `items` units of work.
///
/// `0` means one worker per item. Never zero so an empty fan-out still terminates.
#[must_use]
pub fn worker_limit(concurrency: usize, items: usize) -> usize {
    let limit = if concurrency == 0 {
        items
    } else {
        concurrency.min(items)
    };
    limit.max(1)
}
