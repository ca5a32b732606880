use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use futures_util::stream;
use log::{debug, error, info, warn};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::util::{top_level_files, worker_limit};

const WILDCARD_MARKER: char = '*';

#[derive(Clone, Copy, Debug)]
pub struct MergeOptions {
    /// Drop lines already contributed by an earlier file.
    pub dedup: bool,
    /// Files stat'ed or read at once; `0` means one task per file.
    pub concurrency: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            dedup: false,
            concurrency: crate::env::DEFAULT_CONCURRENCY,
        }
    }
}

/// What each post-processing step achieved; `None` marks a failed step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub archives_removed: Option<usize>,
    pub empty_removed: Option<usize>,
    pub merged_lines: Option<usize>,
}

/// Remove archives, drop empty text files, then merge the rest into `merged_path`.
///
/// Each step runs even if the previous one failed.
pub async fn finalize(
    output_dir: &Path,
    merged_path: &Path,
    options: MergeOptions,
) -> FinalizeReport {
    let archives_removed = remove_archives(output_dir)
        .await
        .inspect_err(|err| error!("postprocess: error removing .zip files: {err}"))
        .ok();
    let empty_removed = remove_empty_files(output_dir, options.concurrency)
        .await
        .inspect_err(|err| error!("postprocess: error removing empty .txt files: {err}"))
        .ok();
    let merged_lines = merge_files(output_dir, merged_path, options)
        .await
        .inspect_err(|err| error!("postprocess: error merging URL files: {err}"))
        .ok();

    let report = FinalizeReport {
        archives_removed,
        empty_removed,
        merged_lines,
    };
    info!(
        "postprocess: archives removed={:?} empty removed={:?} merged lines={:?}",
        report.archives_removed, report.empty_removed, report.merged_lines
    );
    report
}

/// Delete every `.zip` directly under `dir`. Stops at the first failure.
pub async fn remove_archives(dir: &Path) -> Result<usize, String> {
    let mut removed = 0;
    for path in top_level_files(dir, "zip")? {
        fs::remove_file(&path)
            .await
            .map_err(|e| format!("failed to remove {}: {e}", path.display()))?;
        info!("postprocess: removed {}", path.display());
        removed += 1;
    }
    Ok(removed)
}

/// Delete every zero-byte `.txt` directly under `dir`.
///
/// Per-file failures are logged and skipped.
pub async fn remove_empty_files(dir: &Path, concurrency: usize) -> Result<usize, String> {
    let files = top_level_files(dir, "txt")?;
    let limit = worker_limit(concurrency, files.len());

    let removed: Vec<bool> = stream::iter(files)
        .map(|path| async move {
            match fs::metadata(&path).await {
                Ok(meta) if meta.len() == 0 => match fs::remove_file(&path).await {
                    Ok(()) => {
                        info!("postprocess: removed empty {}", path.display());
                        true
                    }
                    Err(err) => {
                        error!("postprocess: failed to remove {}: {err}", path.display());
                        false
                    }
                },
                Ok(_) => false,
                Err(err) => {
                    error!("postprocess: failed to stat {}: {err}", path.display());
                    false
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    Ok(removed.into_iter().filter(|removed| *removed).count())
}

/// Merge the filtered lines of every `.txt` directly under `dir` into
/// `merged_path`, returning the number of lines written.
///
/// Files are read concurrently but combined in file-name order. A file that
/// cannot be read is logged and contributes nothing.
pub async fn merge_files(
    dir: &Path,
    merged_path: &Path,
    options: MergeOptions,
) -> Result<usize, String> {
    let files = merge_inputs(dir, merged_path)?;
    let limit = worker_limit(options.concurrency, files.len());

    let per_file: Vec<Vec<String>> = stream::iter(files)
        .map(|path| async move {
            match read_filtered_lines(&path).await {
                Ok(lines) => {
                    debug!("postprocess: {} lines from {}", lines.len(), path.display());
                    lines
                }
                Err(err) => {
                    error!("postprocess: {err}");
                    Vec::new()
                }
            }
        })
        .buffered(limit)
        .collect()
        .await;

    let lines = combine(per_file, options.dedup);
    write_lines(merged_path, &lines).await?;
    info!(
        "postprocess: merged {} lines into {}",
        lines.len(),
        merged_path.display()
    );
    Ok(lines.len())
}

fn merge_inputs(dir: &Path, merged_path: &Path) -> Result<Vec<PathBuf>, String> {
    let mut files = top_level_files(dir, "txt")?;
    if let Ok(merged) = std::fs::canonicalize(merged_path) {
        files.retain(|path| {
            std::fs::canonicalize(path)
                .ok()
                .is_none_or(|path| path != merged)
        });
    }
    Ok(files)
}

/// Lines are split on raw bytes, so a stray non-UTF-8 byte only affects the
/// line it sits on; that line is decoded lossily.
async fn read_filtered_lines(path: &Path) -> Result<Vec<String>, String> {
    let file = fs::File::open(path)
        .await
        .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let mut segments = BufReader::new(file).split(b'\n');
    let mut kept = Vec::new();
    while let Some(raw) = segments
        .next_segment()
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?
    {
        let line = String::from_utf8_lossy(&raw);
        if matches!(line, Cow::Owned(_)) {
            warn!("postprocess: invalid UTF-8 in {}: {line}", path.display());
        }
        if let Some(line) = keep_line(&line) {
            kept.push(line.to_owned());
        }
    }
    Ok(kept)
}

/// Blank lines and wildcard-prefixed lines carry no usable URL and are dropped.
fn keep_line(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(WILDCARD_MARKER) {
        None
    } else {
        Some(line)
    }
}

fn combine(per_file: Vec<Vec<String>>, dedup: bool) -> Vec<String> {
    let lines = per_file.into_iter().flatten();
    if !dedup {
        return lines.collect();
    }
    let mut seen = HashSet::new();
    lines.filter(|line| seen.insert(line.clone())).collect()
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<(), String> {
    let file = fs::File::create(path)
        .await
        .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| format!("failed to flush {}: {e}", path.display()))
}
