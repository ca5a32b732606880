use std::path::Path;

use futures_util::StreamExt;
use futures_util::stream;
use log::{error, info};

use crate::archive::ArchiveFetcher;
use crate::index::ManifestEntry;
use crate::util::worker_limit;

/// Outcome counts of one fetch fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Fetch and extract every entry into `output_dir`.
///
/// At most `concurrency` downloads are in flight at once; `0` starts one per
/// entry. Failures are logged and counted, never propagated.
pub async fn run(
    fetcher: &ArchiveFetcher,
    entries: &[ManifestEntry],
    output_dir: &Path,
    concurrency: usize,
) -> RunSummary {
    let limit = worker_limit(concurrency, entries.len());
    info!(
        "pipeline: fetching {} archives with {} workers",
        entries.len(),
        limit
    );

    let results: Vec<bool> = stream::iter(entries)
        .map(|entry| async move {
            match fetcher.fetch_and_extract(&entry.url, output_dir).await {
                Ok(_) => true,
                Err(err) => {
                    error!("pipeline: error processing {} ({}): {err}", entry.name, entry.url);
                    false
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    let succeeded = results.iter().filter(|ok| **ok).count();
    let summary = RunSummary {
        succeeded,
        failed: results.len() - succeeded,
    };
    info!(
        "pipeline: {} archives processed, {} failed",
        summary.succeeded, summary.failed
    );
    summary
}
