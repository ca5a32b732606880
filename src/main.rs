use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

mod archive;
mod env;
mod index;
mod networking;
mod pipeline;
mod postprocess;
mod search;
#[cfg(test)]
mod testing;
mod util;

use crate::archive::ArchiveFetcher;
use crate::env::Settings;
use crate::index::IndexSynchronizer;
use crate::networking::NetworkClient;
use crate::postprocess::MergeOptions;
use crate::search::SearchCache;

#[derive(Parser, Debug)]
#[command(
    name = "tenebra",
    author,
    version,
    about = "Collects bug bounty scope archives into one searchable URL list"
)]
struct Cli {
    /// Remote JSON index listing the archives.
    #[arg(long, default_value = env::DEFAULT_INDEX_URL)]
    index_url: String,

    /// Directory the archives are downloaded and extracted into.
    #[arg(long, default_value = env::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Directory holding the manifest cache and the merged URL file.
    #[arg(long, default_value = env::DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Search API port. Defaults to $PORT, then 1991.
    #[arg(long)]
    port: Option<u16>,

    /// Maximum parallel downloads and file tasks; 0 runs one task per item.
    #[arg(long, default_value_t = env::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request HTTP timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Drop URLs repeated across archives when merging.
    #[arg(long)]
    dedup: bool,

    /// Run the pipeline even if the index is unchanged.
    #[arg(long)]
    force: bool,

    /// Exit after the pipeline instead of serving search.
    #[arg(long)]
    no_serve: bool,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            index_url: self.index_url,
            output_dir: self.output_dir,
            work_dir: self.work_dir,
            port: self.port.unwrap_or_else(env::port_from_env),
            concurrency: self.concurrency,
            request_timeout: self.timeout_secs.map(Duration::from_secs),
            dedup: self.dedup,
            force: self.force,
            serve: !self.no_serve,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = Cli::parse().into_settings();
    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), String> {
    let network = NetworkClient::new(settings.request_timeout);
    run_with(settings, network).await
}

/// Sync the index, refresh the output when it changed (or when forced), then
/// serve search. Only output-dir creation and index sync failures are fatal.
async fn run_with(settings: Settings, network: NetworkClient) -> Result<(), String> {
    env::ensure_output_dir(&settings.output_dir).map_err(|e| {
        format!(
            "error creating output folder {}: {e}",
            settings.output_dir.display()
        )
    })?;

    let synchronizer = IndexSynchronizer::new(
        network.clone(),
        settings.cache_path(),
        settings.side_path(),
    );
    let outcome = synchronizer
        .synchronize(&settings.index_url)
        .await
        .map_err(|e| format!("error fetching input JSON: {e}"))?;

    if outcome.changed || settings.force {
        let fetcher = ArchiveFetcher::new(network);
        let summary = pipeline::run(
            &fetcher,
            &outcome.entries,
            &settings.output_dir,
            settings.concurrency,
        )
        .await;
        if summary.succeeded == 0 && !outcome.entries.is_empty() {
            warn!("pipeline: no archive could be processed");
        }
        postprocess::finalize(
            &settings.output_dir,
            &settings.merged_path(),
            MergeOptions {
                dedup: settings.dedup,
                concurrency: settings.concurrency,
            },
        )
        .await;
        info!("pipeline: execution completed");
    } else {
        info!("pipeline: index unchanged, skipping downloads");
    }

    if !settings.serve {
        return Ok(());
    }

    let cache = match SearchCache::load(&settings.merged_path()).await {
        Ok(cache) => cache,
        Err(err) => {
            warn!("search: starting with an empty cache: {err}");
            SearchCache::new(Vec::new())
        }
    };
    search::serve(settings.port, Arc::new(cache)).await
}
