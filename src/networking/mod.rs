use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const USER_AGENT: &str = concat!("tenebra/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client used for both the manifest and the archives.
#[derive(Clone, Debug)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|err| {
            warn!("network client: falling back to default HTTP client configuration ({err})");
            Client::new()
        });
        Self::from_client(client)
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T>(&self, url: &str) -> Result<T, String>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("failed to fetch JSON from {url}: {status}"));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body from {url}: {e}"))?;
        serde_json::from_slice(&body)
            .map_err(|e| format!("failed to decode JSON from {url}: {e}"))
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    pub async fn download_to_path(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("download request for {url} failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("failed to download {url}: {status}"));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create download dir: {e}"))?;
        }
        let mut file = File::create(dest)
            .await
            .map_err(|e| format!("failed to create {}: {e}", dest.display()))?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error for {url}: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("write error for {}: {e}", dest.display()))?;
            downloaded += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| format!("flush error for {}: {e}", dest.display()))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(format!(
                "download incomplete: received {} of {} bytes",
                downloaded, total
            ));
        }
        debug!("download: {} bytes from {url}", downloaded);
        Ok(downloaded)
    }
}
