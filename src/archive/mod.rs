use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use zip::read::ZipArchive;

use crate::networking::NetworkClient;
use crate::util::file_name_from_url;

/// Downloads a single archive and unpacks it next to itself.
#[derive(Clone, Debug)]
pub struct ArchiveFetcher {
    network: NetworkClient,
}

impl ArchiveFetcher {
    pub fn new(network: NetworkClient) -> Self {
        Self { network }
    }

    /// Download `url` into `output_dir` and extract it there.
    ///
    /// The archive file itself is left in place and its path is returned.
    pub async fn fetch_and_extract(
        &self,
        url: &str,
        output_dir: &Path,
    ) -> Result<PathBuf, String> {
        let file_name = file_name_from_url(url)?;
        let archive_path = output_dir.join(&file_name);
        debug!("fetch: downloading {url} to {}", archive_path.display());
        self.network.download_to_path(url, &archive_path).await?;

        let source = archive_path.clone();
        let dest = output_dir.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_zip(&source, &dest))
            .await
            .map_err(|e| format!("extraction task for {file_name} failed: {e}"))??;

        info!("fetch: extracted {file_name} ({extracted} files)");
        Ok(archive_path)
    }
}

/// Extract every entry of the zip at `archive_path` under `dest`.
///
/// Returns the number of files written. The first entry that cannot be
/// written, or whose name escapes `dest`, aborts the extraction.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, String> {
    let file = fs::File::open(archive_path)
        .map_err(|e| format!("zip open error for {}: {e}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("zip parse error for {}: {e}", archive_path.display()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        let out_path = resolve_entry_path(dest, entry.name())?;
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| format!("zip dir create error: {e}"))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("zip parent dir error: {e}"))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .map_err(|e| format!("zip create file error for {}: {e}", out_path.display()))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| format!("zip write error for {}: {e}", out_path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// Join a stored entry name onto `dest`, refusing anything that resolves
/// outside of it.
fn resolve_entry_path(dest: &Path, name: &str) -> Result<PathBuf, String> {
    let illegal = || format!("illegal file path: {name}");
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(illegal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(illegal()),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(illegal());
    }
    Ok(dest.join(relative))
}
