use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INDEX_URL: &str = "https://chaos-data.projectdiscovery.io/index.json";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_WORK_DIR: &str = ".";
pub const DEFAULT_PORT: u16 = 1991;
pub const DEFAULT_CONCURRENCY: usize = 16;

pub const CACHE_FILE_NAME: &str = "input.json";
pub const SIDE_FILE_NAME: &str = "new.json";
pub const MERGED_FILE_NAME: &str = "tenebra.txt";

/// Runtime configuration resolved once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub index_url: String,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
    pub port: u16,
    pub concurrency: usize,
    pub request_timeout: Option<Duration>,
    pub dedup: bool,
    pub force: bool,
    pub serve: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_owned(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            port: DEFAULT_PORT,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: None,
            dedup: false,
            force: false,
            serve: true,
        }
    }
}

impl Settings {
    pub fn cache_path(&self) -> PathBuf {
        self.work_dir.join(CACHE_FILE_NAME)
    }

    pub fn side_path(&self) -> PathBuf {
        self.work_dir.join(SIDE_FILE_NAME)
    }

    pub fn merged_path(&self) -> PathBuf {
        self.work_dir.join(MERGED_FILE_NAME)
    }
}

/// Port from the `PORT` environment variable, falling back to [`DEFAULT_PORT`].
pub fn port_from_env() -> u16 {
    parse_port(env::var("PORT").ok().as_deref())
}

fn parse_port(value: Option<&str>) -> u16 {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Create the output directory if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_falls_back_to_default() {
        assert_eq!(parse_port(None), DEFAULT_PORT);
        assert_eq!(parse_port(Some("")), DEFAULT_PORT);
        assert_eq!(parse_port(Some("not-a-port")), DEFAULT_PORT);
        assert_eq!(parse_port(Some(" 8080 ")), 8080);
    }

    #[test]
    fn derives_files_from_work_dir() {
        let settings = Settings {
            work_dir: PathBuf::from("/srv/tenebra"),
            ..Default::default()
        };
        assert_eq!(settings.cache_path(), Path::new("/srv/tenebra/input.json"));
        assert_eq!(settings.side_path(), Path::new("/srv/tenebra/new.json"));
        assert_eq!(settings.merged_path(), Path::new("/srv/tenebra/tenebra.txt"));
    }
}
