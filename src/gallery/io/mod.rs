use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::trace;
use serde::Deserialize;
use thiserror::Error;

use crate::gallery::sender::{DEFAULT_BASE_URL, DEFAULT_TAG_INPUT_NAME, GalleryEndpoint, SenderConfig};

pub(crate) mod directory;
pub(crate) mod movie_list;

/// Name of the configuration file looked up in the working directory.
pub(crate) const CONFIG_NAME: &str = "gallery_downloader.toml";

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

pub(crate) type ConfigResult<T> = Result<T, ConfigError>;

/// What to do with a gallery whose archive downloaded fine but would not unpack.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ExtractionFailurePolicy {
    /// Report the gallery as failed.
    #[default]
    Fail,
    /// Log the error and report success, the archive is on disk.
    Keep,
}

/// Settings read from `gallery_downloader.toml`, every key optional.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct Config {
    /// Root directory each gallery folder is created under.
    #[serde(default = "default_output_directory")]
    pub(crate) output_directory: PathBuf,
    /// Unpack archives after downloading them.
    #[serde(default)]
    pub(crate) extract: bool,
    /// Number of download workers, `0` means one per CPU.
    #[serde(default)]
    pub(crate) workers: usize,
    #[serde(default = "default_base_url")]
    pub(crate) base_url: String,
    #[serde(default = "default_tag_input_name")]
    pub(crate) tag_input_name: String,
    #[serde(default = "default_request_timeout_secs")]
    pub(crate) request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub(crate) connect_timeout_secs: u64,
    #[serde(default)]
    pub(crate) extraction_failure: ExtractionFailurePolicy,
    /// File the full debug log is appended to.
    #[serde(default = "default_log_file")]
    pub(crate) log_file: PathBuf,
    /// Level shown on the terminal (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub(crate) log_level: String,
}

fn default_output_directory() -> PathBuf { PathBuf::from("output") }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_tag_input_name() -> String { DEFAULT_TAG_INPUT_NAME.to_string() }
fn default_request_timeout_secs() -> u64 { 300 }
fn default_connect_timeout_secs() -> u64 { 30 }
fn default_log_file() -> PathBuf { PathBuf::from("log/download.log") }
fn default_log_level() -> String { String::from("info") }

impl Config {
    /// Loads the config.
    ///
    /// An explicitly named file must exist. Without one, `gallery_downloader.toml` in the working
    /// directory is used when present and the defaults otherwise.
    pub(crate) fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) if !path.exists() => Err(ConfigError::NotFound(path.display().to_string())),
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_NAME).exists() => Self::from_file(Path::new(CONFIG_NAME)),
            None => {
                trace!("{}: does not exist, using defaults", CONFIG_NAME);
                Ok(Config::default())
            }
        }
    }

    fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        trace!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Worker count with `0` resolved to the number of CPUs.
    pub(crate) fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    pub(crate) fn endpoint(&self) -> GalleryEndpoint {
        GalleryEndpoint::new(&self.base_url, &self.tag_input_name)
    }

    pub(crate) fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..SenderConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output_directory: default_output_directory(),
            extract: false,
            workers: 0,
            base_url: default_base_url(),
            tag_input_name: default_tag_input_name(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            extraction_failure: ExtractionFailurePolicy::default(),
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}
