use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::DownloadOptions;
use crate::transfer::CurlOptions;

/// Global configuration loaded from `~/.config/pdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdlConfig {
    /// Number of concurrent ranges per download.
    pub concurrency: usize,
    /// Resume from staged parts left by an interrupted run.
    pub resume: bool,
    /// Curl receive buffer in bytes (size of each streamed chunk).
    pub buffer_size: usize,
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Optional cap on the whole job; all workers are cancelled when it expires.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    /// Optional per-transfer bandwidth cap in bytes per second.
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
}

impl Default for PdlConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resume: false,
            buffer_size: 32 * 1024,
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            job_timeout_secs: None,
            max_bytes_per_sec: None,
        }
    }
}

impl PdlConfig {
    /// Options for the core downloader (no extra headers).
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            concurrency: self.concurrency,
            resume: self.resume,
            headers: Default::default(),
            curl: CurlOptions {
                buffer_size: self.buffer_size,
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                low_speed_limit: self.low_speed_limit,
                low_speed_time: Duration::from_secs(self.low_speed_time_secs),
                max_recv_speed: self.max_bytes_per_sec,
            },
            job_timeout: self.job_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
