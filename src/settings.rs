use crate::meme::composite::DEFAULT_OVERSAMPLE;
use crate::meme::history::DEFAULT_CAPACITY;
use crate::meme::loader::CrossOriginPolicy;
use crate::meme::messages::DEFAULT_NOTICE_DURATION;
use crate::templates::DEFAULT_TEMPLATE_API_URL;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR_NAME: &str = "meme_composer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Endpoint listing template images.
    #[serde(default = "default_template_api_url")]
    pub template_api_url: String,
    /// Oversampling factor applied when rasterizing. Defaults to `2.0`.
    #[serde(default = "default_oversample_scale")]
    pub oversample_scale: f32,
    /// Maximum number of entries kept in the meme history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Upper bound for the serialized history blob, mirroring browser storage
    /// quotas. `None` disables the check.
    #[serde(default = "default_history_quota_bytes")]
    pub history_quota_bytes: Option<usize>,
    /// Directory holding the history blob. If `None`, the platform data
    /// directory is used.
    #[serde(default)]
    pub history_dir: Option<String>,
    /// Directory receiving downloads. If `None`, the working directory is used.
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default = "default_surface_width")]
    pub surface_width: u32,
    #[serde(default = "default_surface_height")]
    pub surface_height: u32,
    #[serde(default = "default_use_cors")]
    pub use_cors: bool,
    #[serde(default)]
    pub allow_taint: bool,
    /// Duration of success/error notices in seconds.
    #[serde(default = "default_notice_seconds")]
    pub notice_seconds: f32,
    #[serde(default)]
    pub debug_logging: bool,
    /// Also write logs to this file when set.
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_template_api_url() -> String {
    DEFAULT_TEMPLATE_API_URL.to_string()
}

fn default_oversample_scale() -> f32 {
    DEFAULT_OVERSAMPLE
}

fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_history_quota_bytes() -> Option<usize> {
    Some(5 * 1024 * 1024)
}

fn default_surface_width() -> u32 {
    600
}

fn default_surface_height() -> u32 {
    600
}

fn default_use_cors() -> bool {
    true
}

fn default_notice_seconds() -> f32 {
    DEFAULT_NOTICE_DURATION.as_secs_f32()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_api_url: default_template_api_url(),
            oversample_scale: default_oversample_scale(),
            history_capacity: default_history_capacity(),
            history_quota_bytes: default_history_quota_bytes(),
            history_dir: None,
            download_dir: None,
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
            use_cors: default_use_cors(),
            allow_taint: false,
            notice_seconds: default_notice_seconds(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    /// Missing or empty files yield the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).with_context(|| format!("parse settings file {path}"))
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("write settings file {path}"))?;
        Ok(())
    }

    pub fn history_dir(&self) -> PathBuf {
        match &self.history_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs_next::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR_NAME),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        match &self.download_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()),
        }
    }

    pub fn cross_origin_policy(&self) -> CrossOriginPolicy {
        CrossOriginPolicy {
            use_cors: self.use_cors,
            allow_taint: self.allow_taint,
        }
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_secs_f32(self.notice_seconds.max(0.0))
    }
}
