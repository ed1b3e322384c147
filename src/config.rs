use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow, Context};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5001";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 800;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    /// Defaults to `<server_url>/upload` when unset.
    pub upload_url: Option<String>,
    pub settle_delay_ms: u64,
    /// Dictation command and its arguments, e.g. `["whisper-dictate", "--once"]`.
    pub speech_command: Option<Vec<String>>,
    pub speech_language: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            upload_url: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            speech_command: None,
            speech_language: "en-US".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn upload_url(&self) -> String {
        match &self.upload_url {
            Some(url) => url.clone(),
            None => format!("{}/upload", self.server_url.trim_end_matches('/')),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("codegenie").join("config.json"))
    }
}
