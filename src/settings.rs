use crate::bus::BusSettings;
use crate::window::MonitorSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenterWindowSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for PresenterWindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    /// Mirror log output to this file in addition to stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(flatten)]
    pub bus: BusSettings,
    /// Where speaker notes are kept. Falls back to the platform data dir.
    #[serde(default)]
    pub notes_dir: Option<PathBuf>,
    /// Base the presenter and display URLs are resolved against.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub presenter_window: PresenterWindowSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

fn default_base_url() -> String {
    "http://localhost:8080/".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_file: None,
            bus: BusSettings::default(),
            notes_dir: None,
            base_url: default_base_url(),
            presenter_window: PresenterWindowSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl Settings {
    /// Missing or empty files yield the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("deserialize settings file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings parent folder {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("write settings file {}", path.display()))
    }

    pub fn base_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.base_url).with_context(|| format!("parse base url {}", self.base_url))
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.notes_dir
            .clone()
            .unwrap_or_else(crate::present::notes::default_notes_dir)
    }
}
