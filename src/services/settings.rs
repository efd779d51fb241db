use crate::services::analyzer::DEFAULT_MAX_DEPTH;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_top_tensors() -> usize {
    10
}

fn default_top_others() -> usize {
    5
}

#[derive(Debug, Deserialize, Default)]
pub struct SettingsFile {
    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReportSettings {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_top_tensors")]
    pub top_tensors: usize,
    #[serde(default = "default_top_others")]
    pub top_others: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            top_tensors: default_top_tensors(),
            top_others: default_top_others(),
        }
    }
}

impl ReportSettings {
    pub fn with_overrides(
        mut self,
        max_depth: Option<usize>,
        top_tensors: Option<usize>,
        top_others: Option<usize>,
    ) -> Self {
        if let Some(d) = max_depth {
            self.max_depth = d;
        }
        if let Some(n) = top_tensors {
            self.top_tensors = n;
        }
        if let Some(n) = top_others {
            self.top_others = n;
        }
        self
    }
}

fn default_settings_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".config/ckpt-inspect/config.toml"))
}

/// An explicit path must exist; the default location is optional.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<SettingsFile> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => match default_settings_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(SettingsFile::default()),
        },
    };
    debug!(path = %path.display(), "loading settings");
    let raw = std::fs::read_to_string(&path)?;
    parse_settings(&raw)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<SettingsFile> {
    Ok(toml::from_str(raw)?)
}
