use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;

const HISTORY_FILE: &str = ".dispatchsh_history";
const CONFIG_DIR: &str = "dispatchsh";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Text shown before the `$`/`!` status symbol.
    pub prompt: String,
    /// Defaults to `~/.dispatchsh_history`, or the working directory when
    /// there is no home directory.
    pub history_file: Option<PathBuf>,
    pub log_level: LevelFilter,
    pub redirect: RedirectConfig,
}

/// How `> file` opens its target.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedirectConfig {
    /// Append instead of truncating an existing file.
    pub append: bool,
    /// Permission bits for a newly created file.
    pub mode: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prompt: "dispatchsh".to_string(),
            history_file: None,
            log_level: LevelFilter::Warn,
            redirect: RedirectConfig::default(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        RedirectConfig {
            append: false,
            mode: 0o644,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads `<config dir>/dispatchsh/config.toml`. A missing file yields the
    /// defaults.
    pub fn load() -> Result<Self> {
        match dirs::config_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_DIR).join(CONFIG_FILE)),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.history_file {
            return path.clone();
        }
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_FILE),
            None => PathBuf::from(HISTORY_FILE),
        }
    }
}
