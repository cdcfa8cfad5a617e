// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_HUB_BASE_URL: &str = "http://localhost:8800";
const DEFAULT_DATASET: &str = "default";
const DEFAULT_SPLIT: &str = "train";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub hub: Hub,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            hub: Hub::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub resume_last_view: Option<bool>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            resume_last_view: Some(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hub {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub dataset: Option<String>,
    pub split: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            base_url: Some(DEFAULT_HUB_BASE_URL.to_owned()),
            dataset: Some(DEFAULT_DATASET.to_owned()),
            split: Some(DEFAULT_SPLIT.to_owned()),
            timeout: Some("10s".to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("RELABEL_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set RELABEL_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(relabel_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is missing `version = 1`. Add it and place values under [storage], [ui], and [hub]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.version != CONFIG_VERSION {
            bail!(
                "config {} has version {}; expected 1",
                path.display(),
                self.version
            );
        }

        if let Some(db_path) = &self.storage.db_path {
            relabel_db::validate_db_path(db_path)?;
        }

        if let Some(dataset) = &self.hub.dataset
            && dataset.trim().is_empty()
        {
            bail!("hub.dataset in {} must not be empty", path.display());
        }

        if let Some(split) = &self.hub.split
            && split.trim().is_empty()
        {
            bail!("hub.split in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.hub.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "hub.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => relabel_db::default_db_path(),
        }
    }

    pub fn resume_last_view(&self) -> bool {
        self.ui.resume_last_view.unwrap_or(true)
    }

    pub fn hub_enabled(&self) -> bool {
        self.hub.enabled.unwrap_or(true)
    }

    pub fn hub_base_url(&self) -> &str {
        self.hub
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_HUB_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn hub_dataset(&self) -> &str {
        self.hub.dataset.as_deref().unwrap_or(DEFAULT_DATASET)
    }

    pub fn hub_split(&self) -> &str {
        self.hub.split.as_deref().unwrap_or(DEFAULT_SPLIT)
    }

    pub fn hub_timeout(&self) -> Result<Duration> {
        parse_duration(self.hub.timeout.as_deref().unwrap_or("10s"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# relabel config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/relabel/relabel.db)\n# db_path = \"/absolute/path/to/relabel.db\"\n\n[ui]\nresume_last_view = true\n\n[hub]\nenabled = true\nbase_url = \"{}\"\ndataset = \"{}\"\nsplit = \"{}\"\ntimeout = \"10s\"\n",
            path.display(),
            DEFAULT_HUB_BASE_URL,
            DEFAULT_DATASET,
            DEFAULT_SPLIT,
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
