// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use capview_app::SortOrder;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "CAPVIEW_CONFIG_PATH";
pub const DEFAULT_MAX_CAPTURES: i64 = 1000;
const DEFAULT_SERVER_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            server: Server::default(),
            logging: Logging::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub captures_dir: Option<String>,
    pub max_captures: Option<i64>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            captures_dir: None,
            max_captures: Some(DEFAULT_MAX_CAPTURES),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub default_sort: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            default_sort: Some(SortOrder::Newest.as_str().to_owned()),
        }
    }
}

/// The capture server the camera runs next to the detection service.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            enabled: Some(false),
            base_url: Some(DEFAULT_SERVER_BASE_URL.to_owned()),
            timeout: Some("5s".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(capview_store::APP_NAME).join("config.toml"))
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
                    "config file {} has no version. Add `version = 1` and keep values under [storage], [ui], [server], and [logging]",
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
        if let Some(captures_dir) = &self.storage.captures_dir {
            capview_store::validate_captures_dir(captures_dir)
                .with_context(|| format!("storage.captures_dir in {}", path.display()))?;
        }

        if let Some(limit) = self.storage.max_captures
            && limit < 0
        {
            bail!(
                "storage.max_captures in {} must be non-negative (0 disables pruning), got {}",
                path.display(),
                limit
            );
        }

        if let Some(sort) = &self.ui.default_sort
            && SortOrder::parse(sort).is_none()
        {
            bail!(
                "ui.default_sort in {} must be \"newest\" or \"oldest\", got {sort:?}",
                path.display()
            );
        }

        if let Some(timeout) = &self.server.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "server.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(level) = &self.logging.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "logging.level {level:?} in {} is not a valid filter; use trace, debug, info, warn, or error",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    /// `[storage].captures_dir` wins over `CAPVIEW_CAPTURES_DIR`, which wins
    /// over the platform data directory.
    pub fn captures_dir(&self) -> Result<PathBuf> {
        match &self.storage.captures_dir {
            Some(path) => Ok(PathBuf::from(path)),
            None => capview_store::default_captures_dir(),
        }
    }

    pub fn max_captures(&self) -> usize {
        let limit = self.storage.max_captures.unwrap_or(DEFAULT_MAX_CAPTURES);
        usize::try_from(limit).unwrap_or(0)
    }

    pub fn default_sort(&self) -> SortOrder {
        self.ui
            .default_sort
            .as_deref()
            .and_then(SortOrder::parse)
            .unwrap_or_default()
    }

    pub fn server_enabled(&self) -> bool {
        self.server.enabled.unwrap_or(false)
    }

    pub fn server_base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn server_timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or("5s"))
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        match &self.logging.file {
            Some(path) => Ok(PathBuf::from(path)),
            None => crate::logging::default_log_path(),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# capview config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is CAPVIEW_CAPTURES_DIR, else the platform data dir\n# (for example ~/.local/share/capview/captures)\n# captures_dir = \"/srv/camera/captures\"\n# Oldest captures beyond this count are removed at startup; 0 disables.\nmax_captures = {}\n\n[ui]\n# newest or oldest\ndefault_sort = \"newest\"\n\n[server]\n# When enabled, capture details and deletes go through the capture server.\nenabled = false\nbase_url = \"{}\"\ntimeout = \"5s\"\n\n[logging]\n# RUST_LOG overrides this.\nlevel = \"{}\"\n# file = \"/var/log/capview.log\"\n",
            path.display(),
            DEFAULT_MAX_CAPTURES,
            DEFAULT_SERVER_BASE_URL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
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

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
