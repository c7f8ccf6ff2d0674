use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cursor::{CursorOrder, CursorRules, DEFAULT_OFFSET_STEP};
use crate::feed::{self, DEFAULT_BASE_URL, DEFAULT_CURSOR_SUFFIX};
use crate::server::DEFAULT_LISTEN_ADDR;

const DEFAULT_ENV_PREFIX: &str = "NINEGAG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cursor_suffix")]
    pub cursor_suffix: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub cursor_order: CursorOrder,
    #[serde(default = "default_offset_step")]
    pub offset_step: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cursor_suffix: default_cursor_suffix(),
            user_agent: default_user_agent(),
            timeout: None,
            cursor_order: CursorOrder::default(),
            offset_step: default_offset_step(),
        }
    }
}

impl FeedConfig {
    pub fn client_config(&self) -> feed::ClientConfig {
        feed::ClientConfig {
            user_agent: self.user_agent.clone(),
            base_url: Some(self.base_url.clone()),
            cursor_suffix: Some(self.cursor_suffix.clone()),
            rules: CursorRules {
                order: self.cursor_order,
                offset_step: self.offset_step,
            },
            timeout: self.timeout,
            http_client: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cursor_suffix() -> String {
    DEFAULT_CURSOR_SUFFIX.to_string()
}

fn default_user_agent() -> String {
    format!("ninegag-feed/{}", crate::VERSION)
}

fn default_offset_step() -> u64 {
    DEFAULT_OFFSET_STEP
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    load_env(&mut cfg, prefix)?;

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

// The file layer sits directly on the defaults, so a field it leaves out
// (deserialized to its default) can be skipped without losing anything.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if other.feed.base_url != defaults.feed.base_url && !other.feed.base_url.is_empty() {
        base.feed.base_url = other.feed.base_url;
    }
    if other.feed.cursor_suffix != defaults.feed.cursor_suffix {
        base.feed.cursor_suffix = other.feed.cursor_suffix;
    }
    if other.feed.user_agent != defaults.feed.user_agent && !other.feed.user_agent.is_empty() {
        base.feed.user_agent = other.feed.user_agent;
    }
    if other.feed.timeout.is_some() {
        base.feed.timeout = other.feed.timeout;
    }
    if other.feed.cursor_order != defaults.feed.cursor_order {
        base.feed.cursor_order = other.feed.cursor_order;
    }
    if other.feed.offset_step != defaults.feed.offset_step && other.feed.offset_step != 0 {
        base.feed.offset_step = other.feed.offset_step;
    }

    if other.server.listen_addr != defaults.server.listen_addr
        && !other.server.listen_addr.is_empty()
    {
        base.server.listen_addr = other.server.listen_addr;
    }

    if other.log.level != defaults.log.level && !other.log.level.is_empty() {
        base.log.level = other.log.level;
    }

    base
}

// Environment keys are applied onto the merged config one by one, so a
// variable that names the built-in default still replaces a file value.
fn load_env(cfg: &mut Config, prefix: &str) -> Result<()> {
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    let mut vars: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix(&upper_prefix)?;
            Some((stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();
    vars.sort();

    for (key, value) in vars {
        apply_env_value(cfg, &key, value)?;
    }

    Ok(())
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) -> Result<()> {
    match key {
        "feed.base_url" if !value.is_empty() => cfg.feed.base_url = value,
        "feed.cursor_suffix" => cfg.feed.cursor_suffix = value,
        "feed.user_agent" if !value.is_empty() => cfg.feed.user_agent = value,
        "feed.timeout" => {
            let duration = humantime::parse_duration(&value)
                .with_context(|| format!("config: invalid feed.timeout {value:?}"))?;
            cfg.feed.timeout = Some(duration);
        }
        "feed.cursor_order" => {
            cfg.feed.cursor_order = CursorOrder::from_key(&value)
                .with_context(|| format!("config: unknown feed.cursor_order {value:?}"))?;
        }
        "feed.offset_step" => {
            let step = value
                .trim()
                .parse::<u64>()
                .with_context(|| format!("config: invalid feed.offset_step {value:?}"))?;
            if step == 0 {
                anyhow::bail!("config: feed.offset_step must be at least 1");
            }
            cfg.feed.offset_step = step;
        }
        "server.listen_addr" if !value.is_empty() => cfg.server.listen_addr = value,
        "log.level" if !value.is_empty() => cfg.log.level = value,
        _ => {}
    }
    Ok(())
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ninegag-feed").join("config.yaml"))
}
