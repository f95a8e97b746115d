use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "bookmarks")]
#[command(about = "Runs the bookmarks service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bookmarks")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_api_prefix")]
    api_prefix: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_port() -> u16 {
    8080
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for App {
    fn default() -> Self {
        App {
            port: default_port(),
            api_prefix: default_api_prefix(),
            timezone: default_timezone(),
        }
    }
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// The prefix with exactly one leading slash and no trailing slash.
    /// An empty or `/` prefix mounts the API at the root.
    pub fn get_api_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.timezone)
    }
}

/// Accepts `UTC`, `Z` or a fixed offset such as `+03:00`.
pub fn parse_utc_offset(tz: &str) -> Result<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).context("zero offset");
    }
    tz.parse::<FixedOffset>()
        .map_err(|e| anyhow::anyhow!("invalid timezone {tz:?} (expected UTC or +HH:MM): {e}"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("bookmarks.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_database_path(),
        }
    }
}

/// Bounds for `GET /bookmarks?limit=`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ListConfig {
    #[serde(default = "default_list_limit")]
    pub default_limit: u32,
    #[serde(default = "max_list_limit")]
    pub max_limit: u32,
}

fn default_list_limit() -> u32 {
    20
}

fn max_list_limit() -> u32 {
    100
}

impl Default for ListConfig {
    fn default() -> Self {
        ListConfig {
            default_limit: default_list_limit(),
            max_limit: max_list_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: default_log_dir(),
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub log: LogConfig,
    // Relative paths in the file are resolved against this directory.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str =
            fs::read_to_string(path).with_context(|| format!("failed to read config file {path}"))?;
        let base_dir = Path::new(path)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Config::from_yaml(&yaml_str, base_dir)
    }

    pub fn from_yaml(yaml_str: &str, base_dir: impl Into<PathBuf>) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let mut config: Config = serde_yaml::from_str(&yaml_with_env)?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.list.max_limit == 0 {
            anyhow::bail!("list.max_limit must be positive");
        }
        if self.list.default_limit == 0 || self.list.default_limit > self.list.max_limit {
            anyhow::bail!(
                "list.default_limit must be between 1 and list.max_limit ({})",
                self.list.max_limit
            );
        }
        self.app.utc_offset()?;
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.log.dir)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        eprintln!("Warning: Environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
