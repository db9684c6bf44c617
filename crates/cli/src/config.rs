use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Present while logged in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds after which `access_token` is rejected.
    pub expires_at: i64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

/// Config directory: `$TASKBOARD_CONFIG_DIR`, else `~/.config/taskboard/`.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TASKBOARD_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("taskboard"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_from(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
}

pub fn save_to(path: &Path, config: &CliConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))
}

/// Load config from disk, returning default if not found.
pub fn load_config() -> Result<CliConfig> {
    load_from(&config_path()?)
}

pub fn save_config(config: &CliConfig) -> Result<()> {
    save_to(&config_path()?, config)
}

pub fn normalize_server_url(value: &str) -> Result<String> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("server url cannot be empty");
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        bail!("server url must start with http:// or https://");
    }
    Ok(trimmed.to_string())
}

fn mask(token: &str) -> String {
    if token.is_empty() {
        "(not set)".to_string()
    } else {
        format!("{}...", &token[..8.min(token.len())])
    }
}

pub fn show_config() -> Result<()> {
    let config = load_config()?;
    println!("Config file: {}", config_path()?.display());
    println!();
    println!("[server]");
    println!("  url = {}", config.server.url);
    println!();
    match &config.auth {
        Some(auth) => {
            println!("[auth]");
            println!("  email         = {}", auth.email);
            println!("  access_token  = {}", mask(&auth.access_token));
            println!("  refresh_token = {}", mask(&auth.refresh_token));
        }
        None => println!("Not logged in."),
    }
    Ok(())
}

/// Point the CLI at another server. Stored credentials belong to the old
/// server, so they are dropped.
pub fn set_server(url: &str) -> Result<()> {
    let mut config = load_config()?;
    let url = normalize_server_url(url)?;
    if config.server.url != url {
        config.auth = None;
    }
    config.server.url = url;
    save_config(&config)?;
    println!("Configuration updated.");
    show_config()
}
