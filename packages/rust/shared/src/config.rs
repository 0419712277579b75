//! Application configuration for the Yuque exporter.
//!
//! User config lives at `~/.yuque-export/yuque-export.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ExportError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "yuque-export.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".yuque-export";

/// User-Agent string for API requests.
pub const USER_AGENT: &str = concat!("yuque-export/", env!("CARGO_PKG_VERSION"));

/// Header carrying the access token.
pub const AUTH_HEADER: &str = "x-auth-token";

// ---------------------------------------------------------------------------
// Config structs (matching yuque-export.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Export output settings.
    #[serde(default)]
    pub export: ExportSettings,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the v2 API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the access token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.yuque.com/api/v2".into()
}
fn default_token_env() -> String {
    "YUQUE_TOKEN".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// What to do with a document when one of its assets fails to download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetFailurePolicy {
    /// Do not write the document; report it as failed and move on.
    #[default]
    FailDocument,
    /// Write the document anyway, leaving the missing asset link dangling.
    Continue,
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Root directory the export is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Policy applied when an asset download fails.
    #[serde(default)]
    pub on_asset_error: AssetFailurePolicy,

    /// Origin serving embedded images.
    #[serde(default = "default_image_origin")]
    pub image_origin: String,

    /// Origin serving attachments.
    #[serde(default = "default_attachment_origin")]
    pub attachment_origin: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            on_asset_error: AssetFailurePolicy::default(),
            image_origin: default_image_origin(),
            attachment_origin: default_attachment_origin(),
        }
    }
}

fn default_output_dir() -> String {
    "./YuqueExport".into()
}
fn default_image_origin() -> String {
    "https://cdn.nlark.com".into()
}
fn default_attachment_origin() -> String {
    "https://www.yuque.com".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Everything a component performing network I/O needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. `https://www.yuque.com/api/v2`.
    pub base_url: Url,
    /// Access token sent as `X-Auth-Token`.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent for API requests.
    pub user_agent: String,
}

impl ClientConfig {
    /// Build a client config from the `[api]` section and a resolved token.
    pub fn from_app(config: &AppConfig, token: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(config.api.base_url.trim_end_matches('/')).map_err(|e| {
            ExportError::config(format!("invalid api.base_url '{}': {e}", config.api.base_url))
        })?;

        Ok(Self {
            base_url,
            token: token.into(),
            timeout: Duration::from_secs(config.api.timeout_secs),
            user_agent: USER_AGENT.to_string(),
        })
    }
}

/// Runtime export configuration.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Root directory for repository folders and index files.
    pub output_root: PathBuf,
    /// Policy applied when an asset download fails.
    pub on_asset_error: AssetFailurePolicy,
}

impl From<&AppConfig> for ExportConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_root: PathBuf::from(&config.export.output_dir),
            on_asset_error: config.export.on_asset_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.yuque-export/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ExportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.yuque-export/yuque-export.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ExportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the access token from the env var named by `api.token_env`.
pub fn resolve_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.api.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ExportError::config(format!(
            "Yuque access token not found. Set the {var_name} environment variable \
             or pass --token.\nCreate a token at https://www.yuque.com/settings/tokens"
        ))),
    }
}
