//! Configuration loading, validation, and management for screenpilot.
//!
//! Loads configuration from `~/.screenpilot/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One mebibyte, the unit payload budgets are expressed in.
pub const MIB: usize = 1024 * 1024;

/// The root configuration structure.
///
/// Maps directly to `~/.screenpilot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Step loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Image resolution, retry, and payload budget settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Model-family routing and evaluation
    #[serde(default)]
    pub models: ModelsConfig,

    /// Computer provider behaviour
    #[serde(default)]
    pub computer: ComputerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard ceiling on loop iterations per task
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Number of most recent steps kept visible to the model
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Completion attempts evaluated before finalization is forced
    #[serde(default = "default_force_complete_after")]
    pub force_complete_after: usize,

    /// Image cap applied to the history sent for finalization
    #[serde(default = "default_max_images")]
    pub finalize_max_images: usize,

    /// Optional system prompt passed to every generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_steps() -> u32 {
    300
}
fn default_lookback() -> usize {
    7
}
fn default_force_complete_after() -> usize {
    3
}
fn default_max_images() -> usize {
    95
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            lookback: default_lookback(),
            force_complete_after: default_force_complete_after(),
            finalize_max_images: default_max_images(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Image cache capacity; defaults to the lookback window plus the pinned
    /// instructions screenshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_cache_capacity: Option<usize>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Image cap for count-bounded model families
    #[serde(default = "default_max_images")]
    pub max_images: usize,

    /// Payload cap for byte-bounded model families
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Size assumed for an image still referenced by URL
    #[serde(default = "default_unresolved_image_bytes")]
    pub unresolved_image_bytes: usize,
}

fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_initial_delay_ms() -> u64 {
    500
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_max_bytes() -> usize {
    18 * MIB
}
fn default_unresolved_image_bytes() -> usize {
    MIB
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            image_cache_capacity: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_images: default_max_images(),
            max_bytes: default_max_bytes(),
            unresolved_image_bytes: default_unresolved_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model-name prefixes with an attachment-count ceiling
    #[serde(default = "default_count_bounded_prefixes")]
    pub count_bounded_prefixes: Vec<String>,

    /// Model-name prefixes with a payload-size ceiling
    #[serde(default = "default_byte_bounded_prefixes")]
    pub byte_bounded_prefixes: Vec<String>,

    /// Whether malformed tool arguments are sent back to the model for repair
    #[serde(default = "default_true")]
    pub repair_arguments: bool,
}

fn default_count_bounded_prefixes() -> Vec<String> {
    vec!["claude".into(), "anthropic/".into()]
}
fn default_byte_bounded_prefixes() -> Vec<String> {
    vec![
        "gemini".into(),
        "google/".into(),
        "gpt".into(),
        "openai/".into(),
        "o1".into(),
        "o3".into(),
        "o4".into(),
    ]
}
fn default_true() -> bool {
    true
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            count_bounded_prefixes: default_count_bounded_prefixes(),
            byte_bounded_prefixes: default_byte_bounded_prefixes(),
            repair_arguments: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerConfig {
    /// Upload screenshots and reference them by URL instead of inlining
    #[serde(default = "default_true")]
    pub upload_screenshots: bool,

    /// URL opened when a session starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_url: Option<String>,
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            upload_screenshots: true,
            initial_url: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.screenpilot/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `SCREENPILOT_MAX_STEPS`
    /// - `SCREENPILOT_LOOKBACK`
    /// - `SCREENPILOT_UPLOAD_SCREENSHOTS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply `SCREENPILOT_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("SCREENPILOT_MAX_STEPS") {
            self.agent.max_steps = parse_env("SCREENPILOT_MAX_STEPS", &raw)?;
        }
        if let Some(raw) = lookup("SCREENPILOT_LOOKBACK") {
            self.agent.lookback = parse_env("SCREENPILOT_LOOKBACK", &raw)?;
        }
        if let Some(raw) = lookup("SCREENPILOT_UPLOAD_SCREENSHOTS") {
            self.computer.upload_screenshots = matches!(
                raw.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".screenpilot")
    }

    /// Effective image cache capacity.
    ///
    /// A full view carries one screenshot per windowed chunk plus the one
    /// pinned with the instructions, so the default holds `lookback + 1`.
    pub fn image_cache_capacity(&self) -> usize {
        self.transport
            .image_cache_capacity
            .unwrap_or(self.agent.lookback + 1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError("agent.max_steps must be > 0".into()));
        }
        if self.agent.lookback == 0 {
            return Err(ConfigError::ValidationError("agent.lookback must be > 0".into()));
        }
        if self.transport.retry_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "transport.retry_max_attempts must be > 0".into(),
            ));
        }
        if self.image_cache_capacity() == 0 {
            return Err(ConfigError::ValidationError(
                "transport.image_cache_capacity must be > 0".into(),
            ));
        }
        if self.transport.max_images == 0 || self.agent.finalize_max_images == 0 {
            return Err(ConfigError::ValidationError("image caps must be > 0".into()));
        }
        if self.transport.max_bytes == 0 {
            return Err(ConfigError::ValidationError("transport.max_bytes must be > 0".into()));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key}: invalid value '{raw}'")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
