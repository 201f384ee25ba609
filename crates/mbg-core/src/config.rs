//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `mbg-gateway.toml` config file
//! 3. Defaults

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::jid::phone_digits;

/// Process-wide command access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Anyone may use non-elevated commands
    #[default]
    Public,
    /// Only the global owner and each session's owning account are served
    Private,
}

/// Shared handle to the process-wide access mode.
///
/// Passed by reference into the moderation pipeline; the `public`/`private`
/// commands are its only writers.
#[derive(Debug, Clone, Default)]
pub struct SharedMode(Arc<RwLock<AccessMode>>);

impl SharedMode {
    pub fn new(mode: AccessMode) -> Self {
        Self(Arc::new(RwLock::new(mode)))
    }

    pub async fn get(&self) -> AccessMode {
        *self.0.read().await
    }

    pub async fn set(&self, mode: AccessMode) {
        *self.0.write().await = mode;
    }
}

/// Main configuration for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Display name of the global owner
    pub owner_name: String,

    /// Phone number of the global owner (digits, no prefix)
    pub owner_number: String,

    /// Name the bot signs its replies with
    pub bot_name: String,

    /// Leading character that marks a command
    pub command_prefix: char,

    /// Base directory holding one `auth_info<N>` folder per session
    pub sessions_dir: String,

    /// Port for the UI control channel
    pub port: u16,

    /// Initial access mode
    pub mode: AccessMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            owner_name: "Owner".to_string(),
            owner_number: String::new(),
            bot_name: "mbg".to_string(),
            command_prefix: '.',
            sessions_dir: "sessions".to_string(),
            port: 3000,
            mode: AccessMode::Public,
        }
    }
}

impl GatewayConfig {
    /// Load configuration: `mbg-gateway.toml` if present, else environment
    pub fn load() -> Result<Self> {
        if Path::new("mbg-gateway.toml").exists() {
            return Self::from_toml_file("mbg-gateway.toml");
        }
        Self::from_env()
    }

    /// Load configuration from a TOML file, with env overrides applied on top
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;
        let mut config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse TOML: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("OWNER_NAME") {
            self.owner_name = name;
        }
        if let Ok(number) = std::env::var("OWNER_NUMBER") {
            self.owner_number = phone_digits(&number);
        }
        if let Ok(name) = std::env::var("BOT_NAME") {
            self.bot_name = name;
        }
        if let Ok(prefix) = std::env::var("COMMAND_PREFIX") {
            if let Some(c) = prefix.chars().next() {
                self.command_prefix = c;
            }
        }
        if let Ok(dir) = std::env::var("SESSIONS_DIR") {
            self.sessions_dir = dir;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.port = p;
            }
        }
        if let Ok(mode) = std::env::var("GATEWAY_MODE") {
            self.mode = match mode.to_lowercase().as_str() {
                "private" => AccessMode::Private,
                _ => AccessMode::Public,
            };
        }
    }

    /// Whether `number` (digits-only) is the configured global owner
    pub fn is_global_owner(&self, number: &str) -> bool {
        !self.owner_number.is_empty() && number == self.owner_number
    }
}
