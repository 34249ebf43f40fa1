use crate::conversation::ConversationSettings;
use crate::trigger::EffectPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_GREETING: &str = "Hello! I am Arin, nice to meet you";
pub const DEFAULT_PLACEHOLDER: &str = "Typing...";
pub const DEFAULT_CONNECTION_ERROR: &str =
    "Connection error: Unable to reach the server. Please check your network connection and try again.";
pub const DEFAULT_EMPTY_REPLY: &str = "Sorry, I cannot respond at the moment.";
pub const DEFAULT_UNLOCK_TEMPLATE: &str = "对话已结束。感谢您的交流！\n\n固定代码: {code}";
pub const DEFAULT_UNLOCK_CODE: &str = "MUAKC";

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArinConfig {
    pub responder: ResponderConfig,
    pub progression: ProgressionConfig,
    pub storage: StorageConfig,
    pub texts: TextsConfig,
}

impl ArinConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: ArinConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ARIN_ENDPOINT") {
            self.responder.endpoint = v;
        }
        if let Ok(v) = std::env::var("ARIN_RESPONDER_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.responder.timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("ARIN_MOCK_RESPONDER") {
            self.responder.mock = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("ARIN_EFFECT_PROBABILITY") {
            if let Ok(p) = v.parse() {
                self.progression.effect_probability = p;
            }
        }
        if let Ok(v) = std::env::var("ARIN_DB_PATH") {
            self.storage.db_path = PathBuf::from(v);
        }
    }

    /// Settings handed to the conversation state machine.
    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings {
            texts: self.texts.clone(),
            threshold: self.progression.threshold.max(1),
            effect: EffectPolicy::new(self.progression.effect_probability),
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Chat endpoint receiving `{"message": ...}`.
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Attempts per message, including the first. Only transient failures are retried.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Use the offline canned responder instead of HTTP.
    pub mock: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/chat".to_string(),
            timeout_secs: 30,
            max_attempts: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
            mock: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub threshold: u32,
    /// Chance in [0, 1] that a triggering reply also shows the heart effect.
    pub effect_probability: f64,
    /// Fixed seed for the effect roll. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            threshold: crate::THRESHOLD,
            effect_probability: 1.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("arin.db"),
        }
    }
}

/// User-visible strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextsConfig {
    pub greeting: String,
    pub placeholder: String,
    pub connection_error: String,
    /// Used when the responder succeeds without a reply body.
    pub empty_reply: String,
    /// `{code}` is replaced with `unlock_code`.
    pub unlock_template: String,
    pub unlock_code: String,
}

impl TextsConfig {
    pub fn unlock_notice(&self) -> String {
        self.unlock_template.replace("{code}", &self.unlock_code)
    }
}

impl Default for TextsConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            connection_error: DEFAULT_CONNECTION_ERROR.to_string(),
            empty_reply: DEFAULT_EMPTY_REPLY.to_string(),
            unlock_template: DEFAULT_UNLOCK_TEMPLATE.to_string(),
            unlock_code: DEFAULT_UNLOCK_CODE.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
