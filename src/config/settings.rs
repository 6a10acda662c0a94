//! Configuration settings for Gymmando.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chat: ChatSettings,
    pub session: SessionSettings,
    pub provider: ProviderSettings,
    pub prompts: PromptSettings,
    /// User-declared tool providers, keyed by name.
    pub providers: BTreeMap<String, CustomProvider>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Load a `.env` file from the working directory at startup.
    pub load_dotenv: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            load_dotenv: true,
        }
    }
}

/// Hosted chat backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatBackendKind {
    /// Anthropic Messages API (default).
    #[default]
    Anthropic,
    /// OpenAI chat completions.
    OpenAI,
}

impl ChatBackendKind {
    /// Environment variable holding the API credential for this backend.
    pub fn credential_var(&self) -> &'static str {
        match self {
            ChatBackendKind::Anthropic => "ANTHROPIC_API_KEY",
            ChatBackendKind::OpenAI => "OPENAI_API_KEY",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ChatBackendKind::Anthropic => "claude-sonnet-4-20250514",
            ChatBackendKind::OpenAI => "gpt-4o-mini",
        }
    }
}

impl std::str::FromStr for ChatBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ChatBackendKind::Anthropic),
            "openai" => Ok(ChatBackendKind::OpenAI),
            _ => Err(format!("Unknown chat backend: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatBackendKind::Anthropic => write!(f, "anthropic"),
            ChatBackendKind::OpenAI => write!(f, "openai"),
        }
    }
}

/// Hosted chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Chat backend (anthropic, openai).
    pub backend: ChatBackendKind,
    /// Model name. Empty means the backend default.
    pub model: String,
    /// Maximum tokens per model turn.
    pub max_tokens: u32,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Override for the API base URL (Anthropic backend only).
    pub api_base: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            backend: ChatBackendKind::Anthropic,
            model: String::new(),
            max_tokens: 4096,
            timeout_secs: 300,
            api_base: None,
        }
    }
}

impl ChatSettings {
    /// The configured model, falling back to the backend default.
    pub fn resolved_model(&self) -> String {
        if self.model.is_empty() {
            self.backend.default_model().to_string()
        } else {
            self.model.clone()
        }
    }
}

/// Tool dispatch loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct SessionSettings {
    /// Maximum tool rounds per query. Unset means unbounded.
    pub max_tool_rounds: Option<usize>,
}

/// Tool provider subprocess settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// How long to wait for a provider to exit after its stdin is closed.
    pub shutdown_grace_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 2000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
    /// System prompt overrides keyed by provider name.
    pub overrides: HashMap<String, String>,
}

/// A tool provider declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CustomProvider {
    /// Command to launch.
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
    /// Environment overrides.
    pub env: BTreeMap<String, String>,
    /// Variables that must be present in the parent environment; they are forwarded.
    pub required_env: Vec<String>,
    /// Optional system instruction.
    pub system_prompt: Option<String>,
    /// Add the NODE_ENV/LOG_LEVEL/SILENT log-suppression flags.
    pub quiet: bool,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GymmandoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gymmando")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}
