//! Error types for Gymmando.

use thiserror::Error;

/// Library-level error type for Gymmando operations.
#[derive(Error, Debug)]
pub enum GymmandoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{var} not set. {hint}")]
    MissingCredential { var: String, hint: String },

    #[error("Unknown provider: {0}. Run 'gymmando providers' to see what is available.")]
    UnknownProvider(String),

    #[error("Failed to launch tool provider '{command}': {source}")]
    ProviderLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool protocol error: {0}")]
    Protocol(String),

    #[error("Tool provider returned error {code}: {message}")]
    Provider { code: i64, message: String },

    #[error("Chat API error: {0}")]
    ChatApi(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Model kept requesting tools after {0} round(s)")]
    ToolLoop(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GymmandoError {
    /// Build a missing-credential error with a shell hint.
    pub fn missing_credential(var: &str) -> Self {
        GymmandoError::MissingCredential {
            var: var.to_string(),
            hint: format!("Set it with: export {}='...' (or add it to .env)", var),
        }
    }

    /// Whether this error was raised before anything external was contacted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GymmandoError::Config(_)
                | GymmandoError::MissingCredential { .. }
                | GymmandoError::UnknownProvider(_)
        )
    }
}

/// Result type alias for Gymmando operations.
pub type Result<T> = std::result::Result<T, GymmandoError>;
