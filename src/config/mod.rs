//! Configuration module for Gymmando.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    ChatBackendKind, ChatSettings, CustomProvider, GeneralSettings, PromptSettings,
    ProviderSettings, SessionSettings, Settings,
};
