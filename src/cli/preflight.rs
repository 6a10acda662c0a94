//! Pre-flight checks before launching anything.
//!
//! Validates that credentials and launcher binaries are available so a query
//! fails fast instead of midway through a session. Only well-known launchers
//! are run with `--version`; configured commands are left to the spawn itself.

use crate::config::Settings;
use crate::env::Environment;
use crate::error::{GymmandoError, Result};
use crate::provider::ProviderDescriptor;
use std::process::Command;

/// Launchers that accept `--version` without side effects.
pub const KNOWN_LAUNCHERS: &[&str] = &["npx", "node"];

pub fn is_known_launcher(command: &str) -> bool {
    KNOWN_LAUNCHERS.contains(&command)
}

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// A model turn only.
    Ping,
    /// Starting a provider without the model.
    Tools(&'a ProviderDescriptor),
    /// A full session: model and provider.
    Ask(&'a ProviderDescriptor),
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation<'_>, settings: &Settings, env: &dyn Environment) -> Result<()> {
    match operation {
        Operation::Ping => {
            check_chat_credential(settings, env)?;
        }
        Operation::Tools(provider) => {
            check_provider(provider, env)?;
        }
        Operation::Ask(provider) => {
            check_chat_credential(settings, env)?;
            check_provider(provider, env)?;
        }
    }
    Ok(())
}

/// Check that the chat backend's API key is configured.
pub fn check_chat_credential(settings: &Settings, env: &dyn Environment) -> Result<()> {
    let var = settings.chat.backend.credential_var();
    env.var(var)
        .map(|_| ())
        .ok_or_else(|| GymmandoError::missing_credential(var))
}

fn check_provider(provider: &ProviderDescriptor, env: &dyn Environment) -> Result<()> {
    let spec = provider.launch_spec(env)?;
    if is_known_launcher(&spec.command) {
        check_tool(&spec.command)?;
    }
    Ok(())
}

/// Check that an external program can be started.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(_) => Ok(()),
        Err(source) => Err(GymmandoError::ProviderLaunch {
            command: name.to_string(),
            source,
        }),
    }
}
