//! Shared wiring for CLI commands.

use crate::config::{Prompts, Settings};
use crate::env::{Environment, ProcessEnv};
use crate::error::Result;
use crate::llm::create_backend;
use crate::mcp::StdioLauncher;
use crate::provider::{Catalogue, ProviderDescriptor};
use crate::session::ToolSession;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings, prompts and the provider catalogue for one CLI invocation.
pub struct AppContext {
    pub settings: Settings,
    pub prompts: Prompts,
    pub catalogue: Catalogue,
    pub config_path: PathBuf,
    env: Arc<dyn Environment>,
}

impl AppContext {
    pub fn new(settings: Settings, config_path: PathBuf) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let catalogue = Catalogue::new(&settings, &prompts)?;

        Ok(Self {
            settings,
            prompts,
            catalogue,
            config_path,
            env: Arc::new(ProcessEnv),
        })
    }

    pub fn env(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    pub fn provider(&self, name: &str) -> Result<&ProviderDescriptor> {
        self.catalogue.resolve(name)
    }

    pub fn launcher(&self) -> StdioLauncher {
        StdioLauncher::new(Duration::from_millis(self.settings.provider.shutdown_grace_ms))
    }

    /// Build a session for a provider with the configured backend.
    pub fn session(&self, provider: &ProviderDescriptor) -> Result<ToolSession> {
        let backend = create_backend(&self.settings.chat, self.env())?;

        Ok(ToolSession::new(provider.clone(), Arc::from(backend), Arc::new(self.launcher()))
            .with_environment(self.env.clone())
            .with_max_tool_rounds(self.settings.session.max_tool_rounds))
    }
}
