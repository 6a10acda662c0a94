//! Tool provider catalogue.
//!
//! A provider descriptor says how to start one MCP tool server: the command,
//! its arguments and environment, which credentials must be present, and the
//! system instruction the session should use with it. Built-in descriptors
//! cover the bundled integrations; more can be declared in the config file.

mod builtin;

use crate::config::{CustomProvider, Prompts, Settings};
use crate::env::Environment;
use crate::error::{GymmandoError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A fully resolved process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    /// Overrides applied on top of the inherited parent environment.
    pub env: BTreeMap<String, String>,
}

/// Where a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOrigin {
    BuiltIn,
    Config,
}

impl std::fmt::Display for ProviderOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderOrigin::BuiltIn => write!(f, "built-in"),
            ProviderOrigin::Config => write!(f, "config"),
        }
    }
}

/// Alternative launch from a locally installed entry point.
///
/// When `path_var` is set the provider runs as `<runner> <absolute path>`
/// instead of its default command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path_var: String,
    pub runner: String,
    pub install_hint: String,
}

/// How to start a tool provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub summary: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Variables that must be set; their values are forwarded to the child.
    pub required_env: Vec<String>,
    pub local_entry: Option<LocalEntry>,
    pub system_prompt: Option<String>,
    pub origin: ProviderOrigin,
}

impl ProviderDescriptor {
    /// Resolve against the environment into a concrete launch.
    ///
    /// Fails with a missing-credential error before anything is started.
    pub fn launch_spec(&self, env: &dyn Environment) -> Result<LaunchSpec> {
        let mut vars = self.env.clone();
        for var in &self.required_env {
            let value = env
                .var(var)
                .ok_or_else(|| GymmandoError::missing_credential(var))?;
            vars.insert(var.clone(), value);
        }

        let (command, args) = match &self.local_entry {
            Some(local) => match env.var(&local.path_var) {
                Some(raw) => {
                    let path = local_entry_path(&raw, local)?;
                    debug!("Using local entry point {}", path.display());
                    (local.runner.clone(), vec![path.to_string_lossy().into_owned()])
                }
                None => {
                    warn!(
                        "{} not set, falling back to {} {}",
                        local.path_var,
                        self.command,
                        self.args.join(" ")
                    );
                    (self.command.clone(), self.args.clone())
                }
            },
            None => (self.command.clone(), self.args.clone()),
        };

        Ok(LaunchSpec {
            command,
            args,
            env: vars,
        })
    }

    /// Describe the default command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn from_config(name: &str, custom: &CustomProvider) -> Result<Self> {
        if custom.command.trim().is_empty() {
            return Err(GymmandoError::Config(format!(
                "provider '{}' has no command",
                name
            )));
        }

        let mut env = BTreeMap::new();
        if custom.quiet {
            env.extend(builtin::quiet_env());
        }
        env.extend(custom.env.clone());

        Ok(Self {
            name: name.to_string(),
            summary: "Configured provider".to_string(),
            command: custom.command.clone(),
            args: custom.args.clone(),
            env,
            required_env: custom.required_env.clone(),
            local_entry: None,
            system_prompt: custom.system_prompt.clone(),
            origin: ProviderOrigin::Config,
        })
    }
}

fn local_entry_path(raw: &str, local: &LocalEntry) -> Result<PathBuf> {
    let path = Settings::expand_path(raw);
    if !path.is_file() {
        return Err(GymmandoError::Config(format!(
            "{} points to {}, which does not exist. {}",
            local.path_var,
            path.display(),
            local.install_hint
        )));
    }
    Ok(std::fs::canonicalize(&path)?)
}

/// Built-in and configured providers, with prompt overrides applied.
#[derive(Debug, Clone)]
pub struct Catalogue {
    providers: BTreeMap<String, ProviderDescriptor>,
}

impl Catalogue {
    /// Build the catalogue from settings and prompt templates.
    ///
    /// Configured providers replace built-ins of the same name.
    pub fn new(settings: &Settings, prompts: &Prompts) -> Result<Self> {
        let mut providers: BTreeMap<String, ProviderDescriptor> = builtin::descriptors(prompts)
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        for (name, custom) in &settings.providers {
            let mut descriptor = ProviderDescriptor::from_config(name, custom)?;
            if let Some(prompt) = &descriptor.system_prompt {
                descriptor.system_prompt = Some(prompts.render_with_custom(prompt));
            }
            providers.insert(name.clone(), descriptor);
        }

        for (name, prompt) in &settings.prompts.overrides {
            match providers.get_mut(name) {
                Some(descriptor) => {
                    descriptor.system_prompt = Some(prompts.render_with_custom(prompt))
                }
                None => warn!("Prompt override for unknown provider '{}'", name),
            }
        }

        Ok(Self { providers })
    }

    /// Look up a provider by name.
    pub fn resolve(&self, name: &str) -> Result<&ProviderDescriptor> {
        self.providers
            .get(name)
            .ok_or_else(|| GymmandoError::UnknownProvider(name.to_string()))
    }

    /// All providers, ordered by name.
    pub fn list(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values()
    }
}
