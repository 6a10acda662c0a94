//! System prompt templates for Gymmando.
//!
//! Prompts can be customized by placing a `prompts.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// System instruction for the fitness web-search provider.
    pub fitness: String,
    /// System instruction for the nutrition database provider.
    pub nutrition: String,
    /// User message sent by `gymmando ping`.
    pub ping: String,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            fitness: "You should only answer queries related to exercises, workouts, and fitness. \
                Do not answer any query not related to exercises."
                .to_string(),
            nutrition: "You should only answer queries related to nutrition, food, and health. \
                Do not answer any query not related to nutrition."
                .to_string(),
            ping: "Say '{{app}} is working!' if you can read this.".to_string(),
            variables: HashMap::new(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let path = PathBuf::from(shellexpand::tilde(dir).to_string()).join("prompts.toml");
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                prompts = toml::from_str(&content)?;
            }
        }

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }
        prompts
            .variables
            .entry("app".to_string())
            .or_insert_with(|| env!("CARGO_PKG_NAME").to_string());

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a template using the configured custom variables.
    pub fn render_with_custom(&self, template: &str) -> String {
        Self::render(template, &self.variables)
    }

    /// The rendered connection-test message.
    pub fn ping_message(&self) -> String {
        self.render_with_custom(&self.ping)
    }
}
