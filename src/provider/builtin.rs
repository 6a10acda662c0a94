//! Bundled provider descriptors.

use super::{LocalEntry, ProviderDescriptor, ProviderOrigin};
use crate::config::Prompts;
use std::collections::BTreeMap;

/// Log-suppression flags for Node-based providers.
const QUIET_ENV: &[(&str, &str)] = &[
    ("NODE_ENV", "production"),
    ("LOG_LEVEL", "silent"),
    ("SILENT", "1"),
];

pub(super) fn quiet_env() -> BTreeMap<String, String> {
    QUIET_ENV
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(super) fn descriptors(prompts: &Prompts) -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor {
            name: "youtube".to_string(),
            summary: "YouTube video search".to_string(),
            command: "npx".to_string(),
            args: strings(&["-y", "yt-mcp"]),
            env: BTreeMap::new(),
            required_env: strings(&["YOUTUBE_API_KEY"]),
            local_entry: None,
            system_prompt: None,
            origin: ProviderOrigin::BuiltIn,
        },
        ProviderDescriptor {
            name: "websearch".to_string(),
            summary: "Open web search, no API key".to_string(),
            command: "npx".to_string(),
            args: strings(&["--quiet", "open-websearch"]),
            env: quiet_env(),
            required_env: Vec::new(),
            local_entry: None,
            system_prompt: None,
            origin: ProviderOrigin::BuiltIn,
        },
        ProviderDescriptor {
            name: "tavily".to_string(),
            summary: "Tavily web search, restricted to fitness".to_string(),
            command: "npx".to_string(),
            args: strings(&["--quiet", "-y", "tavily-mcp@latest"]),
            env: quiet_env(),
            required_env: strings(&["TAVILY_API_KEY"]),
            local_entry: None,
            system_prompt: Some(prompts.render_with_custom(&prompts.fitness)),
            origin: ProviderOrigin::BuiltIn,
        },
        ProviderDescriptor {
            name: "nutrition".to_string(),
            summary: "OpenNutrition food database".to_string(),
            command: "npx".to_string(),
            args: strings(&["--quiet", "-y", "github:deadletterq/mcp-opennutrition"]),
            env: quiet_env(),
            required_env: Vec::new(),
            local_entry: Some(LocalEntry {
                path_var: "OPENNUTRITION_MCP_PATH".to_string(),
                runner: "node".to_string(),
                install_hint: "Install it with: git clone https://github.com/deadletterq/mcp-opennutrition.git \
                    && cd mcp-opennutrition && npm install && npm run build, then point \
                    OPENNUTRITION_MCP_PATH at build/index.js"
                    .to_string(),
            }),
            system_prompt: Some(prompts.render_with_custom(&prompts.nutrition)),
            origin: ProviderOrigin::BuiltIn,
        },
    ]
}
