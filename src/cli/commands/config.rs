//! Config command implementation.

use crate::cli::{AppContext, ConfigAction};
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, ctx: &AppContext) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&ctx.settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", ctx.config_path.display());
        }
    }

    Ok(())
}
