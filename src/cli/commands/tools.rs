//! Tools command: start a provider and list what it offers.

use crate::cli::output::one_line;
use crate::cli::preflight::{self, Operation};
use crate::cli::{AppContext, Output};
use crate::mcp::{Launcher, ToolDescriptor};
use anyhow::Result;
use console::style;
use tracing::warn;

/// Run the tools command.
pub async fn run_tools(provider: &str, ctx: &AppContext) -> Result<()> {
    let descriptor = ctx.provider(provider)?;
    preflight::check(Operation::Tools(descriptor), &ctx.settings, ctx.env())?;

    let spec = descriptor.launch_spec(ctx.env())?;

    let spinner = Output::spinner(&format!("Starting {}...", descriptor.name));
    let launched = ctx.launcher().launch(&spec).await;
    let mut client = match launched {
        Ok(client) => client,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    let tools = client.discover().await;
    spinner.finish_and_clear();
    if let Err(e) = client.shutdown().await {
        warn!("Provider shutdown failed: {}", e);
    }
    let tools = tools?;

    Output::header(&format!("{} ({} tools)", descriptor.name, tools.len()));
    for tool in &tools {
        print_tool(tool);
    }

    Ok(())
}

fn print_tool(tool: &ToolDescriptor) {
    let description = tool.description.as_deref().map(|d| one_line(d, 100)).unwrap_or_default();
    println!("  {} {}", style(&tool.name).bold(), style(description).dim());

    let required = required_fields(tool);
    if !required.is_empty() {
        println!("    {} {}", style("requires:").dim(), required.join(", "));
    }
}

fn required_fields(tool: &ToolDescriptor) -> Vec<String> {
    tool.input_schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
