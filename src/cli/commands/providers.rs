//! Providers command.

use crate::cli::{AppContext, Output};
use crate::provider::ProviderDescriptor;
use anyhow::Result;
use console::style;

/// List built-in and configured providers.
pub fn run_providers(ctx: &AppContext) -> Result<()> {
    Output::header("Providers");

    for descriptor in ctx.catalogue.list() {
        println!(
            "\n  {} {} {}",
            style(&descriptor.name).bold(),
            style(format!("[{}]", descriptor.origin)).dim(),
            descriptor.summary
        );
        Output::kv("command", &descriptor.command_line());

        for var in &descriptor.required_env {
            let status = if ctx.env().var(var).is_some() {
                style("set").green()
            } else {
                style("missing").red()
            };
            Output::kv("requires", &format!("{} ({})", var, status));
        }

        if let Some(local) = &descriptor.local_entry {
            Output::kv("local", &format!("{} <${}>", local.runner, local.path_var));
        }

        if let Some(prompt) = &descriptor.system_prompt {
            Output::kv("system", &crate::cli::output::one_line(prompt, 80));
        }
    }

    println!();
    Ok(())
}

/// Whether every required variable for a provider is set.
pub fn credentials_ready(descriptor: &ProviderDescriptor, ctx: &AppContext) -> bool {
    descriptor
        .required_env
        .iter()
        .all(|var| ctx.env().var(var).is_some())
}
