//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{AppContext, Output};
use anyhow::Result;
use tracing::info;

/// Run one query against a provider and print the answer.
pub async fn run_ask(provider: &str, query: &[String], ctx: &AppContext) -> Result<()> {
    let descriptor = ctx.provider(provider)?;

    if let Err(e) = preflight::check(Operation::Ask(descriptor), &ctx.settings, ctx.env()) {
        Output::error(&format!("{}", e));
        Output::info("Run 'gymmando doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let question = query.join(" ");
    let session = ctx.session(descriptor)?;

    let spinner = Output::spinner(&format!("Asking with {} tools...", descriptor.name));
    let result = session.run_detailed(&question).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            info!(
                model_turns = report.model_turns,
                tool_calls = report.tool_calls.len(),
                input_tokens = report.usage.input_tokens,
                output_tokens = report.usage.output_tokens,
                "Session finished"
            );
            for call in &report.tool_calls {
                Output::note(&format!("  tool: {}", call));
            }
            println!();
            Output::answer(&report.answer);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to get an answer: {}", e));
            Err(e.into())
        }
    }
}
