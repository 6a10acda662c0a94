//! Ping command: one model turn, no tools.

use crate::cli::preflight::{self, Operation};
use crate::cli::{AppContext, Output};
use crate::llm::{create_backend, ChatRequest, Transcript};
use anyhow::Result;

/// Check that the configured chat model answers.
pub async fn run_ping(ctx: &AppContext) -> Result<()> {
    preflight::check(Operation::Ping, &ctx.settings, ctx.env())?;

    let backend = create_backend(&ctx.settings.chat, ctx.env())?;

    let mut transcript = Transcript::new();
    transcript.push_user_text(ctx.prompts.ping_message());

    let spinner = Output::spinner(&format!("Contacting {}...", backend.model()));
    let result = backend
        .respond(ChatRequest {
            transcript: &transcript,
            tools: &[],
            system: None,
        })
        .await;
    spinner.finish_and_clear();

    let response = result?;
    Output::kv("backend", &ctx.settings.chat.backend.to_string());
    Output::kv("model", backend.model());
    Output::kv(
        "tokens",
        &format!("{} in, {} out", response.usage.input_tokens, response.usage.output_tokens),
    );
    println!();
    Output::answer(response.first_text().unwrap_or_default());
    Ok(())
}
