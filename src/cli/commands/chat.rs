//! Interactive query loop.

use crate::cli::preflight::{self, Operation};
use crate::cli::{AppContext, Output};
use anyhow::Result;
use console::style;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Line that ends the loop.
const QUIT: &str = "q";

/// Read queries from stdin until `q` or EOF. Every line runs a fresh session.
///
/// A failed session ends the loop and the command exits non-zero.
pub async fn run_chat(provider: &str, ctx: &AppContext) -> Result<()> {
    let descriptor = ctx.provider(provider)?;

    if let Err(e) = preflight::check(Operation::Ask(descriptor), &ctx.settings, ctx.env()) {
        Output::error(&format!("{}", e));
        Output::info("Run 'gymmando doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let session = ctx.session(descriptor)?;
    let session = &session;

    println!(
        "\n{} {}",
        style("Gymmando").bold().cyan(),
        style(format!("({})", descriptor.name)).dim()
    );
    println!("{}\n", style(format!("Type your questions, or '{}' to quit.", QUIT)).dim());

    chat_loop(BufReader::new(tokio::io::stdin()), move |query| async move {
        session.run(&query).await
    })
    .await?;

    Output::info("Goodbye!");
    Ok(())
}

/// Feed non-empty lines to `ask` until `q` or EOF. Returns the number answered.
async fn chat_loop<R, F, Fut>(reader: R, mut ask: F) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = crate::Result<String>>,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    loop {
        eprint!("{} ", style("You:").green().bold());

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input == QUIT {
            break;
        }

        let spinner = Output::spinner("Thinking...");
        let result = ask(input.to_string()).await;
        spinner.finish_and_clear();

        let answer = result?;
        println!();
        Output::answer(&answer);
        println!();
        answered += 1;
    }

    Ok(answered)
}
