//! CLI module for Gymmando.

pub mod commands;
mod context;
mod output;
pub mod preflight;

pub use context::AppContext;
pub use output::Output;

use crate::config::ChatBackendKind;
use clap::{Parser, Subcommand};

/// Gymmando - chat with tool-providing MCP servers
///
/// Starts a tool provider subprocess, hands its tools to a hosted chat model
/// and relays tool calls until the model answers.
#[derive(Parser, Debug)]
#[command(name = "gymmando")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Chat backend to use (anthropic, openai)
    #[arg(long, global = true)]
    pub backend: Option<ChatBackendKind>,

    /// Model to use instead of the configured one
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question using a tool provider
    Ask {
        /// Provider name (see 'gymmando providers')
        provider: String,

        /// The question to ask
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Start an interactive loop; each line is a fresh query ('q' to quit)
    Chat {
        /// Provider name
        provider: String,
    },

    /// Start a provider and list the tools it offers
    Tools {
        /// Provider name
        provider: String,
    },

    /// List available providers
    Providers,

    /// Check that the chat model is reachable
    Ping,

    /// Check credentials and required binaries
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
