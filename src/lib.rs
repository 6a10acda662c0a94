//! Gymmando - tool-augmented chat over MCP
//!
//! Connects a hosted chat model to an external tool-provider subprocess that
//! speaks MCP (JSON-RPC 2.0 over newline-delimited stdio) and relays tool
//! calls between the two until the model produces a final answer.
//!
//! # Overview
//!
//! Gymmando lets you:
//! - Ask questions answered with YouTube search, web search or a nutrition database
//! - Plug in any MCP server that talks over stdio
//! - Run against the Anthropic Messages API or OpenAI chat completions
//!
//! # Architecture
//!
//! - `config` - Configuration management and prompt templates
//! - `env` - Environment variable access
//! - `mcp` - MCP client for tool-provider subprocesses
//! - `llm` - Hosted chat model backends
//! - `provider` - Provider catalogue and launch descriptors
//! - `session` - The tool dispatch loop
//! - `cli` - Command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use gymmando::config::{Prompts, Settings};
//! use gymmando::env::ProcessEnv;
//! use gymmando::llm::create_backend;
//! use gymmando::mcp::StdioLauncher;
//! use gymmando::provider::Catalogue;
//! use gymmando::session::ToolSession;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let prompts = Prompts::load(None, None)?;
//!     let catalogue = Catalogue::new(&settings, &prompts)?;
//!
//!     let backend = create_backend(&settings.chat, &ProcessEnv)?;
//!     let session = ToolSession::new(
//!         catalogue.resolve("websearch")?.clone(),
//!         Arc::from(backend),
//!         Arc::new(StdioLauncher::default()),
//!     );
//!
//!     println!("{}", session.run("What is progressive overload?").await?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod provider;
pub mod session;

pub use error::{GymmandoError, Result};
