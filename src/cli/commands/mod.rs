//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod ping;
mod providers;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ping::run_ping;
pub use providers::run_providers;
pub use tools::run_tools;
