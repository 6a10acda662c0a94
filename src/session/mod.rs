//! Tool-augmented chat sessions.
//!
//! Connects a hosted chat model to a tool provider subprocess and relays
//! tool calls between them until the model produces a final answer.

mod runner;

pub use runner::{SessionReport, ToolCallRecord, ToolSession};
