//! Conversation types shared by every chat backend.

use crate::error::{GymmandoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One block of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },

    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    /// The provider's answer to a [`ContentBlock::ToolUse`] with the same id.
    ToolResult {
        tool_use_id: String,
        /// Content items exactly as returned by the tool provider.
        content: Vec<Value>,
        #[serde(default, skip_serializing_if = "is_false")]
        is_error: bool,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Content of a transcript turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single transcript turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    /// Iterate the blocks of this turn. Plain-text turns yield nothing.
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            TurnContent::Blocks(blocks) => blocks,
            TurnContent::Text(_) => &[],
        }
    }
}

/// A tool invocation extracted from a model response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A provider's result for one [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub tool_use_id: String,
    pub content: Vec<Value>,
    pub is_error: bool,
}

impl From<ToolInvocationResult> for ContentBlock {
    fn from(result: ToolInvocationResult) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: result.tool_use_id,
            content: result.content,
            is_error: result.is_error,
        }
    }
}

/// Ordered conversation state exchanged with the model.
///
/// Append-only. Every tool request must be answered by exactly one tool
/// result before the transcript is sent to the model again.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain-text user turn.
    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        });
    }

    /// Append a model response as one assistant turn.
    pub fn push_assistant(&mut self, blocks: Vec<ContentBlock>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: TurnContent::Blocks(blocks),
        });
    }

    /// Append a user turn carrying one tool result.
    pub fn push_tool_result(&mut self, result: ToolInvocationResult) {
        self.turns.push(Turn {
            role: Role::User,
            content: TurnContent::Blocks(vec![result.into()]),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Count tool-result blocks in the transcript.
    pub fn tool_result_count(&self) -> usize {
        self.turns
            .iter()
            .flat_map(Turn::blocks)
            .filter(|b| matches!(b, ContentBlock::ToolResult { .. }))
            .count()
    }

    /// Verify that every tool request has exactly one matching result.
    pub fn ensure_resolved(&self) -> Result<()> {
        let mut pending: Vec<&str> = Vec::new();
        let mut answered: Vec<&str> = Vec::new();

        for block in self.turns.iter().flat_map(Turn::blocks) {
            match block {
                ContentBlock::ToolUse { id, .. } => pending.push(id),
                ContentBlock::ToolResult { tool_use_id, .. } => {
                    match pending.iter().position(|p| *p == tool_use_id.as_str()) {
                        Some(pos) => {
                            answered.push(pending.remove(pos));
                        }
                        None if answered.contains(&tool_use_id.as_str()) => {
                            return Err(GymmandoError::Session(format!(
                                "tool request {} was answered more than once",
                                tool_use_id
                            )));
                        }
                        None => {
                            return Err(GymmandoError::Session(format!(
                                "tool result {} has no matching request",
                                tool_use_id
                            )));
                        }
                    }
                }
                ContentBlock::Text { .. } => {}
            }
        }

        if pending.is_empty() {
            Ok(())
        } else {
            Err(GymmandoError::Session(format!(
                "tool request(s) without a result: {}",
                pending.join(", ")
            )))
        }
    }
}

/// Tool-menu entry sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Why the model ended its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    ToolUse,
    EndTurn,
    MaxTokens,
    StopSequence,
    Other(String),
}

impl StopReason {
    pub fn is_tool_use(&self) -> bool {
        matches!(self, StopReason::ToolUse)
    }
}

impl From<&str> for StopReason {
    fn from(value: &str) -> Self {
        match value {
            "tool_use" => StopReason::ToolUse,
            "end_turn" => StopReason::EndTurn,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Token accounting for a model turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// One model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub stop_reason: StopReason,
    pub content: Vec<ContentBlock>,
    pub usage: TokenUsage,
}

impl ModelResponse {
    /// A text-only response that ends the turn.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::EndTurn,
            content: vec![ContentBlock::Text { text: text.into() }],
            usage: TokenUsage::default(),
        }
    }

    /// All tool invocations in the response, in order.
    pub fn tool_requests(&self) -> Vec<ToolInvocation> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The first non-empty text block.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } if !text.is_empty() => Some(text.as_str()),
            _ => None,
        })
    }
}
