//! Anthropic Messages API backend.

use super::types::{ContentBlock, ModelResponse, StopReason, TokenUsage, Transcript, TurnContent};
use super::{ChatBackend, ChatRequest};
use crate::config::ChatSettings;
use crate::error::{GymmandoError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Chat backend for the Anthropic Messages API.
pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    content: Vec<Value>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl AnthropicBackend {
    /// Create a backend from an API key and chat settings.
    pub fn new(api_key: impl Into<String>, settings: &ChatSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            api_base: settings
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: settings.resolved_model(),
            max_tokens: settings.max_tokens,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }

    /// Build the JSON request body for the Messages API.
    pub(crate) fn build_request_body(&self, request: &ChatRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": wire_messages(request.transcript),
        });

        if let Some(system) = request.system {
            body["system"] = json!(system);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }

        body
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    #[instrument(skip(self, request), fields(model = %self.model, turns = request.transcript.len()))]
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ModelResponse> {
        let body = self.build_request_body(&request);

        debug!(tools = request.tools.len(), "Messages API request");

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(500).collect::<String>();
            return Err(GymmandoError::ChatApi(format!("HTTP {}: {}", status, text)));
        }

        let json: Value = response.json().await?;
        parse_response(json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parse a non-streaming Messages API response.
pub(crate) fn parse_response(json: Value) -> Result<ModelResponse> {
    let wire: WireResponse = serde_json::from_value(json)
        .map_err(|e| GymmandoError::ChatApi(format!("Unexpected response shape: {}", e)))?;

    let content = wire
        .content
        .into_iter()
        .filter_map(|block| match serde_json::from_value::<ContentBlock>(block.clone()) {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                debug!(block_type = ?block.get("type"), "Skipping unsupported content block");
                None
            }
        })
        .collect();

    let usage = wire
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        stop_reason: wire
            .stop_reason
            .as_deref()
            .map(StopReason::from)
            .unwrap_or(StopReason::EndTurn),
        content,
        usage,
    })
}

fn wire_messages(transcript: &Transcript) -> Vec<Value> {
    transcript
        .turns()
        .iter()
        .map(|turn| {
            let content = match &turn.content {
                TurnContent::Text(text) => json!(text),
                TurnContent::Blocks(blocks) => Value::Array(blocks.iter().map(wire_block).collect()),
            };
            json!({ "role": turn.role.as_str(), "content": content })
        })
        .collect()
}

fn wire_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::ToolUse { id, name, input } => json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let mut value = json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": content.iter().map(wire_tool_content).collect::<Vec<_>>(),
            });
            if *is_error {
                value["is_error"] = json!(true);
            }
            value
        }
    }
}

/// Convert one MCP content item into a Messages API tool-result block.
fn wire_tool_content(item: &Value) -> Value {
    match item.get("type").and_then(Value::as_str) {
        Some("text") => json!({
            "type": "text",
            "text": item.get("text").and_then(Value::as_str).unwrap_or_default(),
        }),
        Some("image") => match (
            item.get("data").and_then(Value::as_str),
            item.get("mimeType").and_then(Value::as_str),
        ) {
            (Some(data), Some(mime)) => json!({
                "type": "image",
                "source": { "type": "base64", "media_type": mime, "data": data },
            }),
            _ => json!({ "type": "text", "text": item.to_string() }),
        },
        // Resources and anything newer travel as their JSON text
        _ => json!({ "type": "text", "text": item.to_string() }),
    }
}
