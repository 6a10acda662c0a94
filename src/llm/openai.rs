//! OpenAI chat completions backend.

use super::types::{
    ContentBlock, ModelResponse, Role, StopReason, TokenUsage, Transcript, TurnContent,
};
use super::{ChatBackend, ChatRequest, ToolSpec};
use crate::config::ChatSettings;
use crate::error::{GymmandoError, Result};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseMessage, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionObject,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// Chat backend for OpenAI chat completions.
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIBackend {
    /// Create a backend from an API key and chat settings.
    pub fn new(api_key: impl AsRef<str>, settings: &ChatSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(api_key.as_ref(), Duration::from_secs(settings.timeout_secs))?,
            model: settings.resolved_model(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    #[instrument(skip(self, request), fields(model = %self.model, turns = request.transcript.len()))]
    async fn respond(&self, request: ChatRequest<'_>) -> Result<ModelResponse> {
        let messages = build_messages(request.transcript, request.system)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !request.tools.is_empty() {
            args.tools(tool_definitions(request.tools));
        }
        let completion = args.build().map_err(|e| GymmandoError::OpenAI(e.to_string()))?;

        debug!(tools = request.tools.len(), "Chat completion request");

        let response = self
            .client
            .chat()
            .create(completion)
            .await
            .map_err(|e| GymmandoError::OpenAI(format!("Chat API error: {}", e)))?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens as u64,
                output_tokens: u.completion_tokens as u64,
            })
            .unwrap_or_default();

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GymmandoError::OpenAI("No response from model".to_string()))?;

        let mut parsed = parse_choice(choice.message, choice.finish_reason)?;
        parsed.usage = usage;
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI client with a request timeout on the underlying HTTP client.
fn create_client(api_key: &str, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Client::with_config(OpenAIConfig::new().with_api_key(api_key)).with_http_client(http_client))
}

/// Translate the tool menu into OpenAI function tools.
fn tool_definitions(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Translate the transcript into chat completion messages.
fn build_messages(
    transcript: &Transcript,
    system: Option<&str>,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let err = |e: async_openai::error::OpenAIError| GymmandoError::OpenAI(e.to_string());
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

    if let Some(system) = system {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(err)?
                .into(),
        );
    }

    for turn in transcript.turns() {
        match (&turn.role, &turn.content) {
            (Role::User, TurnContent::Text(text)) => {
                messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text.as_str())
                        .build()
                        .map_err(err)?
                        .into(),
                );
            }
            (Role::Assistant, TurnContent::Text(text)) => {
                messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(text.as_str())
                        .build()
                        .map_err(err)?
                        .into(),
                );
            }
            (Role::Assistant, TurnContent::Blocks(blocks)) => {
                let text = joined_text(blocks);
                let tool_calls: Vec<ChatCompletionMessageToolCall> = blocks
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { id, name, input } => Some(ChatCompletionMessageToolCall {
                            id: id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: name.clone(),
                                arguments: input.to_string(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();

                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    builder.content(text);
                }
                if !tool_calls.is_empty() {
                    builder.tool_calls(tool_calls);
                }
                messages.push(builder.build().map_err(err)?.into());
            }
            (Role::User, TurnContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => {
                            messages.push(
                                ChatCompletionRequestToolMessageArgs::default()
                                    .tool_call_id(tool_use_id.as_str())
                                    .content(tool_result_text(content, *is_error))
                                    .build()
                                    .map_err(err)?
                                    .into(),
                            );
                        }
                        ContentBlock::Text { text } => {
                            messages.push(
                                ChatCompletionRequestUserMessageArgs::default()
                                    .content(text.as_str())
                                    .build()
                                    .map_err(err)?
                                    .into(),
                            );
                        }
                        ContentBlock::ToolUse { .. } => {
                            return Err(GymmandoError::Session(
                                "user turn contains a tool request".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    Ok(messages)
}

fn joined_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten MCP content items into the plain string a tool message carries.
fn tool_result_text(content: &[Value], is_error: bool) -> String {
    let body = content
        .iter()
        .map(|item| match (item.get("type").and_then(Value::as_str), item.get("text")) {
            (Some("text"), Some(Value::String(text))) => text.clone(),
            _ => item.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n");

    if is_error {
        format!("Tool error: {}", body)
    } else {
        body
    }
}

/// Translate the first completion choice into a model turn.
fn parse_choice(
    message: ChatCompletionResponseMessage,
    finish_reason: Option<FinishReason>,
) -> Result<ModelResponse> {
    let mut content = Vec::new();

    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        content.push(ContentBlock::Text { text });
    }

    for call in message.tool_calls.unwrap_or_default() {
        let input: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                GymmandoError::OpenAI(format!(
                    "Invalid arguments for tool {}: {}",
                    call.function.name, e
                ))
            })?
        };
        content.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    let has_tool_calls = content
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

    let stop_reason = match finish_reason {
        Some(FinishReason::ToolCalls) => StopReason::ToolUse,
        _ if has_tool_calls => StopReason::ToolUse,
        Some(FinishReason::Length) => StopReason::MaxTokens,
        Some(FinishReason::Stop) | None => StopReason::EndTurn,
        Some(other) => StopReason::Other(format!("{:?}", other)),
    };

    Ok(ModelResponse {
        stop_reason,
        content,
        usage: TokenUsage::default(),
    })
}
