//! Tool-augmented chat session.

use crate::env::{Environment, ProcessEnv};
use crate::error::{GymmandoError, Result};
use crate::llm::{
    ChatBackend, ChatRequest, TokenUsage, ToolInvocationResult, ToolSpec, Transcript,
};
use crate::mcp::{Launcher, ToolProvider};
use crate::provider::ProviderDescriptor;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where a session is in its conversation with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingFirstModelTurn,
    ToolRequested,
    AwaitingToolResult,
    AwaitingNextModelTurn,
    Done,
}

/// One query against one tool provider.
///
/// Each call to [`run`](Self::run) launches a fresh provider, relays tool
/// calls between it and the model until the model answers, and shuts the
/// provider down again.
pub struct ToolSession {
    provider: ProviderDescriptor,
    backend: Arc<dyn ChatBackend>,
    launcher: Arc<dyn Launcher>,
    env: Arc<dyn Environment>,
    system_prompt: Option<String>,
    max_tool_rounds: Option<usize>,
}

impl ToolSession {
    /// Create a session for a provider. The provider's system prompt is used by default.
    pub fn new(
        provider: ProviderDescriptor,
        backend: Arc<dyn ChatBackend>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let system_prompt = provider.system_prompt.clone();
        Self {
            provider,
            backend,
            launcher,
            env: Arc::new(ProcessEnv),
            system_prompt,
            max_tool_rounds: None,
        }
    }

    /// Resolve credentials from a different environment.
    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    /// Replace the system instruction.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Cap the number of tool rounds. `None` means unbounded.
    pub fn with_max_tool_rounds(mut self, max: Option<usize>) -> Self {
        self.max_tool_rounds = max;
        self
    }

    /// Run a query and return the model's final answer.
    ///
    /// The answer is empty when the final model turn has no text.
    pub async fn run(&self, user_message: &str) -> Result<String> {
        Ok(self.run_detailed(user_message).await?.answer)
    }

    /// Run a query and return the answer with the full conversation record.
    #[instrument(
        skip(self, user_message),
        fields(provider = %self.provider.name, session = %uuid::Uuid::new_v4())
    )]
    pub async fn run_detailed(&self, user_message: &str) -> Result<SessionReport> {
        let spec = self.provider.launch_spec(self.env.as_ref())?;

        info!("Launching provider: {} {}", spec.command, spec.args.join(" "));
        let mut provider = self.launcher.launch(&spec).await?;

        let outcome = self.converse(provider.as_mut(), user_message).await;

        match (outcome, provider.shutdown().await) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(report), Err(e)) => {
                warn!("Provider shutdown failed: {}", e);
                Ok(report)
            }
            (Err(e), Err(shutdown_err)) => {
                debug!("Provider shutdown after failure also failed: {}", shutdown_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
        }
    }

    async fn converse(
        &self,
        provider: &mut dyn ToolProvider,
        user_message: &str,
    ) -> Result<SessionReport> {
        let tools: Vec<ToolSpec> = provider.discover().await?.iter().map(ToolSpec::from).collect();
        info!("Discovered {} tools", tools.len());
        debug!(
            "Tools: {}",
            tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut transcript = Transcript::new();
        transcript.push_user_text(user_message);

        let mut phase = Phase::AwaitingFirstModelTurn;
        let mut model_turns = 0;
        let mut rounds = 0;
        let mut usage = TokenUsage::default();
        let mut tool_calls = Vec::new();

        loop {
            transcript.ensure_resolved()?;

            let response = self
                .backend
                .respond(ChatRequest {
                    transcript: &transcript,
                    tools: &tools,
                    system: self.system_prompt.as_deref(),
                })
                .await?;
            model_turns += 1;
            usage += response.usage;
            debug!(?phase, stop_reason = ?response.stop_reason, "Model turn {}", model_turns);

            if !response.stop_reason.is_tool_use() {
                phase = Phase::Done;
                debug!(?phase, "Conversation finished");
                let answer = response.first_text().unwrap_or_default().to_string();
                return Ok(SessionReport {
                    answer,
                    transcript,
                    model_turns,
                    tool_calls,
                    usage,
                });
            }

            phase = Phase::ToolRequested;
            let requests = response.tool_requests();
            if requests.is_empty() {
                return Err(GymmandoError::Session(
                    "model stopped for tool use without requesting a tool".to_string(),
                ));
            }
            debug!(?phase, "{} tool request(s)", requests.len());
            if let Some(max) = self.max_tool_rounds {
                if rounds >= max {
                    return Err(GymmandoError::ToolLoop(max));
                }
            }
            rounds += 1;

            transcript.push_assistant(response.content);

            phase = Phase::AwaitingToolResult;
            for request in requests {
                info!("Calling tool {} with {}", request.name, request.input);
                let output = provider.invoke(&request.name, &request.input).await?;
                let is_error = output.is_error.unwrap_or(false);
                if is_error {
                    warn!("Tool {} reported an error", request.name);
                }

                tool_calls.push(ToolCallRecord {
                    name: request.name,
                    input: request.input,
                    is_error,
                });
                transcript.push_tool_result(ToolInvocationResult {
                    tool_use_id: request.id,
                    content: output.content,
                    is_error,
                });
            }
            debug!(?phase, "Tool round {} complete", rounds);
            phase = Phase::AwaitingNextModelTurn;
        }
    }
}

/// Outcome of a session run.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The model's final answer (may be empty).
    pub answer: String,
    /// Every turn sent to the model. The final response is not included.
    pub transcript: Transcript,
    /// Number of model turns requested.
    pub model_turns: usize,
    /// Tool calls in the order they were made.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tokens used across all model turns.
    pub usage: TokenUsage,
}

/// Record of a tool call made during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: Value,
    /// Whether the provider flagged the result as an error.
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentBlock, ModelResponse, StopReason};
    use crate::mcp::{ToolCallResult, ToolDescriptor};
    use crate::provider::{LaunchSpec, ProviderOrigin};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Chat backend that replays scripted responses.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<ModelResponse>>>,
        seen: Mutex<Vec<(Transcript, Vec<ToolSpec>, Option<String>)>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<ModelResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn respond(&self, request: ChatRequest<'_>) -> Result<ModelResponse> {
            self.seen.lock().unwrap().push((
                request.transcript.clone(),
                request.tools.to_vec(),
                request.system.map(str::to_string),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GymmandoError::ChatApi("script exhausted".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        shutdowns: AtomicUsize,
        invocations: Mutex<Vec<(String, Value)>>,
    }

    struct FakeProvider {
        tools: Vec<ToolDescriptor>,
        results: HashMap<String, std::result::Result<ToolCallResult, (i64, String)>>,
        counters: Arc<Counters>,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl ToolProvider for FakeProvider {
        async fn discover(&mut self) -> Result<Vec<ToolDescriptor>> {
            Ok(self.tools.clone())
        }

        async fn invoke(&mut self, name: &str, input: &Value) -> Result<ToolCallResult> {
            self.counters
                .invocations
                .lock()
                .unwrap()
                .push((name.to_string(), input.clone()));
            match self.results.get(name) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err((code, message))) => Err(GymmandoError::Provider {
                    code: *code,
                    message: message.clone(),
                }),
                None => Err(GymmandoError::Provider {
                    code: -32602,
                    message: format!("Unknown tool: {}", name),
                }),
            }
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(GymmandoError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "provider already gone",
                )));
            }
            Ok(())
        }
    }

    struct FakeLauncher {
        tools: Vec<ToolDescriptor>,
        results: HashMap<String, std::result::Result<ToolCallResult, (i64, String)>>,
        counters: Arc<Counters>,
        specs: Mutex<Vec<LaunchSpec>>,
        fail_shutdown: bool,
    }

    impl FakeLauncher {
        fn new() -> Self {
            Self {
                tools: Vec::new(),
                results: HashMap::new(),
                counters: Arc::new(Counters::default()),
                specs: Mutex::new(Vec::new()),
                fail_shutdown: false,
            }
        }

        fn failing_shutdown(mut self) -> Self {
            self.fail_shutdown = true;
            self
        }

        fn with_tool(mut self, name: &str, result: std::result::Result<ToolCallResult, (i64, String)>) -> Self {
            self.tools.push(ToolDescriptor {
                name: name.to_string(),
                description: Some(format!("The {} tool", name)),
                input_schema: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
            });
            self.results.insert(name.to_string(), result);
            self
        }

        fn launches(&self) -> usize {
            self.counters.launches.load(Ordering::SeqCst)
        }

        fn shutdowns(&self) -> usize {
            self.counters.shutdowns.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Launcher for FakeLauncher {
        async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ToolProvider>> {
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            self.specs.lock().unwrap().push(spec.clone());
            Ok(Box::new(FakeProvider {
                tools: self.tools.clone(),
                results: self.results.clone(),
                counters: self.counters.clone(),
                fail_shutdown: self.fail_shutdown,
            }))
        }
    }

    fn descriptor(required_env: &[&str]) -> ProviderDescriptor {
        ProviderDescriptor {
            name: "fake".to_string(),
            summary: "Test provider".to_string(),
            command: "fake-mcp".to_string(),
            args: vec!["--stdio".to_string()],
            env: BTreeMap::new(),
            required_env: required_env.iter().map(|s| s.to_string()).collect(),
            local_entry: None,
            system_prompt: Some("Only answer test questions.".to_string()),
            origin: ProviderOrigin::Config,
        }
    }

    fn session(
        descriptor: ProviderDescriptor,
        backend: Arc<ScriptedBackend>,
        launcher: Arc<FakeLauncher>,
    ) -> ToolSession {
        ToolSession::new(descriptor, backend, launcher)
            .with_environment(Arc::new(HashMap::<String, String>::new()))
    }

    fn tool_use(calls: &[(&str, &str, Value)]) -> ModelResponse {
        ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: calls
                .iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        }
    }

    fn text_result(text: &str) -> ToolCallResult {
        ToolCallResult {
            content: vec![json!({"type": "text", "text": text})],
            is_error: None,
        }
    }

    #[tokio::test]
    async fn test_plain_answer_without_tools() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text("pong"))]);
        let launcher = Arc::new(FakeLauncher::new());

        let report = assert_ok!(
            session(descriptor(&[]), backend.clone(), launcher.clone())
                .run_detailed("ping")
                .await
        );

        assert_eq!(report.answer, "pong");
        assert_eq!(report.model_turns, 1);
        assert!(report.tool_calls.is_empty());
        assert_eq!(report.transcript.len(), 1);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.shutdowns(), 1);

        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].1.is_empty());
        assert_eq!(seen[0].2.as_deref(), Some("Only answer test questions."));
    }

    #[tokio::test]
    async fn test_single_tool_round() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_use(&[("t1", "lookup", json!({"q": "x"}))])),
            Ok(ModelResponse::text("42")),
        ]);
        let launcher = Arc::new(FakeLauncher::new().with_tool(
            "lookup",
            Ok(ToolCallResult {
                content: vec![json!({"type": "text", "text": "{\"value\":42}"})],
                is_error: None,
            }),
        ));

        let report = assert_ok!(
            session(descriptor(&[]), backend.clone(), launcher.clone())
                .run_detailed("what is x?")
                .await
        );

        assert_eq!(report.answer, "42");
        assert_eq!(report.model_turns, 2);
        assert_eq!(report.transcript.len(), 3);
        assert_eq!(report.transcript.tool_result_count(), 1);
        assert_eq!(report.usage.input_tokens, 10);
        assert_eq!(
            report.tool_calls,
            vec![ToolCallRecord {
                name: "lookup".to_string(),
                input: json!({"q": "x"}),
                is_error: false,
            }]
        );
        assert_eq!(
            *launcher.counters.invocations.lock().unwrap(),
            vec![("lookup".to_string(), json!({"q": "x"}))]
        );

        // Tool menu is forwarded unchanged, and the second turn sees the result
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1[0].name, "lookup");
        assert_eq!(seen[0].1[0].description, "The lookup tool");
        match &seen[1].0.turns()[2].blocks()[0] {
            ContentBlock::ToolResult { tool_use_id, is_error, .. } => {
                assert_eq!(tool_use_id, "t1");
                assert!(!is_error);
            }
            other => panic!("Expected tool result, got {:?}", other),
        }
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_multiple_tool_uses_in_one_turn() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_use(&[
                ("a", "search", json!({"q": "squat"})),
                ("b", "search", json!({"q": "deadlift"})),
            ])),
            Ok(ModelResponse::text("Both are compound lifts.")),
        ]);
        let launcher = Arc::new(FakeLauncher::new().with_tool("search", Ok(text_result("found"))));

        let report = assert_ok!(
            session(descriptor(&[]), backend, launcher.clone())
                .run_detailed("compare squat and deadlift")
                .await
        );

        // user, assistant, one result turn per request
        assert_eq!(report.transcript.len(), 4);
        assert_eq!(report.transcript.tool_result_count(), 2);
        assert_eq!(report.tool_calls.len(), 2);
        assert_eq!(report.tool_calls[1].to_string(), r#"search({"q":"deadlift"})"#);
    }

    #[tokio::test]
    async fn test_tool_error_flag_is_passed_to_model() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_use(&[("t1", "search", json!({}))])),
            Ok(ModelResponse::text("The search failed.")),
        ]);
        let launcher = Arc::new(FakeLauncher::new().with_tool(
            "search",
            Ok(ToolCallResult {
                content: vec![json!({"type": "text", "text": "quota exceeded"})],
                is_error: Some(true),
            }),
        ));

        let report = assert_ok!(
            session(descriptor(&[]), backend, launcher)
                .run_detailed("search")
                .await
        );
        assert!(report.tool_calls[0].is_error);
        assert_eq!(report.answer, "The search failed.");
    }

    #[tokio::test]
    async fn test_empty_answer() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse {
            stop_reason: StopReason::EndTurn,
            content: vec![],
            usage: TokenUsage::default(),
        })]);
        let launcher = Arc::new(FakeLauncher::new());

        let answer = assert_ok!(session(descriptor(&[]), backend, launcher).run("hi").await);
        assert_eq!(answer, "");
    }

    #[tokio::test]
    async fn test_max_tokens_ends_loop() {
        let mut truncated = tool_use(&[("t1", "search", json!({}))]);
        truncated.stop_reason = StopReason::MaxTokens;
        truncated
            .content
            .insert(0, ContentBlock::Text { text: "Partial".to_string() });
        let backend = ScriptedBackend::new(vec![Ok(truncated)]);
        let launcher = Arc::new(FakeLauncher::new().with_tool("search", Ok(text_result("x"))));

        let answer = assert_ok!(
            session(descriptor(&[]), backend.clone(), launcher.clone())
                .run("search")
                .await
        );
        assert_eq!(answer, "Partial");
        assert_eq!(backend.calls(), 1);
        assert!(launcher.counters.invocations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_still_shuts_down() {
        let backend = ScriptedBackend::new(vec![Ok(tool_use(&[("t1", "search", json!({}))]))]);
        let launcher = Arc::new(
            FakeLauncher::new().with_tool("search", Err((-32603, "internal".to_string()))),
        );

        let err = assert_err!(
            session(descriptor(&[]), backend, launcher.clone())
                .run("search")
                .await
        );
        assert!(matches!(err, GymmandoError::Provider { code: -32603, .. }));
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_model_error_still_shuts_down() {
        let backend = ScriptedBackend::new(vec![Err(GymmandoError::ChatApi(
            "HTTP 529: overloaded".to_string(),
        ))]);
        let launcher = Arc::new(FakeLauncher::new());

        let err = assert_err!(
            session(descriptor(&[]), backend, launcher.clone())
                .run("hi")
                .await
        );
        assert!(matches!(err, GymmandoError::ChatApi(_)));
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_prevents_launch() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text("unused"))]);
        let launcher = Arc::new(FakeLauncher::new());

        let err = assert_err!(
            session(descriptor(&["FAKE_API_KEY"]), backend.clone(), launcher.clone())
                .run("hi")
                .await
        );
        assert!(err.is_configuration());
        assert_eq!(launcher.launches(), 0);
        assert_eq!(launcher.shutdowns(), 0);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_credential_forwarded_to_launch() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text("ok"))]);
        let launcher = Arc::new(FakeLauncher::new());
        let mut env = HashMap::new();
        env.insert("FAKE_API_KEY".to_string(), "secret".to_string());

        let session = ToolSession::new(descriptor(&["FAKE_API_KEY"]), backend, launcher.clone())
            .with_environment(Arc::new(env));
        assert_ok!(session.run("hi").await);

        let specs = launcher.specs.lock().unwrap();
        assert_eq!(specs[0].command, "fake-mcp");
        assert_eq!(specs[0].env["FAKE_API_KEY"], "secret");
    }

    #[tokio::test]
    async fn test_tool_round_limit() {
        let backend = ScriptedBackend::new(vec![
            Ok(tool_use(&[("t1", "search", json!({}))])),
            Ok(tool_use(&[("t2", "search", json!({}))])),
            Ok(tool_use(&[("t3", "search", json!({}))])),
        ]);
        let launcher = Arc::new(FakeLauncher::new().with_tool("search", Ok(text_result("more"))));

        let err = assert_err!(
            session(descriptor(&[]), backend, launcher.clone())
                .with_max_tool_rounds(Some(2))
                .run("loop forever")
                .await
        );
        assert!(matches!(err, GymmandoError::ToolLoop(2)));
        assert_eq!(launcher.counters.invocations.lock().unwrap().len(), 2);
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_tool_use_without_requests_is_session_error() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse {
            stop_reason: StopReason::ToolUse,
            content: vec![ContentBlock::Text {
                text: "Let me check.".to_string(),
            }],
            usage: TokenUsage::default(),
        })]);
        let launcher = Arc::new(FakeLauncher::new());

        let err = assert_err!(
            session(descriptor(&[]), backend, launcher.clone())
                .run("hi")
                .await
        );
        assert!(matches!(err, GymmandoError::Session(_)));
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_failure_after_answer_is_not_raised() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text("pong"))]);
        let launcher = Arc::new(FakeLauncher::new().failing_shutdown());

        let answer = assert_ok!(
            session(descriptor(&[]), backend, launcher.clone())
                .run("ping")
                .await
        );
        assert_eq!(answer, "pong");
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_conversation_error_wins_over_shutdown_failure() {
        let backend = ScriptedBackend::new(vec![Err(GymmandoError::ChatApi(
            "HTTP 500: boom".to_string(),
        ))]);
        let launcher = Arc::new(FakeLauncher::new().failing_shutdown());

        let err = assert_err!(
            session(descriptor(&[]), backend, launcher.clone())
                .run("hi")
                .await
        );
        assert!(matches!(err, GymmandoError::ChatApi(ref m) if m.contains("boom")));
        assert_eq!(launcher.shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_system_prompt_override() {
        let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text("ok"))]);
        let launcher = Arc::new(FakeLauncher::new());

        assert_ok!(
            session(descriptor(&[]), backend.clone(), launcher)
                .with_system_prompt(None)
                .run("hi")
                .await
        );
        assert_eq!(backend.seen.lock().unwrap()[0].2, None);
    }
}
