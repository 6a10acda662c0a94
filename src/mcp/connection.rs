//! Newline-delimited JSON-RPC over a pair of byte streams.

use super::protocol::*;
use super::ToolProvider;
use crate::error::{GymmandoError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

/// Client end of an MCP connection.
///
/// Requests are strictly sequential: one request is written, then lines are
/// read until the matching response arrives.
pub struct McpConnection<R, W> {
    reader: R,
    writer: Option<W>,
    next_id: u64,
}

impl<R, W> McpConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            next_id: 0,
        }
    }

    async fn write_message<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| GymmandoError::Protocol("connection already closed".to_string()))?;

        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Send a request and wait for its result.
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        self.write_message(&JsonRpcRequest::new(id, method, params)).await?;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf).await? == 0 {
                return Err(GymmandoError::Protocol(format!(
                    "provider closed its output while waiting for {}",
                    method
                )));
            }

            // Providers may print non-UTF-8 noise; it fails to parse below and is skipped
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let message: IncomingMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Ignoring non-protocol output from provider ({}): {}", e, truncate(line, 120));
                    continue;
                }
            };

            match (message.id, message.method) {
                (Some(server_id), Some(server_method)) => {
                    self.answer_server_request(server_id, &server_method).await?;
                }
                (None, Some(notification)) => {
                    debug!("Provider notification: {}", notification);
                }
                (Some(response_id), None) => {
                    if response_id.as_u64() != Some(id) {
                        warn!("Ignoring response for unknown request id {}", response_id);
                        continue;
                    }
                    if let Some(error) = message.error {
                        return Err(GymmandoError::Provider {
                            code: error.code,
                            message: error.message,
                        });
                    }
                    return Ok(message.result.unwrap_or(Value::Null));
                }
                (None, None) => match message.error {
                    Some(error) => {
                        return Err(GymmandoError::Provider {
                            code: error.code,
                            message: error.message,
                        });
                    }
                    None => warn!("Ignoring message without id or method"),
                },
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.write_message(&JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        })
        .await
    }

    /// Reply to a request the provider sent us while we were waiting.
    async fn answer_server_request(&mut self, id: Value, method: &str) -> Result<()> {
        let response = match method {
            "ping" => JsonRpcResponse::success(id, json!({})),
            other => {
                debug!("Declining provider request: {}", other);
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, &format!("Method not found: {}", other))
            }
        };
        self.write_message(&response).await
    }

    /// Perform the `initialize` handshake.
    #[instrument(skip(self, client_info))]
    pub async fn initialize(&mut self, client_info: Implementation) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION,
            capabilities: json!({}),
            client_info,
        };
        let result = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| GymmandoError::Protocol(format!("Malformed initialize result: {}", e)))?;

        if result.protocol_version != PROTOCOL_VERSION {
            debug!(
                "Provider negotiated protocol version {}",
                result.protocol_version
            );
        }

        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// List every tool the provider exposes, following pagination.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page = self.request("tools/list", params).await?;
            let page: ToolsListResult = serde_json::from_value(page)
                .map_err(|e| GymmandoError::Protocol(format!("Malformed tools/list result: {}", e)))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Call a tool and return its result.
    pub async fn call_tool(&mut self, name: &str, arguments: &Value) -> Result<ToolCallResult> {
        let params = serde_json::to_value(ToolCallParams { name, arguments })?;
        let result = self.request("tools/call", Some(params)).await?;
        serde_json::from_value(result).map_err(|e| {
            GymmandoError::Protocol(format!("Malformed result from tool {}: {}", name, e))
        })
    }

    /// Close the write side so the provider sees end of input.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<R, W> ToolProvider for McpConnection<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn discover(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.list_tools().await
    }

    async fn invoke(&mut self, name: &str, input: &Value) -> Result<ToolCallResult> {
        self.call_tool(name, input).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.close().await
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, BufReader, DuplexStream, ReadHalf, WriteHalf};
    use tokio::task::JoinHandle;

    type TestConnection = McpConnection<BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>>;

    /// Spawn a scripted provider. For every line it reads, `respond` returns
    /// the lines to write back. It returns everything it received.
    fn scripted_provider<F>(mut respond: F) -> (TestConnection, JoinHandle<Vec<Value>>)
    where
        F: FnMut(&Value) -> Vec<String> + Send + 'static,
    {
        let (client_io, server_io) = duplex(64 * 1024);
        let (client_read, client_write) = split(client_io);
        let connection = McpConnection::new(BufReader::new(client_read), client_write);

        let handle = tokio::spawn(async move {
            let (server_read, mut server_write) = split(server_io);
            let mut lines = BufReader::new(server_read).lines();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let message: Value = serde_json::from_str(&line).unwrap();
                for reply in respond(&message) {
                    server_write.write_all(reply.as_bytes()).await.unwrap();
                    server_write.write_all(b"\n").await.unwrap();
                }
                received.push(message);
            }
            received
        });

        (connection, handle)
    }

    fn reply(id: &Value, result: Value) -> String {
        json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string()
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let (mut conn, handle) = scripted_provider(|msg| match msg["method"].as_str() {
            Some("initialize") => vec![reply(
                &msg["id"],
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "yt-mcp", "version": "1.0.0"}
                }),
            )],
            _ => vec![],
        });

        let info = conn
            .initialize(Implementation {
                name: "gymmando".to_string(),
                version: "0.1.0".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(info.server_info.unwrap().name, "yt-mcp");

        conn.close().await.unwrap();
        let received = handle.await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0]["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(received[0]["params"]["clientInfo"]["name"], "gymmando");
        assert_eq!(received[1]["method"], "notifications/initialized");
        assert!(received[1].get("id").is_none());
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let (mut conn, handle) = scripted_provider(|msg| {
            let page = match msg["params"]["cursor"].as_str() {
                None => json!({"tools": [{"name": "a"}], "nextCursor": "p2"}),
                Some(_) => json!({"tools": [{"name": "b", "description": "second"}]}),
            };
            vec![reply(&msg["id"], page)]
        });

        let tools = conn.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        conn.close().await.unwrap();
        assert_eq!(handle.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_skips_noise_notifications_and_answers_ping() {
        let (mut conn, handle) = scripted_provider(|msg| {
            if msg.get("method").is_none() {
                // our reply to the provider's ping
                return vec![];
            }
            vec![
                "Tavily MCP server running on stdio".to_string(),
                json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {"level": "info"}})
                    .to_string(),
                json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}).to_string(),
                reply(&msg["id"], json!({"content": [{"type": "text", "text": "{\"value\":42}"}]})),
            ]
        });

        let result = conn.call_tool("lookup", &json!({"q": "x"})).await.unwrap();
        assert_eq!(result.content[0]["text"], "{\"value\":42}");
        assert_eq!(result.is_error, None);

        conn.close().await.unwrap();
        let received = handle.await.unwrap();
        assert_eq!(received[0]["params"], json!({"name": "lookup", "arguments": {"q": "x"}}));
        assert_eq!(received[1], json!({"jsonrpc": "2.0", "id": "srv-1", "result": {}}));
    }

    #[tokio::test]
    async fn test_skips_non_utf8_noise() {
        let (client_io, server_io) = duplex(64 * 1024);
        let (client_read, client_write) = split(client_io);
        let mut conn = McpConnection::new(BufReader::new(client_read), client_write);

        let handle = tokio::spawn(async move {
            let (server_read, mut server_write) = split(server_io);
            let mut lines = BufReader::new(server_read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let message: Value = serde_json::from_str(&line).unwrap();

            server_write.write_all(b"npm WARN caf\xe9 latin1 noise\n").await.unwrap();
            server_write
                .write_all(format!("{}\n", reply(&message["id"], json!({"content": []}))).as_bytes())
                .await
                .unwrap();
            // keep the pipe open until the client is done
            let _ = lines.next_line().await;
        });

        let result = conn.call_tool("search", &json!({})).await.unwrap();
        assert!(result.content.is_empty());

        conn.close().await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_is_fatal() {
        let (mut conn, _handle) = scripted_provider(|msg| {
            vec![json!({
                "jsonrpc": "2.0",
                "id": msg["id"],
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            })
            .to_string()]
        });

        let err = conn.call_tool("nope", &json!({})).await.unwrap_err();
        match err {
            GymmandoError::Provider { code, message } => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Unknown tool: nope");
            }
            other => panic!("Expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_tool_result_is_fatal() {
        let (mut conn, _handle) =
            scripted_provider(|msg| vec![reply(&msg["id"], json!({"value": 42}))]);

        let err = conn.call_tool("lookup", &json!({})).await.unwrap_err();
        assert!(matches!(err, GymmandoError::Protocol(ref m) if m.contains("Malformed result")));
    }

    #[tokio::test]
    async fn test_eof_while_waiting() {
        let (client_io, server_io) = duplex(1024);
        drop(server_io);
        let (read, write) = split(client_io);
        let mut conn = McpConnection::new(BufReader::new(read), write);

        let err = conn.request("tools/list", None).await.unwrap_err();
        // Writing to a dropped peer may fail first; either way it is fatal
        assert!(matches!(err, GymmandoError::Protocol(_) | GymmandoError::Io(_)));
    }

    #[tokio::test]
    async fn test_requests_after_close_fail() {
        let (mut conn, _handle) = scripted_provider(|_| vec![]);
        conn.close().await.unwrap();
        let err = conn.notify("notifications/initialized", None).await.unwrap_err();
        assert!(matches!(err, GymmandoError::Protocol(_)));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
