//! MCP client over a child process's stdio.

use super::connection::McpConnection;
use super::protocol::{Implementation, ToolCallResult, ToolDescriptor};
use super::{Launcher, ToolProvider};
use crate::error::{GymmandoError, Result};
use crate::provider::LaunchSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Launches providers as child processes and connects over their stdio.
#[derive(Debug, Clone)]
pub struct StdioLauncher {
    client_info: Implementation,
    shutdown_grace: Duration,
}

impl Default for StdioLauncher {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

impl StdioLauncher {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            shutdown_grace,
        }
    }
}

#[async_trait]
impl Launcher for StdioLauncher {
    #[instrument(skip(self, spec), fields(command = %spec.command))]
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ToolProvider>> {
        let mut client = StdioMcpClient::spawn(spec, self.shutdown_grace)?;

        match client.connection.initialize(self.client_info.clone()).await {
            Ok(result) => {
                let server = result
                    .server_info
                    .map(|s| format!("{} {}", s.name, s.version))
                    .unwrap_or_else(|| "unnamed server".to_string());
                info!("Connected to tool provider ({})", server);
                Ok(Box::new(client))
            }
            Err(e) => {
                if let Err(shutdown_err) = client.shutdown().await {
                    warn!("Provider cleanup after failed handshake: {}", shutdown_err);
                }
                Err(e)
            }
        }
    }
}

/// A running provider process and the MCP connection to it.
pub struct StdioMcpClient {
    command: String,
    child: Child,
    connection: McpConnection<BufReader<ChildStdout>, ChildStdin>,
    stderr_drain: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl StdioMcpClient {
    /// Spawn the provider process. The caller performs the handshake.
    pub fn spawn(spec: &LaunchSpec, shutdown_grace: Duration) -> Result<Self> {
        debug!("Spawning {} {:?}", spec.command, spec.args);

        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GymmandoError::ProviderLaunch {
                command: spec.command.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GymmandoError::Protocol("provider stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GymmandoError::Protocol("provider stdout unavailable".to_string()))?;

        // Provider logs go to stderr; surface them at debug level
        let stderr_drain = child.stderr.take().map(|stderr| {
            let command = spec.command.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf);
                            debug!(target: "gymmando::provider", "[{}] {}", command, line.trim_end());
                        }
                    }
                }
            })
        });

        Ok(Self {
            command: spec.command.clone(),
            child,
            connection: McpConnection::new(BufReader::new(stdout), stdin),
            stderr_drain,
            shutdown_grace,
        })
    }
}

#[async_trait]
impl ToolProvider for StdioMcpClient {
    async fn discover(&mut self) -> Result<Vec<ToolDescriptor>> {
        self.connection.list_tools().await
    }

    async fn invoke(&mut self, name: &str, input: &Value) -> Result<ToolCallResult> {
        self.connection.call_tool(name, input).await
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Err(e) = self.connection.close().await {
            debug!("Closing provider stdin failed: {}", e);
        }

        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(status) => {
                debug!("Provider {} exited with {}", self.command, status?);
            }
            Err(_) => {
                debug!("Provider {} still running after stdin closed, killing", self.command);
                self.child.kill().await?;
            }
        }

        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        Ok(())
    }
}
