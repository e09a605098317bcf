//! JSON-RPC over stdio transport.
//!
//! `StdioTransport::execute` is the single entry point: it lazily spawns the
//! server, performs the handshake once per process, sends one request, reads
//! until the matching response, and (in ephemeral mode) shuts the process
//! down again.

use async_trait::async_trait;
use tokio::process::ChildStdin;

use super::config::{SessionMode, TransportConfig};
use super::correlator::{read_response, send_message, IdAllocator};
use super::diagnostics::DiagnosticSink;
use super::errors::McpError;
use super::handshake;
use super::lifecycle;
use super::session::ProcessSession;
use super::types::JsonRpcRequest;

// ─── Transport Contract ──────────────────────────────────────────────────────

/// A way to invoke methods on an MCP server.
///
/// Callers needing concurrency use separate transports.
#[async_trait]
pub trait Transport: Send {
    /// Send `method` with `params` and return the response's `result`.
    async fn execute(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError>;
}

// ─── StdioTransport ──────────────────────────────────────────────────────────

/// MCP transport over a child process's stdin/stdout.
pub struct StdioTransport {
    config: TransportConfig,
    ids: IdAllocator,
    /// Live process, if any. Always `None` between calls in ephemeral mode.
    session: Option<ProcessSession>,
    diag: DiagnosticSink,
}

impl StdioTransport {
    /// Create a transport. Nothing is spawned until the first `execute`.
    pub fn new(config: TransportConfig) -> Self {
        let diag = DiagnosticSink::stderr().with_debug(config.debug);
        Self {
            config,
            ids: IdAllocator::new(),
            session: None,
            diag,
        }
    }

    /// Shorthand for an ephemeral transport over `argv`.
    pub fn from_command<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(TransportConfig::new(argv))
    }

    /// Redirect diagnostic output. The debug toggle follows the config.
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diag = sink.with_debug(self.config.debug);
        self
    }

    /// Switch between ephemeral and persistent sessions.
    ///
    /// A live persistent process is shut down at the end of the next call
    /// after switching to ephemeral.
    pub fn set_session_mode(&mut self, mode: SessionMode) {
        self.config.session = mode;
    }

    pub fn session_mode(&self) -> SessionMode {
        self.config.session
    }

    pub fn set_show_server_logs(&mut self, show: bool) {
        self.config.show_server_logs = show;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.diag = self.diag.clone().with_debug(debug);
    }

    /// The id the next request will carry.
    pub fn next_id(&self) -> i64 {
        self.ids.peek()
    }

    /// Whether a server process is currently held open.
    pub fn has_live_session(&self) -> bool {
        self.session.is_some()
    }

    /// Pid of the held server process, if any.
    pub fn session_pid(&self) -> Option<u32> {
        self.session.as_ref().and_then(ProcessSession::pid)
    }

    /// Invoke `method` on the server and return its `result`.
    pub async fn execute(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => self.spawn_session()?,
        };

        let outcome = self.exchange(&mut session, method, params).await;
        self.echo_server_logs(&session);

        match (self.config.session, outcome) {
            (SessionMode::Persistent, Ok(result)) => {
                self.session = Some(session);
                Ok(result)
            }
            (SessionMode::Persistent, Err(e)) => {
                if e.is_transport_failure() {
                    tracing::warn!(
                        method,
                        pid = ?session.pid(),
                        error = %e,
                        "dropping persistent server session"
                    );
                } else {
                    self.session = Some(session);
                }
                Err(e)
            }
            (SessionMode::Ephemeral, Ok(result)) => self.finish_ephemeral(session, result).await,
            // Dropping the session kills the process.
            (SessionMode::Ephemeral, Err(e)) => Err(e),
        }
    }

    /// Shut down a held server process (persistent mode).
    pub async fn close(&mut self) -> Result<(), McpError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let outcome = lifecycle::shutdown(&mut session, self.config.shutdown_timeout(), &self.diag).await;
        self.echo_server_logs(&session);
        outcome.map(|_| ())
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn spawn_session(&self) -> Result<ProcessSession, McpError> {
        self.diag
            .debug(&format!("Executing command: {:?}", self.config.server.argv));
        let session = ProcessSession::spawn(&self.config.server)?;
        tracing::info!(
            command = ?self.config.server.argv,
            pid = ?session.pid(),
            mode = ?self.config.session,
            "started MCP server"
        );
        Ok(session)
    }

    /// Handshake if needed, then one request/response round trip.
    async fn exchange(
        &mut self,
        session: &mut ProcessSession,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let stale = self.config.stale_response;

        if !session.initialized {
            self.diag.debug("Starting initialization");
            let stdin = open_stdin(&mut session.stdin)?;
            if let Err(e) = handshake::initialize(
                &mut session.stdout,
                stdin,
                &mut self.ids,
                &self.config.client_info,
                stale,
                &self.diag,
            )
            .await
            {
                self.echo_server_logs(session);
                self.diag.debug(&format!("Initialization failed: {e}"));
                return Err(e);
            }
            session.initialized = true;
            self.echo_server_logs(session);
            self.diag
                .debug("Initialization successful, sending method request");
        }

        let id = self.ids.allocate();
        let request = JsonRpcRequest::new(id, method, params);
        send_message(open_stdin(&mut session.stdin)?, &request, &self.diag).await?;

        let result = read_response(&mut session.stdout, id, stale, &self.diag).await?;
        tracing::debug!(method, id, "received response");
        Ok(result)
    }

    async fn finish_ephemeral(
        &self,
        mut session: ProcessSession,
        result: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let outcome =
            lifecycle::shutdown(&mut session, self.config.shutdown_timeout(), &self.diag).await;
        self.echo_server_logs(&session);

        match outcome {
            Ok(_) => Ok(result),
            Err(McpError::CommandExit { status, stderr, .. }) => Err(McpError::CommandExit {
                status,
                stderr,
                result: Some(result),
            }),
            Err(e) => Err(e),
        }
    }

    /// Print and clear accumulated stderr when server logs are shown.
    fn echo_server_logs(&self, session: &ProcessSession) {
        if !self.config.show_server_logs || session.stderr.is_empty() {
            return;
        }
        self.diag.server_stderr(&session.stderr.drain());
    }
}

fn open_stdin(stdin: &mut Option<ChildStdin>) -> Result<&mut ChildStdin, McpError> {
    stdin.as_mut().ok_or(McpError::TransportWrite {
        reason: "stdin already closed".into(),
    })
}

#[async_trait]
impl Transport for StdioTransport {
    async fn execute(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        StdioTransport::execute(self, method, params).await
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.config.server.argv)
            .field("session", &self.config.session)
            .field("next_id", &self.ids.peek())
            .field("pid", &self.session_pid())
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
