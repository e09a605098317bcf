//! Process session: one spawned MCP server and its stdio handles.
//!
//! Stdin and stdout are piped for JSON-RPC. Stderr is drained by a background
//! task into a shared buffer that is only ever appended to or fully drained.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::config::ServerCommand;
use super::errors::McpError;

// ─── Stderr Buffer ───────────────────────────────────────────────────────────

/// Accumulating stderr capture shared with the drain task.
#[derive(Debug, Clone, Default)]
pub struct StderrBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl StderrBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the child's stderr.
    pub fn append(&self, chunk: &[u8]) {
        if let Ok(mut bytes) = self.bytes.lock() {
            bytes.extend_from_slice(chunk);
        }
    }

    /// Take everything captured since the last drain.
    pub fn drain(&self) -> String {
        self.bytes
            .lock()
            .map(|mut b| {
                let bytes = std::mem::take(&mut *b);
                String::from_utf8_lossy(&bytes).into_owned()
            })
            .unwrap_or_default()
    }

    /// Bytes currently buffered (not yet drained).
    pub fn len(&self) -> usize {
        self.bytes.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── ProcessSession ──────────────────────────────────────────────────────────

/// A running server process with its stdio handles.
pub struct ProcessSession {
    pub(crate) process: Child,
    /// `None` once stdin has been closed for shutdown.
    pub(crate) stdin: Option<ChildStdin>,
    pub(crate) stdout: BufReader<ChildStdout>,
    pub(crate) stderr: StderrBuffer,
    stderr_task: Option<JoinHandle<()>>,
    /// Whether the initialize handshake has completed on this process.
    pub initialized: bool,
}

impl ProcessSession {
    /// Spawn the server described by `server` with piped stdio.
    pub fn spawn(server: &ServerCommand) -> Result<Self, McpError> {
        let (program, args) = server.argv.split_first().ok_or(McpError::SpawnFailed {
            command: Vec::new(),
            reason: "no command specified for stdio transport".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args);

        for (key, value) in &server.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &server.cwd {
            cmd.current_dir(dir);
        }

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            command: server.argv.clone(),
            reason: format!("error starting command: {e}"),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            command: server.argv.clone(),
            reason: "error getting stdin pipe".into(),
        })?;

        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            command: server.argv.clone(),
            reason: "error getting stdout pipe".into(),
        })?;

        let stderr_handle = child.stderr.take().ok_or(McpError::SpawnFailed {
            command: server.argv.clone(),
            reason: "error getting stderr pipe".into(),
        })?;

        let stderr = StderrBuffer::new();
        let sink = stderr.clone();
        let stderr_task = tokio::spawn(async move {
            let mut stderr_handle = stderr_handle;
            let mut chunk = [0u8; 4096];
            loop {
                match stderr_handle.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.append(&chunk[..n]),
                }
            }
        });

        tracing::debug!(command = ?server.argv, pid = ?child.id(), "server process spawned");

        Ok(Self {
            process: child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr,
            stderr_task: Some(stderr_task),
            initialized: false,
        })
    }

    /// OS process id, if the process has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Wait briefly for the stderr drain task to reach EOF so output written
    /// just before exit is captured.
    pub(crate) async fn settle_stderr(&mut self, grace: Duration) {
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(grace, task).await;
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
