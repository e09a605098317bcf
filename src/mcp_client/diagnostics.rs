//! Diagnostic stream for human-facing transport output.
//!
//! Server log notifications, echoed server stderr and `DEBUG:` trace lines
//! go here. This is presentation output, separate from `tracing` events.

use std::io::Write;
use std::sync::{Arc, Mutex};

use super::types::LogMessageParams;

// ─── ANSI Colors ─────────────────────────────────────────────────────────────

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";
const RESET: &str = "\x1b[0m";

/// Prefix for echoed server stderr lines.
const STDERR_PREFIX: &str = "[>] ";

// ─── DiagnosticSink ──────────────────────────────────────────────────────────

/// A cloneable, line-oriented writer for diagnostic output.
///
/// Every line is flushed immediately. Write failures are ignored: losing a
/// diagnostic line must never fail a call.
#[derive(Clone)]
pub struct DiagnosticSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    debug: bool,
}

impl DiagnosticSink {
    /// Wrap an arbitrary writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
            debug: false,
        }
    }

    /// Enable or disable `DEBUG:` lines.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Sink that writes to the process's stderr.
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write one line (a trailing newline is appended).
    pub fn line(&self, text: &str) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    /// Emit a `DEBUG:` trace line when debug output is on.
    pub fn debug(&self, text: &str) {
        tracing::trace!(target: "mcp_stdio::wire", "{text}");
        if self.debug {
            self.line(&format!("DEBUG: {text}"));
        }
    }

    /// Render a `notifications/message` event, tagged by level.
    pub fn log_message(&self, params: &LogMessageParams) {
        self.line(&format_log_message(params));
    }

    /// Render any other server notification verbatim.
    pub fn notification(&self, raw: &str) {
        self.line(&format!("[Notification] {raw}"));
    }

    /// Echo captured server stderr, one prefixed line per non-empty line.
    pub fn server_stderr(&self, captured: &str) {
        for line in captured.lines().filter(|l| !l.is_empty()) {
            self.line(&format!("{STDERR_PREFIX}{line}"));
        }
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

/// Format a server log event as a single colored line.
pub fn format_log_message(params: &LogMessageParams) -> String {
    let data = &params.data;
    match params.level.as_str() {
        "error" => format!("{RED}[ERROR] {data}{RESET}"),
        "warning" => format!("{YELLOW}[WARNING] {data}{RESET}"),
        "alert" => format!("{MAGENTA}[ALERT] {data}{RESET}"),
        "info" => format!("{CYAN}[INFO] {data}{RESET}"),
        other => format!("{WHITE}[{other}] {data}{RESET}"),
    }
}

// ─── Capture Buffer ──────────────────────────────────────────────────────────

/// In-memory writer whose contents can be inspected from another handle.
///
/// Used to point a `DiagnosticSink` at memory instead of a terminal.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        self.bytes
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut bytes = self.bytes.lock().map_err(|e| {
            std::io::Error::other(format!("lock poisoned: {e}"))
        })?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
