pub mod mcp_client;

pub use mcp_client::{
    DiagnosticSink, McpError, SessionMode, StaleResponsePolicy, StdioTransport, Transport,
    TransportConfig,
};

use std::path::Path;

use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "mcp_stdio=info,warn";

/// Initialize the tracing subscriber.
///
/// Logs go to stderr, or to `log_file` (appended, flushed per line) when
/// given. `RUST_LOG` overrides the default filter. Calling this twice is a
/// no-op for the second call.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), McpError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| McpError::ConfigError {
                    reason: format!("failed to open log file {}: {e}", path.display()),
                })?;
            BoxMakeWriter::new(FlushingWriter::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "tracing initialized"
    );
    Ok(())
}

/// A writer that wraps `std::fs::File` and flushes after every write.
///
/// Keeps log lines on disk when the process is killed mid-call.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self.file.lock().map_err(|e| {
            std::io::Error::other(format!("lock poisoned: {e}"))
        })?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self.file.lock().map_err(|e| {
            std::io::Error::other(format!("lock poisoned: {e}"))
        })?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
