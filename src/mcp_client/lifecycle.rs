//! Server process shutdown.
//!
//! Closes stdin, waits for the process to exit within a bound, and
//! force-kills it otherwise so no zombie is left behind.

use std::process::ExitStatus;
use std::time::Duration;

use super::diagnostics::DiagnosticSink;
use super::errors::McpError;
use super::session::ProcessSession;

/// Grace period for collecting stderr written just before exit.
const STDERR_SETTLE: Duration = Duration::from_millis(500);

/// How a shutdown ended.
#[derive(Debug)]
pub enum ShutdownOutcome {
    /// The process exited on its own within the timeout.
    Exited(ExitStatus),
    /// The timeout fired and the process was killed.
    Killed,
}

/// Close stdin and wait up to `timeout` for the process to exit.
///
/// A failing exit status is only reported when stderr output is still
/// buffered at that point; output already drained for display does not
/// count. A timeout kills the process and is not an error. The wait future
/// is dropped when the timer wins, so nothing outlives this call.
pub async fn shutdown(
    session: &mut ProcessSession,
    timeout: Duration,
    diag: &DiagnosticSink,
) -> Result<ShutdownOutcome, McpError> {
    drop(session.stdin.take());
    let pid = session.pid();

    match tokio::time::timeout(timeout, session.process.wait()).await {
        Ok(Ok(status)) => {
            diag.debug(&format!("Command completed with status: {status}"));
            tracing::debug!(?pid, %status, "server process exited");

            session.settle_stderr(STDERR_SETTLE).await;
            if !status.success() && !session.stderr.is_empty() {
                return Err(McpError::CommandExit {
                    status: status.to_string(),
                    stderr: session.stderr.drain(),
                    result: None,
                });
            }
            Ok(ShutdownOutcome::Exited(status))
        }
        Ok(Err(e)) => {
            diag.debug(&format!("Command completed with err: {e}"));
            tracing::warn!(?pid, error = %e, "failed to wait for server process");

            session.settle_stderr(STDERR_SETTLE).await;
            if !session.stderr.is_empty() {
                return Err(McpError::CommandExit {
                    status: e.to_string(),
                    stderr: session.stderr.drain(),
                    result: None,
                });
            }
            let _ = session.process.kill().await;
            Ok(ShutdownOutcome::Killed)
        }
        Err(_) => {
            diag.debug(&format!(
                "Command timed out after {}ms",
                timeout.as_millis()
            ));
            tracing::debug!(?pid, timeout_ms = timeout.as_millis() as u64, "killing server process");
            let _ = session.process.kill().await;
            Ok(ShutdownOutcome::Killed)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::mcp_client::config::ServerCommand;
    use crate::mcp_client::diagnostics::CaptureBuffer;
    use std::time::Instant;

    fn spawn(script: &str) -> ProcessSession {
        ProcessSession::spawn(&ServerCommand::new(["sh", "-c", script])).unwrap()
    }

    #[tokio::test]
    async fn test_exits_when_stdin_closes() {
        let mut session = spawn("cat > /dev/null");
        let outcome = shutdown(&mut session, Duration::from_secs(5), &DiagnosticSink::new(CaptureBuffer::new()))
            .await
            .unwrap();
        match outcome {
            ShutdownOutcome::Exited(status) => assert!(status.success()),
            ShutdownOutcome::Killed => panic!("expected clean exit"),
        }
    }

    #[tokio::test]
    async fn test_failing_exit_with_stderr_is_reported() {
        let mut session = spawn("cat > /dev/null; echo 'fatal: disk full' >&2; exit 3");
        let err = shutdown(&mut session, Duration::from_secs(5), &DiagnosticSink::new(CaptureBuffer::new()))
            .await
            .unwrap_err();
        match err {
            McpError::CommandExit { status, stderr, result } => {
                assert!(status.contains('3'));
                assert!(stderr.contains("fatal: disk full"));
                assert!(result.is_none());
            }
            other => panic!("expected CommandExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_exit_without_stderr_is_ok() {
        let mut session = spawn("cat > /dev/null; exit 1");
        let outcome = shutdown(&mut session, Duration::from_secs(5), &DiagnosticSink::new(CaptureBuffer::new()))
            .await
            .unwrap();
        assert!(matches!(outcome, ShutdownOutcome::Exited(s) if !s.success()));
    }

    #[tokio::test]
    async fn test_failing_exit_after_stderr_was_drained_is_ok() {
        let mut session = spawn("echo booting >&2; cat > /dev/null; exit 1");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.stderr.drain(), "booting\n");

        let outcome = shutdown(&mut session, Duration::from_secs(5), &DiagnosticSink::new(CaptureBuffer::new()))
            .await
            .unwrap();
        assert!(matches!(outcome, ShutdownOutcome::Exited(s) if !s.success()));
    }

    #[tokio::test]
    async fn test_hung_process_is_killed() {
        let buf = CaptureBuffer::new();
        let diag = DiagnosticSink::new(buf.clone()).with_debug(true);
        let mut session = spawn("exec sleep 30");

        let start = Instant::now();
        let outcome = shutdown(&mut session, Duration::from_millis(200), &diag)
            .await
            .unwrap();

        assert!(matches!(outcome, ShutdownOutcome::Killed));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(session.process.try_wait().unwrap().is_some());
        assert!(buf.contents().contains("DEBUG: Command timed out after 200ms"));
    }
}
