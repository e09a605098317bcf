//! Transport configuration loading.
//!
//! A transport is configured from code or from an `mcp-stdio.yaml` file.
//! The `MCP_DEBUG` environment variable overrides the debug toggle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::McpError;
use super::types::ClientInfo;

/// Config file name searched for by [`find_config_path`].
pub const CONFIG_FILE_NAME: &str = "mcp-stdio.yaml";

/// Environment variable that enables `DEBUG:` tracing when set to `1`.
pub const DEBUG_ENV_VAR: &str = "MCP_DEBUG";

/// Default bound on the post-response shutdown wait.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 1_000;

// ─── Public Types ────────────────────────────────────────────────────────────

/// Whether the server process outlives a single `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Spawn, handshake, call, and shut down on every `execute`.
    #[default]
    Ephemeral,
    /// Keep one process and one handshake across calls.
    Persistent,
}

/// What to do with a response whose `id` is not the one just sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Discard it and keep reading.
    #[default]
    Skip,
    /// Fail the call with a malformed-message error.
    Reject,
}

/// The server command line plus its process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerCommand {
    /// `argv[0]` and its arguments.
    #[serde(rename = "command")]
    pub argv: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl ServerCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

/// Full transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(flatten)]
    pub server: ServerCommand,
    #[serde(default)]
    pub session: SessionMode,
    /// Echo captured server stderr to the diagnostic stream.
    #[serde(default)]
    pub show_server_logs: bool,
    /// Write `DEBUG:` trace lines for every send/receive/wait event.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default)]
    pub stale_response: StaleResponsePolicy,
    #[serde(default)]
    pub client_info: ClientInfo,
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

impl TransportConfig {
    /// Defaults for the given command line, with `MCP_DEBUG` applied.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self {
            server: ServerCommand::new(argv),
            session: SessionMode::default(),
            show_server_logs: false,
            debug: false,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            stale_response: StaleResponsePolicy::default(),
            client_info: ClientInfo::default(),
        };
        config.apply_env();
        config
    }

    /// Apply environment overrides (`MCP_DEBUG=1` forces debug on).
    pub fn apply_env(&mut self) {
        if std::env::var(DEBUG_ENV_VAR).is_ok_and(|v| v == "1") {
            self.debug = true;
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Reject configs that cannot possibly spawn.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.server.argv.is_empty() || self.server.argv[0].trim().is_empty() {
            return Err(McpError::ConfigError {
                reason: "command must name a program".into(),
            });
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(McpError::ConfigError {
                reason: "shutdown_timeout_ms must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Find the config file: working directory first, then the user config dir.
pub fn find_config_path(start: &Path) -> Result<PathBuf, McpError> {
    let local = start.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("mcp-stdio").join(CONFIG_FILE_NAME);
        if user.exists() {
            return Ok(user);
        }
    }

    Err(McpError::ConfigError {
        reason: format!(
            "{CONFIG_FILE_NAME} not found in {} or the user config directory",
            start.display()
        ),
    })
}

/// Parse a transport config from YAML text.
pub fn parse_transport_config(yaml: &str) -> Result<TransportConfig, McpError> {
    let mut config: TransportConfig =
        serde_yaml::from_str(yaml).map_err(|e| McpError::ConfigError {
            reason: format!("invalid transport config: {e}"),
        })?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Load and validate a transport config file.
pub fn load_transport_config(path: &Path) -> Result<TransportConfig, McpError> {
    let text = std::fs::read_to_string(path).map_err(|e| McpError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    let config = parse_transport_config(&text)?;
    tracing::info!(
        path = %path.display(),
        command = ?config.server.argv,
        session = ?config.session,
        "loaded transport config"
    );
    Ok(config)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
