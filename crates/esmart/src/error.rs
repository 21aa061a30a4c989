//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use esmart_config::ConfigError;
use esmart_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the myESmart service: {reason}")]
    #[diagnostic(
        code(esmart::connection_failed),
        help("Check network access to the XMPP server (xmpp.host / xmpp.port) and the broker URL.")
    )]
    ConnectionFailed { reason: String },

    #[error("XMPP session not online after {seconds}s")]
    #[diagnostic(
        code(esmart::timeout),
        help("Verify the JID and password, or raise the timeout with --timeout.")
    )]
    Timeout { seconds: u64 },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No password configured for '{jid}'")]
    #[diagnostic(
        code(esmart::no_credentials),
        help(
            "Store one with: esmart config set-password\n\
             Or set the ESMART_PASSWORD environment variable."
        )
    )]
    NoCredentials { jid: String },

    #[error("Missing required setting '{field}'")]
    #[diagnostic(
        code(esmart::missing_setting),
        help("Add it to the config file (see: esmart config path) or set ESMART_XMPP__<KEY>.")
    )]
    MissingSetting { field: String },

    #[error("Configuration file not found")]
    #[diagnostic(code(esmart::no_config), help("Expected at: {path}"))]
    NoConfig { path: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(esmart::config))]
    Config { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(esmart::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization / Internal ────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(esmart::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(esmart::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. }
            | Self::MissingSetting { .. }
            | Self::NoConfig { .. }
            | Self::Config { .. } => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Disconnected => CliError::ConnectionFailed {
                reason: "group-chat session closed".into(),
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::QueueFull { node_id } => CliError::ConnectionFailed {
                reason: format!("outbound queue full, command for node {node_id} dropped"),
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Serialization(e) => CliError::Json(e),
            CoreError::Parse(e) => CliError::Validation {
                field: "payload".into(),
                reason: e.to_string(),
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<esmart_api::Error> for CliError {
    fn from(err: esmart_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Missing { field } => CliError::MissingSetting {
                field: field.into(),
            },
            ConfigError::NoCredentials { jid } => CliError::NoCredentials { jid },
            ConfigError::Validation { field, reason } => CliError::Config {
                message: format!("{field}: {reason}"),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
