// ── Core error types ──
//
// Errors surfaced by the bridge engine. Transport failures from
// `esmart-api` are translated into domain-level variants.

use thiserror::Error;

use crate::model::NodeId;
use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Not connected to the group chat")]
    Disconnected,

    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Dispatch errors ──────────────────────────────────────────────
    #[error("Outbound queue full, command for node {node_id} dropped")]
    QueueFull { node_id: NodeId },

    // ── Data errors ──────────────────────────────────────────────────
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<esmart_api::Error> for CoreError {
    fn from(err: esmart_api::Error) -> Self {
        match err {
            esmart_api::Error::InvalidJid { jid, reason } => CoreError::Config {
                message: format!("Invalid JID '{jid}': {reason}"),
            },
            esmart_api::Error::InvalidBrokerUrl { url, reason } => CoreError::Config {
                message: format!("Invalid broker URL '{url}': {reason}"),
            },
            esmart_api::Error::NotOnline { timeout_secs } => CoreError::Timeout { timeout_secs },
            esmart_api::Error::SessionClosed => CoreError::Disconnected,
            esmart_api::Error::XmppSend(reason) | esmart_api::Error::MqttConnection(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            esmart_api::Error::Subscribe { topic, reason } => CoreError::ConnectionFailed {
                reason: format!("subscribe to '{topic}' failed: {reason}"),
            },
        }
    }
}
