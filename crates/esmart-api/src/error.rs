use thiserror::Error;

/// Top-level error type for the `esmart-api` crate.
///
/// Covers every failure mode of the two transports: the XMPP group-chat
/// session and the MQTT subscriber. `esmart-core` maps these into
/// bridge-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Addressing ──────────────────────────────────────────────────
    /// A JID from configuration could not be parsed.
    #[error("Invalid JID '{jid}': {reason}")]
    InvalidJid { jid: String, reason: String },

    /// Broker URL could not be parsed or has no host.
    #[error("Invalid broker URL '{url}': {reason}")]
    InvalidBrokerUrl { url: String, reason: String },

    // ── XMPP ────────────────────────────────────────────────────────
    /// The XMPP session did not come online in time.
    #[error("XMPP session not online after {timeout_secs}s")]
    NotOnline { timeout_secs: u64 },

    /// Sending a stanza failed.
    #[error("XMPP send failed: {0}")]
    XmppSend(String),

    /// The XMPP session task has stopped.
    #[error("XMPP session closed")]
    SessionClosed,

    // ── MQTT ────────────────────────────────────────────────────────
    /// Subscribing to a topic filter failed.
    #[error("MQTT subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Broker connection error reported by the event loop.
    #[error("MQTT connection error: {0}")]
    MqttConnection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = Error::InvalidJid {
            jid: "nope".into(),
            reason: "missing domain".into(),
        };
        assert_eq!(err.to_string(), "Invalid JID 'nope': missing domain");
        assert_eq!(
            Error::Subscribe {
                topic: "esmart/set/node/+".into(),
                reason: "queue full".into()
            }
            .to_string(),
            "MQTT subscribe to 'esmart/set/node/+' failed: queue full"
        );
    }
}
