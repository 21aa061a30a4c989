// ── Inbound message parser ──
//
// Classifies raw frames from either transport. Group-chat messages carry
// state reports (`{"body": {"nodes": [...]}}`); pub/sub publishes on
// `esmart/set/node/<id>` carry one set-command each.

use esmart_api::{ChatStanza, PubSubMessage};
use serde_json::Value;
use thiserror::Error;

use crate::command::{CommandFields, OutboundCommand};
use crate::model::{NodeDelta, NodeId, NodeReport};

/// Topic filter the bridge subscribes to.
pub const SET_TOPIC_FILTER: &str = "esmart/set/node/+";

const SET_TOPIC_PREFIX: &str = "esmart/set/node/";

/// A raw frame from one of the two transports.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Chat(ChatStanza),
    PubSub(PubSubMessage),
}

/// Result of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedInbound {
    /// Per-node deltas in array order.
    Report(Vec<NodeReport>),
    /// A command to forward to the remote controller.
    SetCommand(OutboundCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Presence, IQ, body-less messages and the like.
    #[error("not a message with a text body")]
    Noise,

    #[error("payload is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("payload has no body.nodes array")]
    MissingNodes,

    #[error("topic '{0}' is not a node set-command topic")]
    TopicMismatch(String),

    #[error("set-command payload is not a JSON object")]
    NotAnObject,
}

impl ParseError {
    pub fn is_noise(&self) -> bool {
        matches!(self, Self::Noise)
    }
}

/// Classify and decode one inbound frame.
pub fn parse(frame: &InboundFrame) -> Result<ParsedInbound, ParseError> {
    match frame {
        InboundFrame::Chat(stanza) => {
            let text = stanza.message_body().ok_or(ParseError::Noise)?;
            parse_report(text).map(ParsedInbound::Report)
        }
        InboundFrame::PubSub(message) => {
            parse_set_command(&message.topic, &message.payload).map(ParsedInbound::SetCommand)
        }
    }
}

/// Decode a state report body into per-node deltas.
///
/// Entries without a usable `id` are skipped. A missing or non-object
/// `data` yields an empty delta.
pub fn parse_report(text: &str) -> Result<Vec<NodeReport>, ParseError> {
    let payload: Value =
        serde_json::from_str(text).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
    let nodes = payload
        .get("body")
        .and_then(|body| body.get("nodes"))
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingNodes)?;

    let reports = nodes
        .iter()
        .filter_map(|entry| {
            let Some(id) = entry.get("id").and_then(NodeId::from_json) else {
                tracing::debug!(entry = %entry, "Skipping node entry without a usable id");
                return None;
            };
            let delta = entry
                .get("data")
                .and_then(Value::as_object)
                .map(NodeDelta::from_data)
                .unwrap_or_default();
            Some(NodeReport { id, delta })
        })
        .collect();

    Ok(reports)
}

/// Decode a pub/sub set-command.
pub fn parse_set_command(topic: &str, payload: &[u8]) -> Result<OutboundCommand, ParseError> {
    let id = node_id_from_topic(topic)?;
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;
    Ok(OutboundCommand {
        id: NodeId::Number(id),
        fields: CommandFields::from_object(object),
    })
}

/// Extract the numeric node id from `esmart/set/node/<digits>`.
pub fn node_id_from_topic(topic: &str) -> Result<i64, ParseError> {
    let mismatch = || ParseError::TopicMismatch(topic.to_owned());
    let digits = topic.strip_prefix(SET_TOPIC_PREFIX).ok_or_else(mismatch)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(mismatch());
    }
    digits.parse().map_err(|_| mismatch())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::OnOff;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chat(body: &str) -> InboundFrame {
        InboundFrame::Chat(ChatStanza::Message {
            kind: Some("groupchat".into()),
            body: Some(body.into()),
        })
    }

    fn publish(topic: &str, payload: &str) -> InboundFrame {
        InboundFrame::PubSub(PubSubMessage {
            topic: topic.into(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        })
    }

    #[test]
    fn report_yields_deltas_in_order() {
        let frame = chat(
            r#"{"body":{"nodes":[{"id":7,"data":{"onoff":"on","dimming":"80%"}},{"id":"hall","data":{"position":10}},{"id":7}]}}"#,
        );
        let ParsedInbound::Report(reports) = parse(&frame).unwrap() else {
            panic!("expected a report");
        };
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].id, NodeId::Number(7));
        assert_eq!(reports[0].delta.onoff, Some(OnOff::On));
        assert_eq!(reports[0].delta.dimming, Some(80));
        assert_eq!(reports[1].id, NodeId::from("hall"));
        assert_eq!(reports[1].delta.position, Some(json!(10)));
        assert!(reports[2].delta.is_empty());
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let reports = parse_report(r#"{"body":{"nodes":[{"data":{}},{"id":null},{"id":2}]}}"#).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, NodeId::Number(2));
    }

    #[test]
    fn presence_and_bodyless_messages_are_noise() {
        let presence = InboundFrame::Chat(ChatStanza::Presence);
        assert!(parse(&presence).unwrap_err().is_noise());
        assert!(parse(&InboundFrame::Chat(ChatStanza::Iq)).unwrap_err().is_noise());
        assert!(parse(&chat("")).unwrap_err().is_noise());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            parse(&chat("{not json")),
            Err(ParseError::MalformedJson(_))
        ));
    }

    #[test]
    fn missing_nodes_array_is_rejected() {
        for body in [r#"{}"#, r#"{"body":{}}"#, r#"{"body":{"nodes":{}}}"#, "[]"] {
            assert_eq!(parse(&chat(body)), Err(ParseError::MissingNodes), "{body}");
        }
    }

    #[test]
    fn set_command_from_topic() {
        let parsed = parse(&publish("esmart/set/node/42", r#"{"onoff":"off"}"#)).unwrap();
        assert_eq!(
            parsed,
            ParsedInbound::SetCommand(OutboundCommand {
                id: NodeId::Number(42),
                fields: CommandFields {
                    onoff: Some(json!("off")),
                    ..CommandFields::default()
                },
            })
        );
    }

    #[test]
    fn topic_must_match_exactly() {
        for topic in [
            "esmart/set/node/",
            "esmart/set/node/abc",
            "esmart/set/node/4/2",
            "esmart/set/node/-4",
            "esmart/get/node/4",
            "prefix/esmart/set/node/4",
            "esmart/set/node/99999999999999999999",
        ] {
            assert_eq!(
                node_id_from_topic(topic),
                Err(ParseError::TopicMismatch(topic.into())),
                "{topic}"
            );
        }
        assert_eq!(node_id_from_topic("esmart/set/node/007"), Ok(7));
    }

    #[test]
    fn set_command_payload_must_be_object() {
        assert_eq!(
            parse(&publish("esmart/set/node/1", "[1,2]")),
            Err(ParseError::NotAnObject)
        );
        assert!(matches!(
            parse(&publish("esmart/set/node/1", "on")),
            Err(ParseError::MalformedJson(_))
        ));
    }
}
