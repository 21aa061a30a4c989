// ── Operation codec ──
//
// Builds the `operation` envelope the remote controller ("master")
// understands, and wraps it as a group-chat message body.

use chrono::{DateTime, SecondsFormat, Utc};
use esmart_api::GroupChatMessage;
use serde::Serialize;
use serde_json::Value;

use crate::command::OutboundCommand;
use crate::error::CoreError;
use crate::model::NodeId;
use crate::model::value::is_truthy;

/// Protocol version announced in every envelope header.
pub const PROTOCOL_VERSION: &str = "1.19.0";

/// Recipient of every operation.
pub const MASTER: &str = "master";

/// Envelope header block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headers {
    pub method: &'static str,
    pub from: String,
    pub to: &'static str,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub version: &'static str,
    pub size: u32,
}

/// One body entry. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyEntry {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onoff: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<Value>,
    #[serde(rename = "deviceOnOff", skip_serializing_if = "Option::is_none")]
    pub device_on_off: Option<Value>,
}

impl BodyEntry {
    /// `dimming` and `onoff` only when truthy; the rest whenever present.
    fn from_command(command: &OutboundCommand) -> Self {
        let fields = &command.fields;
        Self {
            id: command.id.clone(),
            dimming: fields.dimming.clone().filter(is_truthy),
            onoff: fields.onoff.clone().filter(is_truthy),
            position: fields.position.clone(),
            setpoint: fields.setpoint.clone(),
            device_on_off: fields.device_on_off.clone(),
        }
    }
}

/// A complete outbound operation: headers plus exactly one body entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationEnvelope {
    pub headers: Headers,
    pub body: [BodyEntry; 1],
}

impl OperationEnvelope {
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Encode `command` with the current time.
pub fn encode(identity: &str, command: &OutboundCommand) -> OperationEnvelope {
    encode_at(identity, command, Utc::now())
}

/// Encode `command` with an explicit timestamp.
pub fn encode_at(identity: &str, command: &OutboundCommand, at: DateTime<Utc>) -> OperationEnvelope {
    OperationEnvelope {
        headers: Headers {
            method: "CMD",
            from: identity.to_owned(),
            to: MASTER,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            kind: "operation",
            version: PROTOCOL_VERSION,
            size: 0,
        },
        body: [BodyEntry::from_command(command)],
    }
}

/// Wrap an envelope as a `groupchat` message to `room`.
pub fn wrap(envelope: &OperationEnvelope, room: &str) -> Result<GroupChatMessage, CoreError> {
    Ok(GroupChatMessage {
        room: room.to_owned(),
        body: envelope.to_json()?,
    })
}

/// Encoder bound to one account and room.
#[derive(Debug, Clone)]
pub struct OperationCodec {
    identity: String,
    room: String,
}

impl OperationCodec {
    pub fn new(identity: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            room: room.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn encode(&self, command: &OutboundCommand) -> OperationEnvelope {
        encode(&self.identity, command)
    }

    /// Encode and wrap in one step.
    pub fn message(&self, command: &OutboundCommand) -> Result<GroupChatMessage, CoreError> {
        wrap(&self.encode(command), &self.room)
    }
}
