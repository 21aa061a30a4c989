// ── Outbound commands ──
//
// A command names one node and a subset of its writable fields. Values
// are kept as raw JSON: set-commands from the pub/sub channel are
// forwarded as given, and field inclusion is decided by the codec.

use serde_json::{Map, Value};

use crate::model::{NodeId, OnOff};

/// Writable fields of a node. `None` means "not mentioned".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandFields {
    pub dimming: Option<Value>,
    pub onoff: Option<Value>,
    pub position: Option<Value>,
    pub setpoint: Option<Value>,
    pub device_on_off: Option<Value>,
}

impl CommandFields {
    /// Pick the known keys out of a decoded JSON object. Unknown keys are ignored.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            dimming: object.get("dimming").cloned(),
            onoff: object.get("onoff").cloned(),
            position: object.get("position").cloned(),
            setpoint: object.get("setpoint").cloned(),
            device_on_off: object.get("deviceOnOff").cloned(),
        }
    }

    /// `onoff: "on" | "off"`.
    pub fn power(on: bool) -> Self {
        Self {
            onoff: Some(Value::String(OnOff::from_bool(on).to_string())),
            ..Self::default()
        }
    }

    /// `dimming: "<n>%"`.
    pub fn brightness(percent: u8) -> Self {
        Self {
            dimming: Some(Value::String(format!("{percent}%"))),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One control action addressed to one node.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCommand {
    pub id: NodeId,
    pub fields: CommandFields,
}

impl OutboundCommand {
    pub fn new(id: impl Into<NodeId>, fields: CommandFields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}
