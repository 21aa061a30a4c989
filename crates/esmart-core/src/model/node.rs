// ── Node state and deltas ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::node_id::NodeId;
use super::value::{is_truthy, percent};

/// Power state as reported by the remote network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    /// Only the literal `"on"` means powered; every other value reads as off.
    pub fn from_wire(value: &Value) -> Self {
        if value.as_str() == Some("on") {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

/// A partial update for one node.
///
/// `None` means "not mentioned": merging leaves the prior value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDelta {
    pub onoff: Option<OnOff>,
    pub dimming: Option<u8>,
    pub position: Option<Value>,
    pub setpoint: Option<Value>,
    pub device_on_off: Option<Value>,
}

impl NodeDelta {
    /// Build a delta from a report's `data` object.
    ///
    /// `onoff` and `dimming` count as present only when truthy (an empty
    /// string is "no information"). The opaque fields are present whenever
    /// the key exists, `null` included.
    pub fn from_data(data: &Map<String, Value>) -> Self {
        Self {
            onoff: data
                .get("onoff")
                .filter(|v| is_truthy(v))
                .map(OnOff::from_wire),
            dimming: data.get("dimming").filter(|v| is_truthy(v)).map(percent),
            position: data.get("position").cloned(),
            setpoint: data.get("setpoint").cloned(),
            device_on_off: data.get("deviceOnOff").cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.onoff.is_none()
            && self.dimming.is_none()
            && self.position.is_none()
            && self.setpoint.is_none()
            && self.device_on_off.is_none()
    }
}

/// Last-known state of one remote node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onoff: Option<OnOff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_on_off: Option<Value>,
}

impl NodeState {
    /// A state carrying only the delta's fields.
    pub fn from_delta(id: NodeId, delta: &NodeDelta) -> Self {
        let mut state = Self {
            id,
            onoff: None,
            dimming: None,
            position: None,
            setpoint: None,
            device_on_off: None,
        };
        state.merge(delta);
        state
    }

    /// Overwrite exactly the fields present in `delta`.
    pub fn merge(&mut self, delta: &NodeDelta) {
        if let Some(onoff) = delta.onoff {
            self.onoff = Some(onoff);
        }
        if let Some(dimming) = delta.dimming {
            self.dimming = Some(dimming);
        }
        if let Some(ref position) = delta.position {
            self.position = Some(position.clone());
        }
        if let Some(ref setpoint) = delta.setpoint {
            self.setpoint = Some(setpoint.clone());
        }
        if let Some(ref device_on_off) = delta.device_on_off {
            self.device_on_off = Some(device_on_off.clone());
        }
    }

    pub fn is_on(&self) -> bool {
        self.onoff.is_some_and(OnOff::is_on)
    }

    pub fn brightness(&self) -> u8 {
        self.dimming.unwrap_or(0)
    }
}

/// One entry of an inbound report batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    pub id: NodeId,
    pub delta: NodeDelta,
}
