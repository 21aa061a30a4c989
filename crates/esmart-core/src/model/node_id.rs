// ── Node identity ──
//
// Node ids are assigned by the remote network and arrive either as JSON
// integers or strings. The two forms are distinct keys: `7` and `"7"`
// name different nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Namespace for accessory UUIDs derived from node ids.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x5d2f_0c1e_8a4b_4f7e_9b61_3c0d_2e8f_a417);

/// Canonical identifier for a remote node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Number(i64),
    Text(String),
}

impl NodeId {
    /// Extract an id from a JSON value.
    ///
    /// Strings and integral numbers qualify; `7.0` keys the same node as
    /// `7`. Numbers outside the `i64` range are rejected.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| integral(n.as_f64()?)).map(Self::Number),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Stable UUID for the node's external representation.
    ///
    /// Derived from the textual form of the id, so `7` and `"7"` share a
    /// UUID even though they are distinct registry keys.
    pub fn accessory_uuid(&self) -> Uuid {
        Uuid::new_v5(&ACCESSORY_NAMESPACE, self.to_string().as_bytes())
    }
}

/// `f64` with no fractional part as `i64`; `Display` prints it without
/// an exponent, so out-of-range values fail the parse.
fn integral(f: f64) -> Option<i64> {
    if !f.is_finite() || f.fract() != 0.0 {
        return None;
    }
    f.to_string().parse().ok()
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
