//! Command handlers.

pub mod config_cmd;
pub mod encode;
pub mod run;
pub mod send;

use esmart_core::{CommandFields, NodeId, OutboundCommand};
use serde_json::Value;

use crate::cli::FieldArgs;
use crate::error::CliError;

/// Integers name numeric nodes; anything else is a string id.
pub fn parse_node_id(raw: &str) -> Result<NodeId, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::Validation {
            field: "node".into(),
            reason: "node id cannot be empty".into(),
        });
    }
    Ok(raw
        .parse::<i64>()
        .map_or_else(|_| NodeId::from(raw), NodeId::Number))
}

fn parse_json(field: &str, raw: Option<&str>) -> Result<Option<Value>, CliError> {
    raw.map(|text| {
        serde_json::from_str(text).map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("not a JSON value: {e}"),
        })
    })
    .transpose()
}

/// Build the command described by `node` and the field flags.
pub fn outbound_command(node: &str, args: &FieldArgs) -> Result<OutboundCommand, CliError> {
    let fields = CommandFields {
        dimming: args.dimming.map(|n| Value::String(format!("{n}%"))),
        onoff: args.onoff.map(|p| Value::String(p.as_str().into())),
        position: parse_json("--position", args.position.as_deref())?,
        setpoint: parse_json("--setpoint", args.setpoint.as_deref())?,
        device_on_off: parse_json("--device-on-off", args.device_on_off.as_deref())?,
    };
    if fields.is_empty() {
        return Err(CliError::Validation {
            field: "fields".into(),
            reason: "give at least one of --onoff, --dimming, --position, --setpoint, --device-on-off"
                .into(),
        });
    }
    Ok(OutboundCommand {
        id: parse_node_id(node)?,
        fields,
    })
}
