//! `esmart encode`: print an envelope without connecting.

use esmart_core::codec;

use crate::cli::{EncodeArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: &EncodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let command = super::outbound_command(&args.node, &args.fields)?;

    let identity = match args.from {
        Some(ref from) => from.clone(),
        None => config::load(global)?
            .xmpp
            .jid
            .ok_or_else(|| CliError::MissingSetting {
                field: "xmpp.jid (or --from)".into(),
            })?,
    };

    let envelope = codec::encode(&identity, &command);
    let text = if args.compact {
        serde_json::to_string(&envelope)?
    } else {
        serde_json::to_string_pretty(&envelope)?
    };
    println!("{text}");
    Ok(())
}
