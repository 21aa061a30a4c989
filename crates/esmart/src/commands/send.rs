//! `esmart send`: one operation, then exit.

use std::time::Duration;

use esmart_api::GroupChatHandle;
use esmart_core::{CoreError, OperationCodec};
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalOpts, SendArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: &SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let command = super::outbound_command(&args.node, &args.fields)?;
    let cfg = config::load(global)?;
    let bridge_config = esmart_config::to_bridge_config(&cfg)?;
    let codec = OperationCodec::new(bridge_config.identity(), bridge_config.room());
    let message = codec.message(&command)?;

    let cancel = CancellationToken::new();
    // Keep the stanza receiver alive so the session does not stop early.
    let (chat, _stanzas) = GroupChatHandle::connect(&bridge_config.group_chat, cancel)?;

    if let Err(e) = chat.wait_online(Duration::from_secs(args.timeout)).await {
        chat.shutdown();
        chat.finish().await;
        return Err(e.into());
    }

    chat.sender()
        .send(message)
        .await
        .map_err(|_| CoreError::Disconnected)?;
    tracing::info!(node_id = %command.id, "Operation sent");

    // Closing the queue lets the session flush and stop.
    chat.finish().await;
    eprintln!("Sent operation for node {}", command.id);
    Ok(())
}
