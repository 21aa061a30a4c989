//! `esmart run`: the long-running bridge.

use std::sync::Arc;
use std::time::Duration;

use esmart_api::{GroupChatHandle, LinkState, PubSubHandle};
use esmart_core::{AccessoryHost, Bridge, BridgeInputs, MemoryHost, SET_TOPIC_FILTER};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let bridge_config = esmart_config::to_bridge_config(&cfg)?;
    let cancel = CancellationToken::new();

    let (chat, chat_rx) = GroupChatHandle::connect(&bridge_config.group_chat, cancel.child_token())?;
    tokio::spawn(log_link_state("xmpp", chat.state()));

    let (pubsub, pubsub_rx) = match bridge_config.pubsub {
        Some(ref pubsub_config) => {
            let (handle, rx) =
                PubSubHandle::connect(pubsub_config, SET_TOPIC_FILTER, cancel.child_token());
            tokio::spawn(log_link_state("mqtt", handle.state()));
            (Some(handle), Some(rx))
        }
        None => {
            info!("MQTT disabled");
            (None, None)
        }
    };

    let host: Arc<dyn AccessoryHost> = Arc::new(MemoryHost::new());
    let bridge = Bridge::new(bridge_config, host, chat.sender());
    bridge
        .start(BridgeInputs {
            chat: chat_rx,
            pubsub: pubsub_rx,
        })
        .await?;

    if let Err(e) = chat.wait_online(Duration::from_secs(args.online_timeout)).await {
        warn!(error = %e, "Still waiting for the XMPP session");
    }

    tokio::signal::ctrl_c().await?;
    info!(nodes = bridge.registry().len(), "Shutting down");

    bridge.shutdown().await;
    cancel.cancel();
    if let Some(handle) = pubsub {
        handle.join().await;
    }
    drop(bridge);
    chat.finish().await;
    Ok(())
}

async fn log_link_state(link: &'static str, mut state: watch::Receiver<LinkState>) {
    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        match current {
            LinkState::Offline => warn!(link, "Link offline"),
            LinkState::Online => info!(link, "Link online"),
            LinkState::Connecting => info!(link, "Link connecting"),
        }
    }
}
