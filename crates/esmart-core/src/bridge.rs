// ── Bridge engine ──
//
// Owns the node registry and the accessory cache, and runs the single
// event-loop task that applies inbound frames. Control actions bypass
// the loop: they encode and enqueue directly.

use std::sync::Arc;

use dashmap::DashMap;
use esmart_api::{ChatStanza, GroupChatMessage, PubSubMessage};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::codec::OperationCodec;
use crate::command::OutboundCommand;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::host::{Accessory, AccessoryControl, AccessoryHost, Characteristic};
use crate::model::{NodeDelta, NodeId, NodeReport};
use crate::parser::{self, InboundFrame, ParsedInbound};
use crate::store::NodeRegistry;
use crate::stream::NodeStream;

const INBOUND_CHANNEL_SIZE: usize = 256;

/// Transport receivers consumed by the event loop.
pub struct BridgeInputs {
    pub chat: mpsc::Receiver<ChatStanza>,
    pub pubsub: Option<mpsc::Receiver<PubSubMessage>>,
}

// ── Bridge ───────────────────────────────────────────────────────────

/// The synchronization engine.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Does nothing until
/// [`start`](Self::start) spawns the event loop.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    registry: Arc<NodeRegistry>,
    host: Arc<dyn AccessoryHost>,
    dispatcher: Dispatcher,
    /// One accessory per node, created or restored once.
    accessories: DashMap<NodeId, Accessory>,
    inbound_tx: mpsc::Sender<InboundFrame>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundFrame>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge that sends operations into `outbound_tx`.
    pub fn new(
        config: BridgeConfig,
        host: Arc<dyn AccessoryHost>,
        outbound_tx: mpsc::Sender<GroupChatMessage>,
    ) -> Self {
        let codec = OperationCodec::new(config.identity(), config.room());
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                registry: Arc::new(NodeRegistry::new()),
                host,
                dispatcher: Dispatcher::new(codec, outbound_tx),
                accessories: DashMap::new(),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.inner.registry
    }

    /// Subscribe to registry snapshots.
    pub fn nodes(&self) -> NodeStream {
        self.inner.registry.subscribe()
    }

    pub fn accessory(&self, node_id: &NodeId) -> Option<Accessory> {
        self.inner.accessories.get(node_id).map(|r| r.value().clone())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the event loop. Fails if already started.
    pub async fn start(&self, inputs: BridgeInputs) -> Result<(), CoreError> {
        let inbound_rx = self
            .inner
            .inbound_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::Internal("bridge already started".into()))?;

        let bridge = self.clone();
        let handle = tokio::spawn(event_loop(bridge, inputs, inbound_rx));
        *self.inner.task.lock().await = Some(handle);
        info!(room = %self.inner.config.room(), "Bridge started");
        Ok(())
    }

    /// Stop the event loop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Bridge task failed");
            }
        }
        debug!("Bridge stopped");
    }

    /// Queue a frame for the event loop.
    pub async fn submit(&self, frame: InboundFrame) -> Result<(), CoreError> {
        self.inner
            .inbound_tx
            .send(frame)
            .await
            .map_err(|_| CoreError::Disconnected)
    }

    // ── Accessories ──────────────────────────────────────────────────

    /// Adopt an accessory the host kept from an earlier run.
    ///
    /// Binds its controls and records the node, so later reports update
    /// it. The host already publishes it, so it is never registered
    /// again. Call before [`start`](Self::start).
    pub fn restore_accessory(&self, accessory: Accessory) {
        let node_id = accessory.node_id.clone();
        if self.inner.accessories.contains_key(&node_id) {
            debug!(node_id = %node_id, "Accessory already known, ignoring restore");
            return;
        }

        self.inner.registry.upsert(&node_id, &NodeDelta::default());
        self.inner.host.bind(&accessory, self.control(&node_id));
        self.inner.accessories.insert(node_id.clone(), accessory);
        info!(node_id = %node_id, "Loaded accessory from cache");
    }

    /// Read/write callbacks for one node.
    pub fn control(&self, node_id: &NodeId) -> AccessoryControl {
        AccessoryControl::new(
            node_id.clone(),
            Arc::clone(&self.inner.registry),
            self.inner.dispatcher.clone(),
        )
    }

    /// Encode and enqueue one operation.
    pub fn dispatch(&self, command: &OutboundCommand) -> Result<(), CoreError> {
        self.inner.dispatcher.dispatch(command)
    }

    // ── Frame processing ─────────────────────────────────────────────

    /// Apply one frame. Only the event loop (and tests) call this.
    pub(crate) fn process(&self, frame: &InboundFrame) -> Result<(), CoreError> {
        match parser::parse(frame)? {
            ParsedInbound::Report(reports) => {
                trace!(count = reports.len(), "State report");
                for report in &reports {
                    self.apply_report(report);
                }
                self.inner.registry.mark_report();
                Ok(())
            }
            ParsedInbound::SetCommand(command) => {
                debug!(node_id = %command.id, "Forwarding set-command");
                self.dispatch(&command)
            }
        }
    }

    fn apply_report(&self, report: &NodeReport) {
        let (state, _) = self.inner.registry.upsert(&report.id, &report.delta);

        let cached = self.accessory(&report.id);
        if let Some(accessory) = cached {
            for value in Characteristic::changed_by(&report.delta, &state) {
                self.inner.host.update(&accessory, value);
            }
            return;
        }

        let accessory = self.inner.host.create(&report.id);
        self.inner
            .accessories
            .insert(report.id.clone(), accessory.clone());
        self.inner.host.register(&accessory);
        self.inner.host.bind(&accessory, self.control(&report.id));
        info!(node_id = %report.id, "Added accessory");

        for value in Characteristic::all(&state) {
            self.inner.host.update(&accessory, value);
        }
    }

    fn handle(&self, frame: &InboundFrame) {
        match self.process(frame) {
            Ok(()) => {}
            Err(CoreError::Parse(e)) if e.is_noise() => trace!("Ignoring non-message stanza"),
            Err(CoreError::Parse(e)) => debug!(error = %e, "Discarding inbound frame"),
            Err(e) => warn!(error = %e, "Failed to forward command"),
        }
    }
}

// ── Event loop ───────────────────────────────────────────────────────

async fn event_loop(
    bridge: Bridge,
    inputs: BridgeInputs,
    mut inbound_rx: mpsc::Receiver<InboundFrame>,
) {
    let cancel = bridge.inner.cancel.clone();
    let mut chat = Some(inputs.chat);
    let mut pubsub = inputs.pubsub;

    // Unbiased: a chat burst (room history on join) must not starve
    // pub/sub set-commands.
    while !cancel.is_cancelled() {
        tokio::select! {
            () = cancel.cancelled() => break,
            stanza = recv_or_pending(&mut chat) => match stanza {
                Some(stanza) => bridge.handle(&InboundFrame::Chat(stanza)),
                None => {
                    info!("Group-chat stream closed");
                    chat = None;
                }
            },
            message = recv_or_pending(&mut pubsub) => match message {
                Some(message) => bridge.handle(&InboundFrame::PubSub(message)),
                None => {
                    info!("Pub/sub stream closed");
                    pubsub = None;
                }
            },
            frame = inbound_rx.recv() => {
                let Some(frame) = frame else { break };
                bridge.handle(&frame);
            }
        }
    }

    debug!("Bridge event loop exiting");
}

/// Receive from an optional channel; pends forever when absent.
async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::time::Duration;

    struct Harness {
        bridge: Bridge,
        host: Arc<MemoryHost>,
        outbound: mpsc::Receiver<GroupChatMessage>,
    }

    fn harness() -> Harness {
        let config = BridgeConfig::new(
            "alice@myesmart.net",
            SecretString::from("pw".to_string()),
            "home@conference.myesmart.net",
        );
        let host = Arc::new(MemoryHost::new());
        let (tx, outbound) = mpsc::channel(16);
        let bridge = Bridge::new(config, Arc::clone(&host) as Arc<dyn AccessoryHost>, tx);
        Harness {
            bridge,
            host,
            outbound,
        }
    }

    fn report(nodes: &Value) -> InboundFrame {
        InboundFrame::Chat(ChatStanza::Message {
            kind: Some("groupchat".into()),
            body: Some(json!({"body": {"nodes": nodes}}).to_string()),
        })
    }

    fn publish(topic: &str, payload: &str) -> InboundFrame {
        InboundFrame::PubSub(PubSubMessage {
            topic: topic.into(),
            payload: Bytes::copy_from_slice(payload.as_bytes()),
        })
    }

    fn sent(rx: &mut mpsc::Receiver<GroupChatMessage>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(serde_json::from_str(&message.body).unwrap());
        }
        out
    }

    #[test]
    fn report_upserts_every_entry() {
        let h = harness();
        let frame = report(&json!([
            {"id": 1, "data": {"onoff": "on"}},
            {"id": 2, "data": {"dimming": "10%"}},
            {"id": "hall"},
        ]));
        h.bridge.process(&frame).unwrap();

        assert_eq!(h.bridge.registry().len(), 3);
        assert_eq!(h.host.len(), 3);
        assert!(h.bridge.registry().last_report().is_some());
    }

    #[test]
    fn replayed_report_leaves_state_unchanged() {
        let h = harness();
        let frame = report(&json!([{"id": 7, "data": {"onoff": "on", "dimming": "80%"}}]));
        h.bridge.process(&frame).unwrap();
        let before = h.bridge.registry().get(&NodeId::Number(7)).unwrap();

        h.bridge.process(&frame).unwrap();
        let after = h.bridge.registry().get(&NodeId::Number(7)).unwrap();

        assert_eq!(before, after);
        assert_eq!(h.host.get(&NodeId::Number(7)).unwrap().registrations, 1);
    }

    #[test]
    fn first_report_creates_and_later_report_updates_brightness_only() {
        let h = harness();
        h.bridge
            .process(&report(&json!([{"id": 7, "data": {"onoff": "on", "dimming": "80%"}}])))
            .unwrap();

        let hosted = h.host.get(&NodeId::Number(7)).unwrap();
        assert_eq!(hosted.accessory.display_name, "Node 7");
        assert_eq!(hosted.on, Some(true));
        assert_eq!(hosted.brightness, Some(80));

        h.bridge
            .process(&report(&json!([{"id": 7, "data": {"dimming": "30%"}}])))
            .unwrap();

        let hosted = h.host.get(&NodeId::Number(7)).unwrap();
        assert_eq!(hosted.on, Some(true));
        assert_eq!(hosted.brightness, Some(30));
        assert_eq!(hosted.registrations, 1);
    }

    #[test]
    fn new_accessory_is_initialized_from_full_state() {
        let h = harness();
        h.bridge
            .process(&report(&json!([{"id": 3, "data": {"position": 40}}])))
            .unwrap();

        let hosted = h.host.get(&NodeId::Number(3)).unwrap();
        assert_eq!(hosted.on, Some(false));
        assert_eq!(hosted.brightness, Some(0));
    }

    #[test]
    fn malformed_body_mutates_nothing() {
        let h = harness();
        let frame = InboundFrame::Chat(ChatStanza::Message {
            kind: Some("groupchat".into()),
            body: Some("{oops".into()),
        });

        assert!(matches!(h.bridge.process(&frame), Err(CoreError::Parse(_))));
        h.bridge.handle(&frame);

        assert!(h.bridge.registry().is_empty());
        assert_eq!(h.bridge.registry().version(), 0);
        assert!(h.host.is_empty());
    }

    #[test]
    fn set_command_produces_exactly_one_envelope() {
        let mut h = harness();
        h.bridge
            .process(&publish("esmart/set/node/42", r#"{"onoff":"off"}"#))
            .unwrap();

        let sent = sent(&mut h.outbound);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["body"], json!([{"id": 42, "onoff": "off"}]));
        assert_eq!(sent[0]["headers"]["to"], json!("master"));
    }

    #[test]
    fn set_command_for_unknown_node_is_forwarded() {
        let mut h = harness();
        assert!(h.bridge.registry().get(&NodeId::Number(999)).is_none());

        h.bridge
            .process(&publish("esmart/set/node/999", r#"{"position":0}"#))
            .unwrap();

        let sent = sent(&mut h.outbound);
        assert_eq!(sent[0]["body"], json!([{"id": 999, "position": 0}]));
        assert!(h.bridge.registry().is_empty());
    }

    #[test]
    fn user_write_is_optimistic_and_leaves_registry_alone() {
        let mut h = harness();
        h.bridge
            .process(&report(&json!([{"id": 5, "data": {"onoff": "off"}}])))
            .unwrap();

        h.host.set(&NodeId::Number(5), Characteristic::Brightness(55)).unwrap();

        let sent = sent(&mut h.outbound);
        assert_eq!(sent[0]["body"], json!([{"id": 5, "dimming": "55%"}]));
        assert_eq!(h.host.get(&NodeId::Number(5)).unwrap().brightness, Some(55));
        assert_eq!(h.bridge.registry().get(&NodeId::Number(5)).unwrap().dimming, None);
    }

    #[test]
    fn restored_accessory_is_updated_not_reregistered() {
        let h = harness();
        h.bridge.restore_accessory(Accessory::for_node(&NodeId::Number(8)));
        assert!(h.bridge.registry().contains(&NodeId::Number(8)));

        h.bridge
            .process(&report(&json!([{"id": 8, "data": {"onoff": "on"}}])))
            .unwrap();

        let hosted = h.host.get(&NodeId::Number(8)).unwrap();
        assert_eq!(hosted.registrations, 0);
        assert!(hosted.control.is_some());
        assert_eq!(hosted.on, Some(true));
        assert_eq!(hosted.brightness, None);
    }

    #[test]
    fn restored_accessory_controls_are_live() {
        let mut h = harness();
        h.bridge.restore_accessory(Accessory::for_node(&NodeId::Number(9)));
        assert_eq!(h.host.get(&NodeId::Number(9)).unwrap().registrations, 0);

        h.host.set(&NodeId::Number(9), Characteristic::On(false)).unwrap();
        let sent = sent(&mut h.outbound);
        assert_eq!(sent[0]["body"], json!([{"id": 9, "onoff": "off"}]));
    }

    #[test]
    fn presence_is_noise() {
        let h = harness();
        let frame = InboundFrame::Chat(ChatStanza::Presence);
        let err = h.bridge.process(&frame).unwrap_err();
        assert!(matches!(err, CoreError::Parse(ref e) if e.is_noise()));
    }

    #[tokio::test]
    async fn event_loop_applies_transport_frames() {
        let mut h = harness();
        let (chat_tx, chat_rx) = mpsc::channel(4);
        let (pubsub_tx, pubsub_rx) = mpsc::channel(4);
        h.bridge
            .start(BridgeInputs {
                chat: chat_rx,
                pubsub: Some(pubsub_rx),
            })
            .await
            .unwrap();

        let mut nodes = h.bridge.nodes();
        let InboundFrame::Chat(stanza) = report(&json!([{"id": 11, "data": {"onoff": "on"}}])) else {
            unreachable!()
        };
        chat_tx.send(stanza).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(1), nodes.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot[0].id, NodeId::Number(11));

        pubsub_tx
            .send(PubSubMessage {
                topic: "esmart/set/node/11".into(),
                payload: Bytes::from_static(br#"{"onoff":"off"}"#),
            })
            .await
            .unwrap();
        let message = tokio::time::timeout(Duration::from_secs(1), h.outbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(message.body.contains(r#""onoff":"off""#));

        h.bridge
            .submit(report(&json!([{"id": 12}])))
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), nodes.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(h.bridge.registry().contains(&NodeId::Number(12)));

        h.bridge.shutdown().await;
        assert!(matches!(
            h.bridge
                .start(BridgeInputs {
                    chat: mpsc::channel(1).1,
                    pubsub: None,
                })
                .await,
            Err(CoreError::Internal(_))
        ));
    }
}
