// ── Accessory host boundary ──
//
// The bridge exposes each node to a local accessory host (a home
// automation framework, or the in-process `MemoryHost`). The host owns
// the user-facing objects; the bridge pushes characteristic updates and
// receives user actions through `AccessoryControl`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::{CommandFields, OutboundCommand};
use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::model::{NodeDelta, NodeId, NodeState};
use crate::store::NodeRegistry;

// ── Characteristics ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicKind {
    On,
    Brightness,
}

/// A visible accessory value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    On(bool),
    Brightness(u8),
}

impl Characteristic {
    /// Read `kind` from a node state. Absent fields read as off / 0.
    pub fn read(state: &NodeState, kind: CharacteristicKind) -> Self {
        match kind {
            CharacteristicKind::On => Self::On(state.is_on()),
            CharacteristicKind::Brightness => Self::Brightness(state.brightness()),
        }
    }

    /// Both characteristics, for initializing a new accessory.
    pub fn all(state: &NodeState) -> [Self; 2] {
        [
            Self::read(state, CharacteristicKind::On),
            Self::read(state, CharacteristicKind::Brightness),
        ]
    }

    /// Only the characteristics whose source field `delta` touched.
    pub fn changed_by(delta: &NodeDelta, state: &NodeState) -> Vec<Self> {
        let mut out = Vec::with_capacity(2);
        if delta.onoff.is_some() {
            out.push(Self::read(state, CharacteristicKind::On));
        }
        if delta.dimming.is_some() {
            out.push(Self::read(state, CharacteristicKind::Brightness));
        }
        out
    }

    /// The command fields a user write of this value produces.
    pub fn command_fields(self) -> CommandFields {
        match self {
            Self::On(on) => CommandFields::power(on),
            Self::Brightness(percent) => CommandFields::brightness(percent.min(100)),
        }
    }
}

// ── Accessory ────────────────────────────────────────────────────────

/// The host-side representation of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessory {
    pub node_id: NodeId,
    pub uuid: Uuid,
    pub display_name: String,
}

impl Accessory {
    pub fn for_node(node_id: &NodeId) -> Self {
        Self {
            node_id: node_id.clone(),
            uuid: node_id.accessory_uuid(),
            display_name: format!("Node {node_id}"),
        }
    }
}

// ── Host trait ───────────────────────────────────────────────────────

/// A framework that exposes accessories to users.
pub trait AccessoryHost: Send + Sync {
    fn create(&self, node_id: &NodeId) -> Accessory {
        Accessory::for_node(node_id)
    }

    /// Publish a newly created accessory.
    fn register(&self, accessory: &Accessory);

    /// Attach user-action callbacks to an accessory the host holds,
    /// whether just registered or restored from its own cache.
    fn bind(&self, accessory: &Accessory, control: AccessoryControl);

    /// Push a characteristic value to the host.
    fn update(&self, accessory: &Accessory, value: Characteristic);
}

/// Callbacks the host uses when a user reads or writes a characteristic.
#[derive(Clone)]
pub struct AccessoryControl {
    node_id: NodeId,
    registry: Arc<NodeRegistry>,
    dispatcher: Dispatcher,
}

impl AccessoryControl {
    pub(crate) fn new(node_id: NodeId, registry: Arc<NodeRegistry>, dispatcher: Dispatcher) -> Self {
        Self {
            node_id,
            registry,
            dispatcher,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Current value from the registry. Unknown nodes read as off / 0.
    pub fn read(&self, kind: CharacteristicKind) -> Characteristic {
        let state = self.registry.get(&self.node_id).unwrap_or_else(|| {
            Arc::new(NodeState::from_delta(self.node_id.clone(), &NodeDelta::default()))
        });
        Characteristic::read(&state, kind)
    }

    /// Forward a user write as an operation. Returns once queued; the
    /// registry only changes when the node reports back.
    pub fn write(&self, value: Characteristic) -> Result<(), CoreError> {
        let command = OutboundCommand {
            id: self.node_id.clone(),
            fields: value.command_fields(),
        };
        self.dispatcher.dispatch(&command)
    }
}

impl std::fmt::Debug for AccessoryControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessoryControl")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

// ── MemoryHost ───────────────────────────────────────────────────────

/// One accessory as held by [`MemoryHost`].
#[derive(Debug, Clone)]
pub struct HostedAccessory {
    pub accessory: Accessory,
    /// `None` until the bridge binds the accessory.
    pub control: Option<AccessoryControl>,
    pub on: Option<bool>,
    pub brightness: Option<u8>,
    /// Number of `register` calls seen for this node.
    pub registrations: usize,
}

/// In-process accessory host.
///
/// Keeps every accessory and the last value pushed for each
/// characteristic. Used by the daemon and by tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    accessories: Mutex<BTreeMap<NodeId, HostedAccessory>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<NodeId, HostedAccessory>> {
        self.accessories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, node_id: &NodeId) -> Option<HostedAccessory> {
        self.lock().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Simulate a user action: set the value locally, then forward it.
    pub fn set(&self, node_id: &NodeId, value: Characteristic) -> Result<(), CoreError> {
        let control = {
            let mut accessories = self.lock();
            let hosted = accessories.get_mut(node_id).ok_or_else(|| {
                CoreError::Internal(format!("no accessory registered for node {node_id}"))
            })?;
            let control = hosted.control.clone().ok_or_else(|| {
                CoreError::Internal(format!("accessory for node {node_id} has no controls bound"))
            })?;
            apply(hosted, value);
            control
        };
        control.write(value)
    }
}

fn apply(hosted: &mut HostedAccessory, value: Characteristic) {
    match value {
        Characteristic::On(on) => hosted.on = Some(on),
        Characteristic::Brightness(percent) => hosted.brightness = Some(percent),
    }
}

impl MemoryHost {
    fn entry<'a>(
        accessories: &'a mut BTreeMap<NodeId, HostedAccessory>,
        accessory: &Accessory,
    ) -> &'a mut HostedAccessory {
        accessories
            .entry(accessory.node_id.clone())
            .or_insert_with(|| HostedAccessory {
                accessory: accessory.clone(),
                control: None,
                on: None,
                brightness: None,
                registrations: 0,
            })
    }
}

impl AccessoryHost for MemoryHost {
    fn register(&self, accessory: &Accessory) {
        tracing::info!(node_id = %accessory.node_id, name = %accessory.display_name, "Accessory registered");
        let mut accessories = self.lock();
        Self::entry(&mut accessories, accessory).registrations += 1;
    }

    fn bind(&self, accessory: &Accessory, control: AccessoryControl) {
        tracing::debug!(node_id = %accessory.node_id, "Accessory controls bound");
        let mut accessories = self.lock();
        Self::entry(&mut accessories, accessory).control = Some(control);
    }

    fn update(&self, accessory: &Accessory, value: Characteristic) {
        tracing::debug!(node_id = %accessory.node_id, ?value, "Characteristic updated");
        if let Some(hosted) = self.lock().get_mut(&accessory.node_id) {
            apply(hosted, value);
        } else {
            tracing::warn!(node_id = %accessory.node_id, "Update for unregistered accessory");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::OperationCodec;
    use crate::model::OnOff;
    use esmart_api::GroupChatMessage;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    fn control(
        id: i64,
        registry: &Arc<NodeRegistry>,
    ) -> (AccessoryControl, mpsc::Receiver<GroupChatMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = Dispatcher::new(OperationCodec::new("a@b", "room@c"), tx);
        (
            AccessoryControl::new(NodeId::Number(id), Arc::clone(registry), dispatcher),
            rx,
        )
    }

    fn sent_body(rx: &mut mpsc::Receiver<GroupChatMessage>) -> Value {
        let message = rx.try_recv().unwrap();
        serde_json::from_str::<Value>(&message.body).unwrap()["body"].clone()
    }

    #[test]
    fn accessory_name_and_uuid_follow_node_id() {
        let accessory = Accessory::for_node(&NodeId::Number(12));
        assert_eq!(accessory.display_name, "Node 12");
        assert_eq!(accessory.uuid, NodeId::Number(12).accessory_uuid());
    }

    #[test]
    fn read_uses_current_registry_state() {
        let registry = Arc::new(NodeRegistry::new());
        let (control, _rx) = control(1, &registry);
        assert_eq!(control.read(CharacteristicKind::On), Characteristic::On(false));

        registry.upsert(
            &NodeId::Number(1),
            &NodeDelta {
                onoff: Some(OnOff::On),
                dimming: Some(64),
                ..NodeDelta::default()
            },
        );
        assert_eq!(control.read(CharacteristicKind::On), Characteristic::On(true));
        assert_eq!(
            control.read(CharacteristicKind::Brightness),
            Characteristic::Brightness(64)
        );
    }

    #[test]
    fn writes_send_one_field_and_leave_registry_alone() {
        let registry = Arc::new(NodeRegistry::new());
        let (control, mut rx) = control(4, &registry);

        control.write(Characteristic::On(true)).unwrap();
        assert_eq!(sent_body(&mut rx), json!([{"id": 4, "onoff": "on"}]));

        control.write(Characteristic::Brightness(25)).unwrap();
        assert_eq!(sent_body(&mut rx), json!([{"id": 4, "dimming": "25%"}]));

        assert!(registry.is_empty());
    }

    #[test]
    fn memory_host_records_values_and_forwards_sets() {
        let registry = Arc::new(NodeRegistry::new());
        let (control, mut rx) = control(2, &registry);
        let host = MemoryHost::new();
        let accessory = host.create(&NodeId::Number(2));

        host.register(&accessory);
        host.bind(&accessory, control);
        host.update(&accessory, Characteristic::Brightness(10));
        host.set(&NodeId::Number(2), Characteristic::On(false)).unwrap();

        let hosted = host.get(&NodeId::Number(2)).unwrap();
        assert_eq!(hosted.brightness, Some(10));
        assert_eq!(hosted.on, Some(false));
        assert_eq!(hosted.registrations, 1);
        assert_eq!(sent_body(&mut rx), json!([{"id": 2, "onoff": "off"}]));
    }

    #[test]
    fn bound_without_register_is_writable() {
        let registry = Arc::new(NodeRegistry::new());
        let (control, mut rx) = control(5, &registry);
        let host = MemoryHost::new();
        let accessory = Accessory::for_node(&NodeId::Number(5));

        host.bind(&accessory, control);
        host.set(&NodeId::Number(5), Characteristic::Brightness(70)).unwrap();

        assert_eq!(host.get(&NodeId::Number(5)).unwrap().registrations, 0);
        assert_eq!(sent_body(&mut rx), json!([{"id": 5, "dimming": "70%"}]));
    }

    #[test]
    fn registered_but_unbound_rejects_writes() {
        let host = MemoryHost::new();
        let accessory = Accessory::for_node(&NodeId::Number(6));
        host.register(&accessory);
        assert!(host.set(&NodeId::Number(6), Characteristic::On(true)).is_err());
        assert_eq!(host.get(&NodeId::Number(6)).unwrap().on, None);
    }

    #[test]
    fn memory_host_rejects_unknown_node() {
        let host = MemoryHost::new();
        assert!(matches!(
            host.set(&NodeId::Number(1), Characteristic::On(true)),
            Err(CoreError::Internal(_))
        ));
    }
}
