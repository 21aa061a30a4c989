//! Synchronization engine between myESmart nodes and a local accessory host.
//!
//! - **[`Bridge`]**: owns the node registry and accessory cache, and runs
//!   the single event-loop task that applies inbound frames from the
//!   group chat and the pub/sub channel.
//!
//! - **[`NodeRegistry`]**: reactive id-keyed storage built on `DashMap` and
//!   `tokio::sync::watch`. Upserts merge partial deltas; [`NodeStream`]
//!   vends snapshots.
//!
//! - **[`parser`]** and **[`codec`]**: inbound report / set-command
//!   decoding and outbound `operation` envelope encoding.
//!
//! - **[`AccessoryHost`]**: the seam to whatever exposes accessories to
//!   users. [`MemoryHost`] is the in-process implementation.

pub mod bridge;
pub mod codec;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod model;
pub mod parser;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeInputs};
pub use codec::{OperationCodec, OperationEnvelope};
pub use command::{CommandFields, OutboundCommand};
pub use config::BridgeConfig;
pub use dispatch::Dispatcher;
pub use error::CoreError;
pub use host::{
    Accessory, AccessoryControl, AccessoryHost, Characteristic, CharacteristicKind, MemoryHost,
};
pub use model::{NodeDelta, NodeId, NodeReport, NodeState, OnOff};
pub use parser::{InboundFrame, ParseError, ParsedInbound, SET_TOPIC_FILTER};
pub use store::NodeRegistry;
pub use stream::{NodeSnapshot, NodeStream};
