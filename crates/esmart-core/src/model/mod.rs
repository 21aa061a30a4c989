// ── Domain model ──

mod node;
mod node_id;
pub mod value;

pub use node::{NodeDelta, NodeReport, NodeState, OnOff};
pub use node_id::NodeId;
