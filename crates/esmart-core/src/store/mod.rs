// ── Reactive node storage ──

mod collection;
mod registry;

pub use registry::NodeRegistry;
