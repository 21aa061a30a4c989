// esmart-api: Async transport clients for the myESmart bridge (XMPP group chat + MQTT)

pub mod backoff;
pub mod error;
pub mod mqtt;
pub mod xmpp;

pub use backoff::ReconnectConfig;
pub use error::Error;
pub use mqtt::{PubSubConfig, PubSubHandle, PubSubMessage};
pub use xmpp::{ChatStanza, GroupChatConfig, GroupChatHandle, GroupChatMessage, LinkState};
