// ── Runtime bridge configuration ──
//
// Describes how to reach the group chat and, optionally, the MQTT
// broker. Carries credentials but never touches disk; `esmart-config`
// builds one from the config file.

use secrecy::SecretString;

pub use esmart_api::{GroupChatConfig, PubSubConfig, ReconnectConfig};

pub const DEFAULT_XMPP_HOST: &str = "xmpp.myesmart.net";
pub const DEFAULT_XMPP_PORT: u16 = 5222;
pub const DEFAULT_RESOURCE: &str = "homebridge";
pub const DEFAULT_MQTT_CLIENT_ID: &str = "esmart-js";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub group_chat: GroupChatConfig,
    /// `None` disables the set-command channel.
    pub pubsub: Option<PubSubConfig>,
}

impl BridgeConfig {
    /// Config for the default myESmart server, pub/sub disabled.
    pub fn new(jid: impl Into<String>, password: SecretString, room: impl Into<String>) -> Self {
        Self {
            group_chat: GroupChatConfig {
                jid: jid.into(),
                password,
                room: room.into(),
                host: DEFAULT_XMPP_HOST.into(),
                port: DEFAULT_XMPP_PORT,
                resource: DEFAULT_RESOURCE.into(),
            },
            pubsub: None,
        }
    }

    pub fn with_pubsub(mut self, pubsub: PubSubConfig) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Sender identity placed in every envelope header.
    pub fn identity(&self) -> &str {
        &self.group_chat.jid
    }

    pub fn room(&self) -> &str {
        &self.group_chat.room
    }
}
