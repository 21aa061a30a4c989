//! XMPP group-chat session.
//!
//! Logs into the myESmart XMPP service, joins the configured multi-user
//! chat room and shuttles stanzas in both directions: inbound stanzas are
//! classified into [`ChatStanza`] values and delivered through an `mpsc`
//! channel, outbound [`GroupChatMessage`]s are sent as `groupchat`
//! messages to the room.
//!
//! Reconnection is delegated to `tokio-xmpp` (`set_reconnect(true)`). Each
//! time the session comes back online the room is re-joined; queued
//! outbound messages are never replayed.
//!
//! # Example
//!
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! let (handle, mut stanzas) = GroupChatHandle::connect(&config, cancel.clone())?;
//!
//! while let Some(stanza) = stanzas.recv().await {
//!     if let Some(body) = stanza.message_body() {
//!         println!("{body}");
//!     }
//! }
//! ```

use std::str::FromStr;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_xmpp::{AsyncClient, AsyncConfig, AsyncServerConfig, Event};
use xmpp_parsers::message::{Body, Message, MessageType};
use xmpp_parsers::muc::Muc;
use xmpp_parsers::presence::{Presence, Type as PresenceType};
use xmpp_parsers::{Element, Jid};

use crate::error::Error;

const JABBER_CLIENT: &str = "jabber:client";
const STANZA_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

// ── Configuration ────────────────────────────────────────────────────

/// Connection parameters for the group-chat session.
#[derive(Debug, Clone)]
pub struct GroupChatConfig {
    /// Bare account JID, e.g. `"user@myesmart.net"`.
    pub jid: String,
    pub password: SecretString,
    /// Room JID, e.g. `"home@conference.myesmart.net"`.
    pub room: String,
    /// XMPP server host. Default: `xmpp.myesmart.net`.
    pub host: String,
    pub port: u16,
    pub resource: String,
}

impl GroupChatConfig {
    /// Split the account JID into `(local, domain)`.
    pub fn local_and_domain(&self) -> Result<(&str, &str), Error> {
        let (local, rest) = self.jid.split_once('@').ok_or_else(|| Error::InvalidJid {
            jid: self.jid.clone(),
            reason: "expected local@domain".into(),
        })?;
        let domain = rest.split('/').next().unwrap_or(rest);
        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidJid {
                jid: self.jid.clone(),
                reason: "expected local@domain".into(),
            });
        }
        Ok((local, domain))
    }

    /// Full JID used to bind the session (`local@domain/resource`).
    pub fn full_jid(&self) -> Result<String, Error> {
        let (local, domain) = self.local_and_domain()?;
        Ok(format!("{local}@{domain}/{}", self.resource))
    }

    /// Occupant JID used to join the room (`room/local`).
    pub fn occupant_jid(&self) -> Result<String, Error> {
        let (local, _) = self.local_and_domain()?;
        Ok(format!("{}/{local}", self.room))
    }
}

// ── Stanza model ─────────────────────────────────────────────────────

/// Transport-neutral view of an inbound stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStanza {
    Message {
        /// Raw `type` attribute (`groupchat`, `chat`, `error`, ...).
        kind: Option<String>,
        body: Option<String>,
    },
    Presence,
    Iq,
    Other,
}

impl ChatStanza {
    /// Classify a raw stanza element.
    pub fn from_element(element: &Element) -> Self {
        match element.name() {
            "message" => Self::Message {
                kind: element.attr("type").map(String::from),
                body: element
                    .get_child("body", JABBER_CLIENT)
                    .map(Element::text),
            },
            "presence" => Self::Presence,
            "iq" => Self::Iq,
            _ => Self::Other,
        }
    }

    /// The text body, if this is a message carrying a non-empty one.
    ///
    /// `type='error'` messages are bounces of our own sends and never
    /// count as content.
    pub fn message_body(&self) -> Option<&str> {
        match self {
            Self::Message {
                kind,
                body: Some(body),
            } if !body.is_empty() && kind.as_deref() != Some("error") => Some(body),
            _ => None,
        }
    }
}

/// A `groupchat` message to be sent to a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChatMessage {
    pub room: String,
    pub body: String,
}

impl GroupChatMessage {
    fn into_element(self) -> Result<Element, Error> {
        let to = Jid::from_str(&self.room).map_err(|e| Error::InvalidJid {
            jid: self.room.clone(),
            reason: e.to_string(),
        })?;
        let mut message = Message::new(Some(to));
        message.type_ = MessageType::Groupchat;
        message.bodies.insert(String::new(), Body(self.body));
        Ok(message.into())
    }
}

// ── LinkState ────────────────────────────────────────────────────────

/// Session state as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Online,
    Offline,
}

// ── GroupChatHandle ──────────────────────────────────────────────────

/// Handle to a running group-chat session task.
pub struct GroupChatHandle {
    outbound_tx: mpsc::Sender<GroupChatMessage>,
    state: watch::Receiver<LinkState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl GroupChatHandle {
    /// Spawn the session task.
    ///
    /// Returns immediately; the login happens asynchronously. Inbound
    /// stanzas arrive on the returned receiver.
    pub fn connect(
        config: &GroupChatConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<ChatStanza>), Error> {
        let full_jid = config.full_jid()?;
        let jid = Jid::from_str(&full_jid).map_err(|e| Error::InvalidJid {
            jid: full_jid.clone(),
            reason: e.to_string(),
        })?;
        let occupant = config.occupant_jid()?;
        let occupant = Jid::from_str(&occupant).map_err(|e| Error::InvalidJid {
            jid: occupant.clone(),
            reason: e.to_string(),
        })?;

        let mut client = AsyncClient::new_with_config(AsyncConfig {
            jid,
            password: config.password.expose_secret().to_owned(),
            server: AsyncServerConfig::Manual {
                host: config.host.clone(),
                port: config.port,
            },
        });
        client.set_reconnect(true);

        let (stanza_tx, stanza_rx) = mpsc::channel(STANZA_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(LinkState::Connecting);

        tracing::info!(jid = %full_jid, host = %config.host, port = config.port, "Starting XMPP session");

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            session_loop(client, occupant, stanza_tx, outbound_rx, state_tx, task_cancel).await;
        });

        Ok((
            Self {
                outbound_tx,
                state,
                cancel,
                task,
            },
            stanza_rx,
        ))
    }

    /// Sender for outbound room messages.
    pub fn sender(&self) -> mpsc::Sender<GroupChatMessage> {
        self.outbound_tx.clone()
    }

    /// Subscribe to session state changes.
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Wait until the session is online, up to `timeout`.
    pub async fn wait_online(&self, timeout: Duration) -> Result<(), Error> {
        let mut state = self.state.clone();
        match tokio::time::timeout(timeout, state.wait_for(|s| *s == LinkState::Online)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::SessionClosed),
            Err(_) => Err(Error::NotOnline {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Signal the session task to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Drop this handle's sender and wait for the task to drain the queue.
    ///
    /// The task exits once every sender clone is gone and all queued
    /// messages have been written.
    pub async fn finish(self) {
        let Self { outbound_tx, task, .. } = self;
        drop(outbound_tx);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "XMPP session task failed");
        }
    }
}

// ── Session loop ─────────────────────────────────────────────────────

async fn session_loop(
    mut client: AsyncClient,
    occupant: Jid,
    stanza_tx: mpsc::Sender<ChatStanza>,
    mut outbound_rx: mpsc::Receiver<GroupChatMessage>,
    state_tx: watch::Sender<LinkState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = client.next() => {
                let Some(event) = event else {
                    tracing::info!("XMPP stream ended");
                    break;
                };
                match event {
                    Event::Online { .. } => {
                        tracing::info!("XMPP connected");
                        let _ = state_tx.send(LinkState::Online);
                        if let Err(e) = client.send_stanza(join_presence(&occupant)).await {
                            tracing::warn!(error = %e, room = %occupant, "Room join failed");
                        }
                    }
                    Event::Disconnected(e) => {
                        tracing::warn!(error = %e, "XMPP offline");
                        let _ = state_tx.send(LinkState::Offline);
                    }
                    Event::Stanza(element) => {
                        let stanza = ChatStanza::from_element(&element);
                        if stanza_tx.send(stanza).await.is_err() {
                            tracing::debug!("Stanza receiver dropped, stopping session");
                            break;
                        }
                    }
                }
            }
            message = outbound_rx.recv() => {
                let Some(message) = message else {
                    tracing::debug!("Outbound queue closed, stopping session");
                    break;
                };
                if let Err(e) = send_message(&mut client, message).await {
                    tracing::error!(error = %e, "Failed to send room message");
                }
            }
        }
    }

    let _ = state_tx.send(LinkState::Offline);
    tracing::debug!("XMPP session loop exiting");
}

async fn send_message(client: &mut AsyncClient, message: GroupChatMessage) -> Result<(), Error> {
    let element = message.into_element()?;
    client
        .send_stanza(element)
        .await
        .map_err(|e| Error::XmppSend(e.to_string()))
}

/// MUC join presence addressed to `room/nick`.
fn join_presence(occupant: &Jid) -> Element {
    Presence::new(PresenceType::None)
        .with_to(occupant.clone())
        .with_payloads(vec![Muc::new().into()])
        .into()
}

// ── Tests ────────────────────────────────────────────────────────────
