//! MQTT subscriber for externally issued set-commands.
//!
//! Connects to a broker, subscribes to a single topic filter on every
//! `ConnAck` (so the subscription survives broker restarts) and forwards
//! each publish as a [`PubSubMessage`]. This side never publishes.

use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backoff::ReconnectConfig;
use crate::error::Error;
use crate::xmpp::LinkState;

const MESSAGE_CHANNEL_CAPACITY: usize = 256;
const REQUEST_CHANNEL_CAPACITY: usize = 10;
const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

// ── Configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PubSubConfig {
    pub host: String,
    pub port: u16,
    /// `mqtts://` brokers are reached over rustls with the platform roots.
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub client_id: String,
    pub keep_alive: std::time::Duration,
    pub reconnect: ReconnectConfig,
}

impl PubSubConfig {
    /// Build from a broker URL such as `mqtt://user:pw@broker.local:1883`.
    ///
    /// Schemes `mqtt`/`tcp` are plaintext, `mqtts`/`ssl` use TLS. A bare
    /// host name without scheme is accepted as well.
    pub fn from_url(raw: &str, client_id: impl Into<String>) -> Result<Self, Error> {
        let with_scheme = if raw.contains("://") {
            raw.to_owned()
        } else {
            format!("mqtt://{raw}")
        };
        let url = Url::parse(&with_scheme).map_err(|e| Error::InvalidBrokerUrl {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidBrokerUrl {
                url: raw.to_owned(),
                reason: "missing host".into(),
            })?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            other => {
                return Err(Error::InvalidBrokerUrl {
                    url: raw.to_owned(),
                    reason: format!("unsupported scheme '{other}'"),
                });
            }
        };
        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_owned);
        let password = url.password().map(SecretString::from);

        Ok(Self {
            host: host.to_owned(),
            port: url
                .port()
                .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT }),
            tls,
            username,
            password,
            client_id: client_id.into(),
            keep_alive: std::time::Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        })
    }
}

/// A publish received on the subscribed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub topic: String,
    pub payload: Bytes,
}

// ── PubSubHandle ─────────────────────────────────────────────────────

/// Handle to a running subscriber task.
pub struct PubSubHandle {
    state: watch::Receiver<LinkState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PubSubHandle {
    /// Spawn the subscriber. Messages arrive on the returned receiver.
    pub fn connect(
        config: &PubSubConfig,
        filter: &str,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<PubSubMessage>) {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        if let Some(ref username) = config.username {
            let password = config
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_owned())
                .unwrap_or_default();
            options.set_credentials(username.clone(), password);
        }
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(LinkState::Connecting);

        tracing::info!(host = %config.host, port = config.port, tls = config.tls, filter, "Starting MQTT subscriber");

        let task_cancel = cancel.clone();
        let filter = filter.to_owned();
        let reconnect = config.reconnect.clone();
        let task = tokio::spawn(async move {
            subscriber_loop(client, eventloop, filter, message_tx, state_tx, reconnect, task_cancel)
                .await;
        });

        (
            Self {
                state,
                cancel,
                task,
            },
            message_rx,
        )
    }

    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the subscriber task to exit (after [`shutdown`](Self::shutdown)).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "MQTT subscriber task failed");
        }
    }
}

// ── Event loop ───────────────────────────────────────────────────────

async fn subscriber_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    filter: String,
    message_tx: mpsc::Sender<PubSubMessage>,
    state_tx: watch::Sender<LinkState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            notification = eventloop.poll() => match notification {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("MQTT connected");
                    attempt = 0;
                    let _ = state_tx.send(LinkState::Online);
                    if let Err(e) = client.try_subscribe(filter.clone(), QoS::AtMostOnce) {
                        let err = Error::Subscribe { topic: filter.clone(), reason: e.to_string() };
                        tracing::error!(error = %err, "MQTT subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = PubSubMessage {
                        topic: publish.topic,
                        payload: publish.payload,
                    };
                    if message_tx.send(message).await.is_err() {
                        tracing::debug!("PubSub receiver dropped, stopping subscriber");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let err = Error::MqttConnection(e.to_string());
                    tracing::warn!(error = %err, attempt, "MQTT connection error");
                    let _ = state_tx.send(LinkState::Offline);

                    let delay = reconnect.delay_for(attempt);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    let _ = client.try_disconnect();
    let _ = state_tx.send(LinkState::Offline);
    tracing::debug!("MQTT subscriber loop exiting");
}
