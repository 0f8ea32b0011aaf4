//! WebSocket push-event feed.
//!
//! Connects to the upstream notification socket, reconnects on failure and publishes every
//! `{exchange, timestamp}` frame as a [`PushEvent`] on a broadcast channel.

use crate::model::PushEvent;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Push feed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFeedConfig {
    /// WebSocket server URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Reconnection delay after disconnect
    pub reconnect_delay: Duration,
    /// Broadcast channel capacity
    pub channel_capacity: usize,
}

impl Default for PushFeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9001".to_string(),
            ping_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(2),
            channel_capacity: 256,
        }
    }
}

impl PushFeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set broadcast channel capacity
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

impl FeedStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FeedStatus::Connected => "connected",
            FeedStatus::Disconnected => "disconnected",
            FeedStatus::Reconnecting => "reconnecting",
        }
    }
}

/// Decoded text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    Welcome,
    Event(PushEvent),
    Unrecognised(String),
}

/// Classify one text frame from the push socket.
pub fn parse_frame(text: &str) -> FeedFrame {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(error) => return FeedFrame::Unrecognised(error.to_string()),
    };

    if value.get("type").and_then(Value::as_str) == Some("welcome") {
        return FeedFrame::Welcome;
    }

    match serde_json::from_value::<PushEvent>(value) {
        Ok(event) => FeedFrame::Event(event),
        Err(error) => FeedFrame::Unrecognised(error.to_string()),
    }
}

/// Reconnecting WebSocket client for push events.
#[derive(Debug)]
pub struct PushFeed {
    config: PushFeedConfig,
}

impl PushFeed {
    pub fn new(config: PushFeedConfig) -> Self {
        Self { config }
    }

    /// Spawn the connection loop.
    pub fn start(self) -> PushFeedHandle {
        let (events_tx, _) = broadcast::channel(self.config.channel_capacity);
        let (status_tx, status_rx) = watch::channel(FeedStatus::Disconnected);

        let task = tokio::spawn(run_feed_loop(self.config, events_tx.clone(), status_tx));

        PushFeedHandle {
            events: events_tx,
            status: status_rx,
            task,
        }
    }
}

/// Running [`PushFeed`]. Dropping the handle stops the connection loop.
#[derive(Debug)]
pub struct PushFeedHandle {
    events: broadcast::Sender<PushEvent>,
    status: watch::Receiver<FeedStatus>,
    task: JoinHandle<()>,
}

impl PushFeedHandle {
    /// New receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }
}

impl Drop for PushFeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connection loop with auto-reconnect
async fn run_feed_loop(
    config: PushFeedConfig,
    events_tx: broadcast::Sender<PushEvent>,
    status_tx: watch::Sender<FeedStatus>,
) {
    info!(url = %config.url, "starting push feed");

    loop {
        let _ = status_tx.send(FeedStatus::Reconnecting);

        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                info!(url = %config.url, "connected to push feed");
                let _ = status_tx.send(FeedStatus::Connected);

                let (mut write, mut read) = stream.split();
                let mut ping = tokio::time::interval(config.ping_interval);
                ping.tick().await;

                loop {
                    tokio::select! {
                        _ = ping.tick() => {
                            if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                                debug!("failed to send ping, connection likely dead");
                                break;
                            }
                        }
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => match parse_frame(text.as_str()) {
                                FeedFrame::Welcome => debug!("received welcome frame"),
                                FeedFrame::Event(event) => {
                                    // No receivers is fine, nobody is watching a board yet
                                    let _ = events_tx.send(event);
                                }
                                FeedFrame::Unrecognised(error) => {
                                    debug!(%error, "ignoring unrecognised push frame");
                                }
                            },
                            Some(Ok(Message::Close(_))) => {
                                info!("push feed closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                error!(%error, "push feed error");
                                break;
                            }
                            None => break,
                        }
                    }
                }

                let _ = status_tx.send(FeedStatus::Disconnected);
                warn!("push feed disconnected, will reconnect");
            }
            Err(error) => {
                error!(url = %config.url, %error, "failed to connect to push feed");
                let _ = status_tx.send(FeedStatus::Disconnected);
            }
        }

        debug!(delay = ?config.reconnect_delay, "waiting before reconnecting");
        tokio::time::sleep(config.reconnect_delay).await;
    }
}
