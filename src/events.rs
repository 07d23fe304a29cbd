//! Service event bus.
//!
//! A `tokio::sync::broadcast` channel carrying [`ServiceEvent`] values to
//! widget-style listeners (`ready`, `rates-loaded`, `error`) and to
//! observability consumers (`channel-fetched`). With no subscribers, events
//! are dropped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::models::Channel;

/// Default buffer of undelivered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServiceEvent {
    /// The service is built and accepting requests.
    Ready { channels: Vec<Channel> },
    /// A comparison completed.
    RatesLoaded {
        property_id: String,
        quote_count: usize,
        best_channel: Option<Channel>,
        from_cache: bool,
    },
    /// A comparison failed as a whole.
    Error {
        property_id: String,
        message: String,
    },
    /// One channel fetch finished, successfully or not.
    ChannelFetched {
        channel: Channel,
        property_id: String,
        success: bool,
        error_kind: Option<String>,
        error_tag: Option<String>,
        attempts: u32,
        latency_ms: u64,
    },
}

impl ServiceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServiceEvent::Ready { .. } => EventKind::Ready,
            ServiceEvent::RatesLoaded { .. } => EventKind::RatesLoaded,
            ServiceEvent::Error { .. } => EventKind::Error,
            ServiceEvent::ChannelFetched { .. } => EventKind::ChannelFetched,
        }
    }
}

/// Event names accepted by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    RatesLoaded,
    Error,
    ChannelFetched,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::RatesLoaded => "rates-loaded",
            EventKind::Error => "error",
            EventKind::ChannelFetched => "channel-fetched",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(EventKind::Ready),
            "rates-loaded" => Ok(EventKind::RatesLoaded),
            "error" => Ok(EventKind::Error),
            "channel-fetched" => Ok(EventKind::ChannelFetched),
            other => Err(format!("unknown event '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServiceEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: ServiceEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.sender.subscribe()
    }

    /// Call `handler` for every future event of `kind`.
    ///
    /// The subscription starts before this returns; the handler runs on a
    /// spawned task until the bus is dropped or the task is aborted.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> JoinHandle<()>
    where
        F: Fn(ServiceEvent) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.kind() == kind => handler(event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("'{}' listener missed {} events", kind, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
