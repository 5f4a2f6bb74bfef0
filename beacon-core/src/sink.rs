//! Destinations for decoded notifications
//!
//! A sink is fire-and-forget: the channel never reads anything back from it
//! and never learns whether delivery succeeded.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::protocol::NotificationPayload;
use crate::session::ChannelCondition;

/// Receives normalized notifications and standing channel conditions.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. Called exactly once per decoded frame.
    fn deliver(&self, payload: &NotificationPayload);

    /// A condition the channel surfaced (at most once per kind per session).
    fn condition(&self, _condition: ChannelCondition) {}
}

/// Delivers to several sinks in order, e.g. a desktop alert plus a toast.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the end of the delivery order.
    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutSink {
    fn deliver(&self, payload: &NotificationPayload) {
        for sink in &self.sinks {
            sink.deliver(payload);
        }
    }

    fn condition(&self, condition: ChannelCondition) {
        for sink in &self.sinks {
            sink.condition(condition);
        }
    }
}

/// Item written into a [`QueueSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Notification(NotificationPayload),
    Condition(ChannelCondition),
}

/// Pushes everything into a bounded queue consumed by the UI layer.
///
/// A full or closed queue drops the item.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl QueueSink {
    /// Create a sink and the receiver the UI reads toasts from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn push(&self, event: SinkEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Toast queue full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Toast queue closed, dropping event");
            }
        }
    }
}

impl NotificationSink for QueueSink {
    fn deliver(&self, payload: &NotificationPayload) {
        self.push(SinkEvent::Notification(payload.clone()));
    }

    fn condition(&self, condition: ChannelCondition) {
        self.push(SinkEvent::Condition(condition));
    }
}

/// Emits notifications as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&self, payload: &NotificationPayload) {
        info!(
            kind = ?payload.kind,
            title = %payload.title,
            time = payload.time().unwrap_or("-"),
            "{}",
            payload.message
        );
    }

    fn condition(&self, condition: ChannelCondition) {
        match condition {
            ChannelCondition::NotAuthenticated => {
                info!("Notifications stopped: session is not authenticated")
            }
            ChannelCondition::Unavailable => {
                warn!("Notifications unavailable: giving up on the notification server")
            }
        }
    }
}
