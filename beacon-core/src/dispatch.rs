//! Routing of decoded frames to the notification sink

use std::sync::Arc;

use tracing::debug;

use crate::error::DecodeError;
use crate::protocol::{InboundFrame, decode_frame};
use crate::sink::NotificationSink;

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Handed to the sink
    Delivered,
    /// Liveness response, dropped
    Pong,
    /// A kind this subscriber does not handle
    Ignored,
    /// Not decodable; logged only
    Malformed,
}

/// Decodes inbound text frames and forwards notifications to a sink.
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Handle one text frame. The sink is called at most once.
    pub fn dispatch(&self, text: &str) -> Dispatched {
        match decode_frame(text) {
            Ok(InboundFrame::Notification(payload)) => {
                debug!("Delivering notification: {}", payload.title);
                self.sink.deliver(&payload);
                Dispatched::Delivered
            }
            Ok(InboundFrame::Pong) => Dispatched::Pong,
            Ok(InboundFrame::Unrecognized(kind)) => {
                debug!("Ignoring frame of type {:?}", kind);
                Dispatched::Ignored
            }
            Err(DecodeError::InvalidJson(e)) => {
                debug!("Server diagnostic ({}): {}", e, text);
                Dispatched::Malformed
            }
        }
    }
}
