//! Fixed-cadence liveness probe for an open transport

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::protocol::ClientFrame;

/// Sends `{"type":"ping"}` every interval while the transport's outgoing
/// queue is open. Responses are never awaited, so the cadence is fixed.
///
/// The probe task is aborted when this handle is stopped or dropped.
#[derive(Debug)]
pub struct Keepalive {
    handle: JoinHandle<()>,
}

impl Keepalive {
    /// Start probing; the first probe goes out one `interval` from now.
    pub fn start(outgoing: mpsc::Sender<String>, interval: Duration) -> Self {
        let handle = tokio::spawn(Self::run(outgoing, interval));
        Self { handle }
    }

    /// Stop probing immediately.
    pub fn stop(self) {
        drop(self);
    }

    async fn run(outgoing: mpsc::Sender<String>, interval: Duration) {
        let probe = match ClientFrame::Ping.encode() {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Failed to encode keepalive probe: {}", e);
                return;
            }
        };
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if outgoing.is_closed() {
                debug!("Transport closed, stopping keepalive");
                break;
            }
            if outgoing.send(probe.clone()).await.is_err() {
                break;
            }
            debug!("Sent keepalive probe");
        }
    }
}

impl Drop for Keepalive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
