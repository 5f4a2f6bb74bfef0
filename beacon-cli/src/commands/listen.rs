use super::EndpointArgs;
use crate::config::ConfigLoader;
use anyhow::{Context, Result};
use beacon_core::{
    ChannelCondition, ChannelEvent, FanoutSink, NotificationChannel, NotificationPayload,
    QueueSink, SinkEvent, TracingSink,
};
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Pending toasts kept while the terminal catches up
const TOAST_QUEUE_CAPACITY: usize = 64;

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Session token sent as the `token` query parameter
    #[arg(long)]
    pub token: Option<String>,
}

pub async fn run(args: ListenArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    args.endpoint.apply(&mut config);
    if let Some(token) = args.token.filter(|t| !t.is_empty()) {
        config.endpoint.token = Some(token);
    }

    let (toasts, mut toast_rx) = QueueSink::channel(TOAST_QUEUE_CAPACITY);
    let sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(toasts));
    let channel =
        NotificationChannel::new(config, Arc::new(sink)).context("Failed to create channel")?;
    info!("Listening on {}", channel.endpoint());

    let mut events = channel.subscribe();
    let handle = channel.start();

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing channel");
                break Ok(());
            }
            Some(event) = toast_rx.recv() => match event {
                SinkEvent::Notification(payload) => println!("{}", format_toast(&payload)),
                SinkEvent::Condition(ChannelCondition::NotAuthenticated) => {
                    break Err(anyhow::anyhow!(
                        "Not authenticated: the server rejected the session token"
                    ));
                }
                SinkEvent::Condition(ChannelCondition::Unavailable) => {
                    break Err(anyhow::anyhow!(
                        "Notifications unavailable: reconnect attempts exhausted"
                    ));
                }
            },
            event = events.recv() => match event {
                Ok(ChannelEvent::StateChanged(state)) => debug!("Channel state: {:?}", state),
                Ok(ChannelEvent::Condition(_)) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {} channel events", n),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    handle.shutdown().await.context("Channel did not shut down cleanly")?;
    outcome
}

/// One terminal line per notification: `[time] title: message`
fn format_toast(payload: &NotificationPayload) -> String {
    let time = payload
        .time()
        .map(str::to_string)
        .unwrap_or_else(|| payload.received_at.format("%H:%M:%S").to_string());
    if payload.message.is_empty() {
        format!("[{}] {}", time, payload.title)
    } else {
        format!("[{}] {}: {}", time, payload.title, payload.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::NotificationKind;
    use chrono::TimeZone;
    use serde_json::json;

    fn payload(message: &str, extra: Option<serde_json::Value>) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::Notification,
            title: "Build finished".into(),
            message: message.into(),
            extra,
            received_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn toast_prefers_server_time() {
        let line = format_toast(&payload("All green", Some(json!({"time": "10:15"}))));
        assert_eq!(line, "[10:15] Build finished: All green");
    }

    #[test]
    fn toast_falls_back_to_receive_time() {
        let line = format_toast(&payload("All green", None));
        assert_eq!(line, "[09:30:00] Build finished: All green");
    }

    #[test]
    fn toast_without_message_shows_title_only() {
        let line = format_toast(&payload("", None));
        assert_eq!(line, "[09:30:00] Build finished");
    }
}
