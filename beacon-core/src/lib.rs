//! beacon-core: resilient real-time notification channel
//!
//! This crate keeps one WebSocket subscription alive per authenticated
//! subscriber and turns the server's notification frames into a single
//! normalized shape:
//!
//! - **Endpoint resolution** - [`endpoint::resolve_endpoint`] picks the socket URL for a page
//! - **Reconnect policy** - [`ReconnectPolicy`] computes capped exponential backoff
//! - **Session state machine** - [`ConnectionSession`] decides every transition without I/O
//! - **Keepalive** - [`Keepalive`] sends a fixed-cadence liveness probe
//! - **Decoding** - [`protocol::decode_frame`] and [`Dispatcher`] normalize inbound frames
//! - **Sinks** - [`NotificationSink`] receives payloads and surfaced conditions
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use beacon_core::{ChannelConfig, NotificationChannel, TracingSink};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let channel = NotificationChannel::new(ChannelConfig::default(), Arc::new(TracingSink))?;
//!     let handle = channel.start();
//!
//!     // ... later, on logout
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────── channel task ────────────────────┐
//! │  ConnectionSession ──commands──▶ Driver              │
//! │        ▲                          │   │    │         │
//! │        │ inputs          Keepalive│   │    │timer    │
//! │        │                          ▼   ▼    ▼         │
//! │  transport events ◀──── transport task (attempt #n)  │
//! └───────────────┬──────────────────────────────────────┘
//!                 │ text frames
//!                 ▼
//!            Dispatcher ──▶ NotificationSink
//! ```

pub mod backoff;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod keepalive;
pub mod protocol;
pub mod session;
pub mod sink;

// Re-export key types for convenience
pub use backoff::ReconnectPolicy;
pub use channel::{ChannelEvent, ChannelHandle, NotificationChannel};
pub use config::{ChannelConfig, EndpointConfig, KeepaliveConfig};
pub use dispatch::{Dispatched, Dispatcher};
pub use endpoint::{EndpointResolver, Origin};
pub use error::{ChannelError, ConfigError, DecodeError};
pub use keepalive::Keepalive;
pub use protocol::{ClientFrame, InboundFrame, NotificationKind, NotificationPayload};
pub use session::{
    AttemptId, ChannelCondition, CloseReason, Command, ConnectionSession, ConnectionState,
    SessionInput,
};
pub use sink::{FanoutSink, NotificationSink, QueueSink, SinkEvent, TracingSink};
