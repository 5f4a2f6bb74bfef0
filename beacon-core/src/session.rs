//! Connection session state machine
//!
//! [`ConnectionSession`] holds every piece of reconnection state for one
//! subscriber and performs no I/O. The channel driver feeds it lifecycle
//! inputs and executes the [`Command`]s it returns, which keeps each
//! transition testable without sockets or timers.
//!
//! Every transport attempt gets a fresh [`AttemptId`]. Inputs carrying an id
//! other than the current one come from a superseded transport and are ignored,
//! so a late close from an old socket can never disturb a newer open one.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;

/// WebSocket close code for a normal, intentional closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// WebSocket close code reported when a connection drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Identity of one transport attempt within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a transport attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame
    Frame { code: u16, reason: String },
    /// The connection failed or dropped without a close frame
    Abnormal(String),
    /// The HTTP upgrade was refused with this status
    Rejected { status: u16 },
}

impl CloseReason {
    /// The close code as a WebSocket client would observe it.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Frame { code, .. } => *code,
            CloseReason::Abnormal(_) | CloseReason::Rejected { .. } => ABNORMAL_CLOSURE,
        }
    }

    fn is_auth_failure(&self, auth_close_code: u16) -> bool {
        match self {
            CloseReason::Frame { code, .. } => *code == auth_close_code,
            CloseReason::Rejected { status } => matches!(status, 401 | 403),
            CloseReason::Abnormal(_) => false,
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, CloseReason::Frame { code: NORMAL_CLOSURE, .. })
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Frame { code, reason } if reason.is_empty() => write!(f, "code {}", code),
            CloseReason::Frame { code, reason } => write!(f, "code {}: {}", code, reason),
            CloseReason::Abnormal(detail) => write!(f, "abnormal closure: {}", detail),
            CloseReason::Rejected { status } => write!(f, "handshake rejected with HTTP {}", status),
        }
    }
}

/// Observable state of a notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, not started
    #[default]
    Idle,
    /// A transport attempt is in flight
    Connecting,
    /// Connected; keepalive running
    Open,
    /// Waiting before the next attempt
    Backoff {
        retry: u32,
        #[serde(with = "crate::config::millis")]
        delay: Duration,
    },
    /// Retries exhausted or the server closed normally
    GaveUp,
    /// The server rejected the session's credentials
    Unauthenticated,
    /// Teardown requested; transport shutting down
    Closing,
    /// Torn down
    Closed,
}

impl ConnectionState {
    /// True for states the session can never leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionState::GaveUp | ConnectionState::Unauthenticated | ConnectionState::Closed
        )
    }
}

/// Standing conditions surfaced to the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelCondition {
    /// The server refused the session's credentials
    NotAuthenticated,
    /// Reconnect attempts are exhausted
    Unavailable,
}

/// Lifecycle inputs consumed by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Subscriber mounted
    Start,
    /// Transport reported a successful open
    Opened(AttemptId),
    /// Transport closed, errored, or failed to connect
    Closed(AttemptId, CloseReason),
    /// The reconnect delay elapsed
    RetryDue,
    /// Skip any pending delay and try again now
    ReconnectNow,
    /// Subscriber unmounted
    Teardown,
}

/// Side effects requested by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect(AttemptId),
    StartKeepalive(AttemptId),
    StopKeepalive,
    ScheduleReconnect(Duration),
    CancelReconnect,
    CloseTransport(AttemptId),
    Surface(ChannelCondition),
}

/// Reconnection state for one subscriber
#[derive(Debug)]
pub struct ConnectionSession {
    policy: ReconnectPolicy,
    auth_close_code: u16,
    state: ConnectionState,
    current: Option<AttemptId>,
    next_attempt: u64,
    retry_count: u32,
    closed: bool,
    gave_up_reported: bool,
    auth_reported: bool,
}

impl ConnectionSession {
    pub fn new(policy: ReconnectPolicy, auth_close_code: u16) -> Self {
        Self {
            policy,
            auth_close_code,
            state: ConnectionState::Idle,
            current: None,
            next_attempt: 1,
            retry_count: 0,
            closed: false,
            gave_up_reported: false,
            auth_reported: false,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True once the subscriber has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The attempt whose events are currently honored.
    pub fn current(&self) -> Option<AttemptId> {
        self.current
    }

    pub fn is_current(&self, attempt: AttemptId) -> bool {
        self.current == Some(attempt)
    }

    /// Apply one input and return the side effects to perform, in order.
    pub fn handle(&mut self, input: SessionInput) -> Vec<Command> {
        match input {
            SessionInput::Start => self.on_start(),
            SessionInput::Opened(attempt) => self.on_opened(attempt),
            SessionInput::Closed(attempt, reason) => self.on_closed(attempt, reason),
            SessionInput::RetryDue => self.on_retry_due(),
            SessionInput::ReconnectNow => self.on_reconnect_now(),
            SessionInput::Teardown => self.on_teardown(),
        }
    }

    /// Record that teardown finished and the transport is gone.
    pub fn finish_teardown(&mut self) {
        if self.closed {
            self.state = ConnectionState::Closed;
        }
    }

    fn begin_attempt(&mut self) -> AttemptId {
        let attempt = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        self.current = Some(attempt);
        self.state = ConnectionState::Connecting;
        attempt
    }

    fn on_start(&mut self) -> Vec<Command> {
        if self.closed || self.state != ConnectionState::Idle {
            debug!("Ignoring start in state {:?}", self.state);
            return Vec::new();
        }
        vec![Command::Connect(self.begin_attempt())]
    }

    fn on_opened(&mut self, attempt: AttemptId) -> Vec<Command> {
        if self.closed || !self.is_current(attempt) {
            debug!("Closing superseded transport {}", attempt);
            return vec![Command::CloseTransport(attempt)];
        }
        info!("Notification channel open ({})", attempt);
        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.gave_up_reported = false;
        vec![Command::StartKeepalive(attempt)]
    }

    fn on_closed(&mut self, attempt: AttemptId, reason: CloseReason) -> Vec<Command> {
        if !self.is_current(attempt) {
            debug!("Ignoring close from stale transport {} ({})", attempt, reason);
            return Vec::new();
        }
        self.current = None;

        let mut commands = Vec::new();
        if self.state == ConnectionState::Open {
            commands.push(Command::StopKeepalive);
        }
        if self.closed {
            return commands;
        }

        if reason.is_auth_failure(self.auth_close_code) {
            info!("Notification channel rejected credentials ({})", reason);
            self.state = ConnectionState::Unauthenticated;
            if !self.auth_reported {
                self.auth_reported = true;
                commands.push(Command::Surface(ChannelCondition::NotAuthenticated));
            }
        } else if reason.is_retryable() && self.policy.allows_retry(self.retry_count) {
            let delay = self.policy.delay_for_attempt(self.retry_count);
            self.retry_count += 1;
            debug!(
                "Transport {} closed ({}); retry {}/{} in {:?}",
                attempt, reason, self.retry_count, self.policy.max_retries, delay
            );
            self.state = ConnectionState::Backoff {
                retry: self.retry_count,
                delay,
            };
            commands.push(Command::ScheduleReconnect(delay));
        } else {
            self.state = ConnectionState::GaveUp;
            if !self.gave_up_reported {
                self.gave_up_reported = true;
                warn!("Notification channel unavailable after {} ({})", attempt, reason);
                commands.push(Command::Surface(ChannelCondition::Unavailable));
            }
        }
        commands
    }

    fn on_retry_due(&mut self) -> Vec<Command> {
        if self.closed || !matches!(self.state, ConnectionState::Backoff { .. }) {
            debug!("Ignoring reconnect timer in state {:?}", self.state);
            return Vec::new();
        }
        vec![Command::Connect(self.begin_attempt())]
    }

    fn on_reconnect_now(&mut self) -> Vec<Command> {
        let waiting = matches!(
            self.state,
            ConnectionState::Backoff { .. } | ConnectionState::GaveUp
        );
        if self.closed || !waiting {
            debug!("Ignoring reconnect request in state {:?}", self.state);
            return Vec::new();
        }
        self.retry_count = 0;
        vec![Command::CancelReconnect, Command::Connect(self.begin_attempt())]
    }

    fn on_teardown(&mut self) -> Vec<Command> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let mut commands = vec![Command::CancelReconnect, Command::StopKeepalive];
        if let Some(attempt) = self.current.take() {
            commands.push(Command::CloseTransport(attempt));
        }
        self.state = ConnectionState::Closing;
        commands
    }
}
