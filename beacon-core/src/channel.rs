//! WebSocket driver for the notification channel.
//!
//! One task per subscriber owns the [`ConnectionSession`], the current
//! transport, the keepalive probe and the reconnect timer. Transport attempts
//! run in their own tasks and only report events, tagged with their
//! [`AttemptId`]; all decisions are made by the session inside the driver
//! task, one event at a time.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::dispatch::Dispatcher;
use crate::endpoint::EndpointResolver;
use crate::error::{ChannelError, ConfigError};
use crate::keepalive::Keepalive;
use crate::session::{
    AttemptId, ChannelCondition, CloseReason, Command, ConnectionSession, ConnectionState,
    NORMAL_CLOSURE, SessionInput,
};
use crate::sink::NotificationSink;

/// How long teardown waits for a transport to send its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Events observable by whoever owns the channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The session moved to a new state
    StateChanged(ConnectionState),
    /// A standing condition was surfaced
    Condition(ChannelCondition),
}

/// A configured, not yet started notification channel.
///
/// Subscribe before [`start`](Self::start) to observe every event,
/// including the first connection attempt.
pub struct NotificationChannel {
    config: ChannelConfig,
    resolver: EndpointResolver,
    sink: Arc<dyn NotificationSink>,
    events: broadcast::Sender<ChannelEvent>,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("endpoint", &self.resolver.redacted())
            .finish_non_exhaustive()
    }
}

impl NotificationChannel {
    /// Validate the configuration and prepare a channel.
    pub fn new(config: ChannelConfig, sink: Arc<dyn NotificationSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = EndpointResolver::from_config(&config.endpoint)?;
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            config,
            resolver,
            sink,
            events,
        })
    }

    /// Subscribe to channel events
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// The socket URL this channel connects to, without credentials.
    pub fn endpoint(&self) -> String {
        self.resolver.redacted()
    }

    /// Start the channel. Must be called within a tokio runtime.
    pub fn start(self) -> ChannelHandle {
        let id = Uuid::now_v7();
        let state = Arc::new(RwLock::new(ConnectionState::Idle));
        let cancel = CancellationToken::new();
        let (control_tx, control_rx) = mpsc::channel(8);
        let (transport_tx, transport_rx) = mpsc::channel(64);

        let driver = Driver {
            session: ConnectionSession::new(self.config.reconnect, self.config.auth_close_code),
            resolver: self.resolver,
            dispatcher: Dispatcher::new(self.sink),
            keepalive_interval: self.config.keepalive.interval,
            state: Arc::clone(&state),
            events: self.events.clone(),
            transport_tx,
            transport: None,
            keepalive: None,
            retry_at: None,
            closing: Vec::new(),
        };
        let task = tokio::spawn(
            driver
                .run(cancel.clone(), control_rx, transport_rx)
                .instrument(info_span!("channel", %id)),
        );

        ChannelHandle {
            id,
            state,
            events: self.events,
            control: control_tx,
            cancel,
            task: Some(task),
        }
    }
}

/// Requests from the handle to the driver
#[derive(Debug)]
enum Control {
    ReconnectNow,
}

/// Owner's handle to a running notification channel.
///
/// Dropping the handle tears the channel down; [`shutdown`](Self::shutdown)
/// does the same and waits for the close to complete.
pub struct ChannelHandle {
    id: Uuid,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<ChannelEvent>,
    control: mpsc::Sender<Control>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ChannelHandle {
    /// Unique id of this session, also recorded on its tracing span
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get current connection state
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Subscribe to channel events
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    /// Skip any pending backoff, or retry after giving up.
    pub fn reconnect_now(&self) {
        if self.control.try_send(Control::ReconnectNow).is_err() {
            debug!("Reconnect request dropped; channel busy or stopped");
        }
    }

    /// Tear the channel down and wait for it to finish.
    pub async fn shutdown(mut self) -> Result<(), ChannelError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| ChannelError::TaskFailed(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Event reported by a transport task
#[derive(Debug)]
struct TransportEvent {
    attempt: AttemptId,
    kind: TransportEventKind,
}

#[derive(Debug)]
enum TransportEventKind {
    Opened,
    Text(String),
    Closed(CloseReason),
}

/// The physical connection behind the current attempt
struct Transport {
    attempt: AttemptId,
    outgoing: mpsc::Sender<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Driver {
    session: ConnectionSession,
    resolver: EndpointResolver,
    dispatcher: Dispatcher,
    keepalive_interval: Duration,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<ChannelEvent>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport: Option<Transport>,
    keepalive: Option<Keepalive>,
    retry_at: Option<Instant>,
    closing: Vec<JoinHandle<()>>,
}

impl Driver {
    async fn run(
        mut self,
        cancel: CancellationToken,
        mut control_rx: mpsc::Receiver<Control>,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
    ) {
        self.apply(SessionInput::Start).await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(control) = control_rx.recv() => match control {
                    Control::ReconnectNow => self.apply(SessionInput::ReconnectNow).await,
                },
                Some(event) = transport_rx.recv() => self.on_transport_event(event).await,
                _ = wait_until(self.retry_at) => {
                    self.retry_at = None;
                    self.apply(SessionInput::RetryDue).await;
                }
            }
        }

        info!("Tearing down notification channel");
        self.apply(SessionInput::Teardown).await;
        for task in self.closing.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                abort.abort();
            }
        }
        self.session.finish_teardown();
        self.publish_state().await;
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent { attempt, kind } = event;
        match kind {
            TransportEventKind::Opened => self.apply(SessionInput::Opened(attempt)).await,
            TransportEventKind::Text(text) => {
                if self.session.is_current(attempt)
                    && *self.session.state() == ConnectionState::Open
                {
                    self.dispatcher.dispatch(&text);
                } else {
                    debug!("Dropping frame from superseded transport {}", attempt);
                }
            }
            TransportEventKind::Closed(reason) => {
                self.transport.take_if(|t| t.attempt == attempt);
                info!("Transport {} closed: {}", attempt, reason);
                self.apply(SessionInput::Closed(attempt, reason)).await;
            }
        }
    }

    async fn apply(&mut self, input: SessionInput) {
        let before = self.session.state().clone();
        for command in self.session.handle(input) {
            self.execute(command);
        }
        if *self.session.state() != before {
            self.publish_state().await;
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Connect(attempt) => self.connect(attempt),
            Command::StartKeepalive(attempt) => {
                if let Some(transport) = &self.transport
                    && transport.attempt == attempt
                {
                    self.keepalive = Some(Keepalive::start(
                        transport.outgoing.clone(),
                        self.keepalive_interval,
                    ));
                }
            }
            Command::StopKeepalive => {
                if let Some(keepalive) = self.keepalive.take() {
                    keepalive.stop();
                }
            }
            Command::ScheduleReconnect(delay) => {
                info!("Reconnecting in {:?}", delay);
                self.retry_at = Some(Instant::now() + delay);
            }
            Command::CancelReconnect => self.retry_at = None,
            Command::CloseTransport(attempt) => {
                if let Some(transport) = self.transport.take_if(|t| t.attempt == attempt) {
                    self.retire(transport);
                }
            }
            Command::Surface(condition) => {
                self.dispatcher.sink().condition(condition);
                let _ = self.events.send(ChannelEvent::Condition(condition));
            }
        }
    }

    fn connect(&mut self, attempt: AttemptId) {
        if let Some(previous) = self.transport.take() {
            self.retire(previous);
        }
        info!("Connecting to {} ({})", self.resolver.redacted(), attempt);

        let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(32);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            run_transport(
                attempt,
                self.resolver.resolve(),
                outgoing_rx,
                self.transport_tx.clone(),
                cancel.clone(),
            )
            .in_current_span(),
        );
        self.transport = Some(Transport {
            attempt,
            outgoing: outgoing_tx,
            cancel,
            task,
        });
    }

    /// Ask a transport to close and keep its task so teardown can await it.
    fn retire(&mut self, transport: Transport) {
        debug!("Closing transport {}", transport.attempt);
        transport.cancel.cancel();
        self.closing.retain(|task| !task.is_finished());
        self.closing.push(transport.task);
    }

    async fn publish_state(&self) {
        let state = self.session.state().clone();
        debug!("Channel state: {:?}", state);
        *self.state.write().await = state.clone();
        let _ = self.events.send(ChannelEvent::StateChanged(state));
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Classify a failed connect or read.
fn close_reason_for_error(error: &WsError) -> CloseReason {
    match error {
        WsError::Http(response) => CloseReason::Rejected {
            status: response.status().as_u16(),
        },
        other => CloseReason::Abnormal(other.to_string()),
    }
}

/// One transport attempt: connect, then pump frames both ways until the
/// socket closes or the driver cancels it.
async fn run_transport(
    attempt: AttemptId,
    url: String,
    mut outgoing: mpsc::Receiver<String>,
    events: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) {
    let report = |kind: TransportEventKind| {
        let events = events.clone();
        async move { events.send(TransportEvent { attempt, kind }).await.is_ok() }
    };

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Transport {} cancelled while connecting", attempt);
            return;
        }
        result = connect_async(url.as_str()) => result,
    };
    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            debug!("Transport {} failed to connect: {}", attempt, e);
            report(TransportEventKind::Closed(close_reason_for_error(&e))).await;
            return;
        }
    };
    if !report(TransportEventKind::Opened).await {
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "subscriber closed".into(),
                };
                if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
                    debug!("Failed to send close frame: {}", e);
                }
                break CloseReason::Frame {
                    code: NORMAL_CLOSURE,
                    reason: "closed by subscriber".into(),
                };
            }
            Some(text) = outgoing.recv() => {
                debug!("Sending: {}", text);
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    warn!("Failed to send WebSocket message: {}", e);
                    break CloseReason::Abnormal(e.to_string());
                }
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let text_str: &str = &text;
                    debug!("Received: {}", text_str);
                    if !report(TransportEventKind::Text(text_str.to_string())).await {
                        break CloseReason::Abnormal("driver stopped".into());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => {
                            let reason: &str = &frame.reason;
                            CloseReason::Frame {
                                code: u16::from(frame.code),
                                reason: reason.to_string(),
                            }
                        }
                        None => CloseReason::Frame {
                            code: u16::from(CloseCode::Status),
                            reason: String::new(),
                        },
                    };
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {
                    // Control frames are answered by tungstenite; binary is not part of the protocol
                }
                Some(Err(e)) => break close_reason_for_error(&e),
                None => break CloseReason::Abnormal("stream ended".into()),
            }
        }
    };

    report(TransportEventKind::Closed(reason)).await;
}
