//! Shared test utilities for beacon-core integration tests
//!
//! Note: Some helpers may appear unused because clippy checks each test file
//! independently.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use beacon_core::{
    ChannelConfig, ChannelEvent, ConnectionState, EndpointConfig, KeepaliveConfig, ReconnectPolicy,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;

pub type ServerSocket = WebSocketStream<TcpStream>;

/// How long any single wait in these tests may take
pub const WAIT: Duration = Duration::from_secs(5);

/// Local notification server; each accepted socket is handed to a handler
/// along with its zero-based connection index.
pub struct TestServer {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    /// Spawn a server running `handler` for every upgraded connection
    pub async fn spawn<F, Fut>(handler: F) -> Self
    where
        F: Fn(usize, ServerSocket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        handler(index, ws).await;
                    }
                });
            }
        });

        Self { addr, accepted }
    }

    /// Spawn a server that refuses every upgrade with `status`
    #[allow(dead_code)]
    pub async fn rejecting(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let reject = |_req: &Request, _resp: Response| -> Result<Response, ErrorResponse> {
                        Err(http::Response::builder().status(status).body(None).unwrap())
                    };
                    let _ = tokio_tungstenite::accept_hdr_async(stream, reject).await;
                });
            }
        });

        Self { addr, accepted }
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Channel config pointing at this server with fast timings
    pub fn config(&self) -> ChannelConfig {
        fast_config(self.addr)
    }
}

/// Config for a local server: 20ms base backoff capped at 80ms, five retries
pub fn fast_config(addr: SocketAddr) -> ChannelConfig {
    ChannelConfig {
        endpoint: EndpointConfig {
            page_url: format!("http://{}", addr),
            ..Default::default()
        },
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(80),
            max_retries: 5,
        },
        keepalive: KeepaliveConfig {
            interval: Duration::from_secs(30),
        },
        ..Default::default()
    }
}

/// Address nothing is listening on
#[allow(dead_code)]
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Wait for the first event matching `pred`
pub async fn next_matching<P>(rx: &mut broadcast::Receiver<ChannelEvent>, pred: P) -> ChannelEvent
where
    P: Fn(&ChannelEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("Channel events closed"),
            }
        }
    })
    .await
    .expect("Timed out waiting for channel event")
}

/// Wait until the channel reports `state`
#[allow(dead_code)]
pub async fn wait_for_state(rx: &mut broadcast::Receiver<ChannelEvent>, state: ConnectionState) {
    next_matching(rx, |e| *e == ChannelEvent::StateChanged(state.clone())).await;
}

/// Wait until the channel enters backoff
#[allow(dead_code)]
pub async fn wait_for_backoff(rx: &mut broadcast::Receiver<ChannelEvent>) {
    next_matching(rx, |e| {
        matches!(e, ChannelEvent::StateChanged(ConnectionState::Backoff { .. }))
    })
    .await;
}

/// Keep a server socket open until the client goes away
#[allow(dead_code)]
pub async fn hold_open(mut ws: ServerSocket) {
    use futures_util::StreamExt;
    while let Some(Ok(_)) = ws.next().await {}
}
