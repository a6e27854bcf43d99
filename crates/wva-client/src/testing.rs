//! Test utilities for wva-client
//!
//! - [`MockControlPlane`] and [`MockTransport`] drive the stream
//!   supervisor without any network.
//! - [`FakeDevice`] serves the web services on a local port and pushes
//!   events over a real TCP socket, for end-to-end tests.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::{ClientConfig, WvaClient};
use crate::control::{ControlPlane, StreamConfig};
use crate::error::{Result, WvaError};
use crate::stream::{StreamConnection, StreamTransport, TransportError};
use crate::types::{SubscriptionDocument, SubscriptionMetadata, WsEventsConfig, WsEventsDocument};

// =============================================================================
// Mock control plane
// =============================================================================

enum ControlBehavior {
    Config(StreamConfig),
    Fail,
    Hang,
}

/// In-memory [`ControlPlane`] that records calls
pub struct MockControlPlane {
    behavior: Mutex<ControlBehavior>,
    get_calls: AtomicUsize,
    set_calls: Mutex<Vec<StreamConfig>>,
}

impl MockControlPlane {
    fn with(behavior: ControlBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            get_calls: AtomicUsize::new(0),
            set_calls: Mutex::new(Vec::new()),
        }
    }

    /// Stream already enabled on `port`
    pub fn enabled(port: u16) -> Self {
        Self::with(ControlBehavior::Config(StreamConfig {
            enabled: true,
            port,
        }))
    }

    /// Stream switched off, configured for `port`
    pub fn disabled(port: u16) -> Self {
        Self::with(ControlBehavior::Config(StreamConfig {
            enabled: false,
            port,
        }))
    }

    /// Every query fails with HTTP 500
    pub fn failing() -> Self {
        Self::with(ControlBehavior::Fail)
    }

    /// Every query hangs forever
    pub fn hanging() -> Self {
        Self::with(ControlBehavior::Hang)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> Vec<StreamConfig> {
        self.set_calls.lock().clone()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    fn host(&self) -> String {
        "127.0.0.1".to_string()
    }

    async fn get_stream_config(&self) -> Result<StreamConfig> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = match &*self.behavior.lock() {
            ControlBehavior::Config(cfg) => Some(Ok(*cfg)),
            ControlBehavior::Fail => Some(Err(WvaError::from_status(500))),
            ControlBehavior::Hang => None,
        };
        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn set_stream_config(&self, config: &StreamConfig) -> Result<()> {
        self.set_calls.lock().push(*config);
        if let ControlBehavior::Config(cfg) = &mut *self.behavior.lock() {
            *cfg = *config;
        }
        Ok(())
    }
}

// =============================================================================
// Mock transport
// =============================================================================

/// Next outcome of a [`MockTransport`] connection read
#[derive(Debug, Clone)]
pub enum ScriptedRead {
    Data(Vec<u8>),
    Eof,
    Error,
    /// Never completes; the supervisor's read timeout fires
    Hang,
}

#[derive(Default)]
struct MockTransportState {
    reads: Mutex<VecDeque<ScriptedRead>>,
    connects: Mutex<Vec<(String, u16)>>,
    closes: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
    fail_connects: Mutex<bool>,
    close_delay: Mutex<Duration>,
}

/// [`StreamTransport`] whose connections replay scripted reads
///
/// The script is shared by all connections; once it is empty, reads hang.
#[derive(Default)]
pub struct MockTransport {
    state: Arc<MockTransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, read: ScriptedRead) {
        self.state.reads.lock().push_back(read);
    }

    pub fn fail_connects(&self, fail: bool) {
        *self.state.fail_connects.lock() = fail;
    }

    /// Every connect attempt, successful or not
    pub fn connects(&self) -> Vec<(String, u16)> {
        self.state.connects.lock().clone()
    }

    /// Make every `close` take `delay` before it completes
    pub fn close_delay(&self, delay: Duration) {
        *self.state.close_delay.lock() = delay;
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Highest number of connections that were open at the same time
    pub fn max_open(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> std::result::Result<Box<dyn StreamConnection>, TransportError> {
        self.state.connects.lock().push((host.to_string(), port));
        if *self.state.fail_connects.lock() {
            return Err(TransportError::ConnectionFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connect failure",
            )));
        }
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<MockTransportState>,
}

#[async_trait]
impl StreamConnection for MockConnection {
    async fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, TransportError> {
        let next = self.state.reads.lock().pop_front();
        match next.unwrap_or(ScriptedRead::Hang) {
            ScriptedRead::Data(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.state
                        .reads
                        .lock()
                        .push_front(ScriptedRead::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            ScriptedRead::Eof => Ok(0),
            ScriptedRead::Error => Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "something bad happened",
            ))),
            ScriptedRead::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        let delay = *self.state.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Fake device
// =============================================================================

#[derive(Debug, Clone)]
enum Frame {
    Bytes(Vec<u8>),
    Hangup,
}

struct DeviceState {
    ws_events: Mutex<WsEventsConfig>,
    ws_events_puts: AtomicUsize,
    subscriptions: Mutex<HashMap<String, SubscriptionMetadata>>,
    vehicle_data: Mutex<HashMap<String, (String, f64)>>,
}

type SharedDevice = Arc<DeviceState>;

/// A local stand-in for a WVA device
///
/// Web services are served at `http://127.0.0.1:{port}/ws/...`; the event
/// socket listens on a second port that `config/ws_events` reports.
pub struct FakeDevice {
    pub http_addr: SocketAddr,
    pub event_port: u16,
    state: SharedDevice,
    frames: broadcast::Sender<Frame>,
    clients: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl FakeDevice {
    /// Start a device whose event stream is switched off
    pub async fn start() -> std::io::Result<Self> {
        let http = TcpListener::bind("127.0.0.1:0").await?;
        let events = TcpListener::bind("127.0.0.1:0").await?;
        let http_addr = http.local_addr()?;
        let event_port = events.local_addr()?.port();

        let state = Arc::new(DeviceState {
            ws_events: Mutex::new(WsEventsConfig {
                enable: "off".to_string(),
                port: event_port,
            }),
            ws_events_puts: AtomicUsize::new(0),
            subscriptions: Mutex::new(HashMap::new()),
            vehicle_data: Mutex::new(HashMap::new()),
        });

        let (frames, _) = broadcast::channel(256);
        let clients = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let router = Self::router(state.clone());
        let http_handle = tokio::spawn(async move {
            axum::serve(http, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let accept_handle = tokio::spawn(Self::accept_loop(
            events,
            frames.clone(),
            clients.clone(),
            accepted.clone(),
        ));

        Ok(Self {
            http_addr,
            event_port,
            state,
            frames,
            clients,
            accepted,
            shutdown_tx: Some(shutdown_tx),
            handles: vec![http_handle, accept_handle],
        })
    }

    fn router(state: SharedDevice) -> Router {
        Router::new()
            .route("/ws/config/ws_events", get(get_ws_events).put(put_ws_events))
            .route("/ws/subscriptions", get(list_subscriptions))
            .route(
                "/ws/subscriptions/{name}",
                get(get_subscription)
                    .put(put_subscription)
                    .delete(delete_subscription),
            )
            .route("/ws/vehicle/data", get(list_vehicle_data))
            .route("/ws/vehicle/data/{name}", get(get_vehicle_data))
            .with_state(state)
    }

    async fn accept_loop(
        listener: TcpListener,
        frames: broadcast::Sender<Frame>,
        clients: Arc<AtomicUsize>,
        accepted: Arc<AtomicUsize>,
    ) {
        while let Ok((mut sock, peer)) = listener.accept().await {
            let mut rx = frames.subscribe();
            let clients = clients.clone();
            clients.fetch_add(1, Ordering::SeqCst);
            accepted.fetch_add(1, Ordering::SeqCst);
            debug!(%peer, "Fake device accepted event client");

            tokio::spawn(async move {
                while let Ok(frame) = rx.recv().await {
                    match frame {
                        Frame::Bytes(bytes) => {
                            if sock.write_all(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Frame::Hangup => break,
                    }
                }
                let _ = sock.shutdown().await;
                clients.fetch_sub(1, Ordering::SeqCst);
            });
        }
    }

    /// Client configuration pointing at this device
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.http_addr.to_string()).with_https(false)
    }

    pub fn client(&self) -> Result<WvaClient> {
        WvaClient::new(self.client_config())
    }

    /// Write raw bytes to every connected event client
    pub fn send_raw(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.frames.send(Frame::Bytes(bytes.into()));
    }

    /// Send one event document followed by `\r\n`
    pub fn send_event(&self, event: &Value) {
        let mut bytes = event.to_string().into_bytes();
        bytes.extend_from_slice(b"\r\n");
        self.send_raw(bytes);
    }

    /// Close every event connection from the device side
    pub fn hang_up(&self) {
        let _ = self.frames.send(Frame::Hangup);
    }

    /// Number of currently connected event clients
    pub fn event_clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Event connections accepted since the device started
    pub fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until exactly `count` event clients are connected
    pub async fn wait_for_clients(&self, count: usize, timeout: Duration) -> bool {
        wait_for(timeout, || self.event_clients() == count).await
    }

    /// Whether the device currently reports its event stream as on
    pub fn ws_events_enabled(&self) -> bool {
        self.state.ws_events.lock().is_enabled()
    }

    /// Number of `PUT config/ws_events` requests served
    pub fn ws_events_puts(&self) -> usize {
        self.state.ws_events_puts.load(Ordering::SeqCst)
    }

    pub fn set_vehicle_data(&self, name: &str, timestamp: &str, value: f64) {
        self.state
            .vehicle_data
            .lock()
            .insert(name.to_string(), (timestamp.to_string(), value));
    }

    pub fn subscription(&self, short_name: &str) -> Option<SubscriptionMetadata> {
        self.state.subscriptions.lock().get(short_name).cloned()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

async fn get_ws_events(State(state): State<SharedDevice>) -> Json<WsEventsDocument> {
    Json(WsEventsDocument {
        ws_events: state.ws_events.lock().clone(),
    })
}

async fn put_ws_events(
    State(state): State<SharedDevice>,
    Json(doc): Json<WsEventsDocument>,
) -> Json<Value> {
    state.ws_events_puts.fetch_add(1, Ordering::SeqCst);
    *state.ws_events.lock() = doc.ws_events;
    Json(json!({}))
}

async fn list_subscriptions(State(state): State<SharedDevice>) -> Json<Value> {
    let mut names: Vec<String> = state
        .subscriptions
        .lock()
        .keys()
        .map(|name| format!("subscriptions/{}", name))
        .collect();
    names.sort();
    Json(json!({ "subscriptions": names }))
}

async fn get_subscription(
    State(state): State<SharedDevice>,
    Path(name): Path<String>,
) -> std::result::Result<Json<SubscriptionDocument>, StatusCode> {
    state
        .subscriptions
        .lock()
        .get(&name)
        .cloned()
        .map(|subscription| Json(SubscriptionDocument { subscription }))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn put_subscription(
    State(state): State<SharedDevice>,
    Path(name): Path<String>,
    Json(doc): Json<SubscriptionDocument>,
) -> Json<Value> {
    state.subscriptions.lock().insert(name, doc.subscription);
    Json(json!({}))
}

async fn delete_subscription(
    State(state): State<SharedDevice>,
    Path(name): Path<String>,
) -> std::result::Result<Json<Value>, StatusCode> {
    state
        .subscriptions
        .lock()
        .remove(&name)
        .map(|_| Json(json!({})))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_vehicle_data(State(state): State<SharedDevice>) -> Json<Value> {
    let mut uris: Vec<String> = state
        .vehicle_data
        .lock()
        .keys()
        .map(|name| format!("vehicle/data/{}", name))
        .collect();
    uris.sort();
    Json(json!({ "data": uris }))
}

async fn get_vehicle_data(
    State(state): State<SharedDevice>,
    Path(name): Path<String>,
) -> std::result::Result<Json<Value>, StatusCode> {
    let data = state.vehicle_data.lock();
    let (timestamp, value) = data.get(&name).ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let mut doc = serde_json::Map::new();
    doc.insert(name.clone(), json!({ "timestamp": timestamp, "value": value }));
    Ok(Json(Value::Object(doc)))
}
