//! Connection supervisor for the event stream
//!
//! Keeps exactly one connection attempt or live connection at a time.
//! Each [`Supervisor::step`] does one unit of work for the current phase:
//!
//! - `Connecting`: make sure the device has its event socket enabled,
//!   open the socket, and move to `Connected`. Any failure waits
//!   `retry_delay` and stays in `Connecting`.
//! - `Connected`: one bounded read. A timeout changes nothing; data is
//!   framed and published; EOF or a read error closes the socket and goes
//!   back to `Connecting`.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::bus::EventBus;
use super::framer::{next_event, Framed};
use super::transport::{StreamConnection, StreamTransport};
use super::types::{ConnectionState, StreamError, StreamSettings};
use crate::control::{ControlPlane, StreamConfig};

enum Phase {
    Connecting,
    Connected(Box<dyn StreamConnection>),
}

/// Owner of the event socket and parse buffer
pub struct Supervisor {
    control: Arc<dyn ControlPlane>,
    transport: Arc<dyn StreamTransport>,
    bus: Arc<EventBus>,
    settings: StreamSettings,
    phase: Phase,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Supervisor {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        transport: Arc<dyn StreamTransport>,
        bus: Arc<EventBus>,
        settings: StreamSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let chunk = vec![0; settings.read_chunk_size.max(1)];
        Self {
            control,
            transport,
            bus,
            settings,
            phase: Phase::Connecting,
            buffer: Vec::new(),
            chunk,
            state_tx,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Bytes received but not yet framed into an event
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Perform one unit of work for the current phase
    pub async fn step(&mut self) {
        match self.phase {
            Phase::Connecting => self.service_connecting().await,
            Phase::Connected(_) => self.service_connected().await,
        }
    }

    async fn service_connecting(&mut self) {
        let attempt = open(self.control.as_ref(), self.transport.as_ref()).await;
        match attempt {
            Ok(conn) => {
                self.buffer.clear();
                self.phase = Phase::Connected(conn);
                self.state_tx.send_replace(ConnectionState::Connected);
                info!("Event stream Connecting -> Connected");
            }
            Err(e) => {
                debug!(error = %e, "Event stream connection attempt failed");
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }
    }

    async fn service_connected(&mut self) {
        let Phase::Connected(conn) = &mut self.phase else {
            return;
        };

        let read =
            tokio::time::timeout(self.settings.read_timeout, conn.read(&mut self.chunk)).await;
        match read {
            // Nothing arrived within the read window
            Err(_) => {}
            Ok(Ok(0)) => {
                info!("Event stream Connected -> Connecting (EOF)");
                self.disconnect().await;
            }
            Ok(Ok(n)) => {
                self.buffer.extend_from_slice(&self.chunk[..n]);
                self.publish_buffered();
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Event socket read failed");
                info!("Event stream Connected -> Connecting (socket error)");
                self.disconnect().await;
            }
        }
    }

    fn publish_buffered(&mut self) {
        while let Framed::Event(event) = next_event(&mut self.buffer, self.settings.max_buffer_len)
        {
            self.bus.publish(&event);
        }
    }

    async fn disconnect(&mut self) {
        if let Phase::Connected(mut conn) = std::mem::replace(&mut self.phase, Phase::Connecting) {
            self.state_tx.send_replace(ConnectionState::Connecting);
            conn.close().await;
        }
    }

    /// Step until `stop` flips to `true` or its sender goes away, then
    /// close the socket
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.step() => {}
            }
        }

        if let Phase::Connected(mut conn) = std::mem::replace(&mut self.phase, Phase::Connecting) {
            conn.close().await;
        }
        self.buffer.clear();
        debug!("Event stream supervisor stopped");
    }

    /// Run on a new tokio task
    pub fn spawn(self) -> SupervisorTask {
        self.spawn_after(None)
    }

    /// Run on a new tokio task once `previous` reports that the task it
    /// belongs to has exited
    ///
    /// The new task is `Connecting` while it waits. A stop request issued
    /// in the meantime ends it without opening a socket.
    pub fn spawn_after(self, previous: Option<watch::Receiver<bool>>) -> SupervisorTask {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (exited_tx, exited_rx) = watch::channel(false);
        let state_rx = self.subscribe_state();
        let join = tokio::spawn(async move {
            if let Some(mut previous) = previous {
                // Err: the previous task is already gone
                let _ = previous.wait_for(|done| *done).await;
            }
            self.run(stop_rx).await;
            exited_tx.send_replace(true);
        });
        SupervisorTask {
            stop_tx,
            state_rx,
            exited_rx,
            join,
        }
    }
}

/// Negotiate the event socket with the control plane and connect to it
async fn open(
    control: &dyn ControlPlane,
    transport: &dyn StreamTransport,
) -> Result<Box<dyn StreamConnection>, StreamError> {
    let config = control.get_stream_config().await?;
    if !config.enabled {
        info!(port = config.port, "Enabling event stream on device");
        control
            .set_stream_config(&StreamConfig {
                enabled: true,
                port: config.port,
            })
            .await?;
    }

    let host = control.host();
    debug!(%host, port = config.port, "Opening event socket");
    Ok(transport.connect(&host, config.port).await?)
}

/// Handle to a supervisor running on its own task
pub struct SupervisorTask {
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<ConnectionState>,
    exited_rx: watch::Receiver<bool>,
    join: JoinHandle<()>,
}

impl SupervisorTask {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Turns `true` once the task has closed its socket and exited
    pub fn exited(&self) -> watch::Receiver<bool> {
        self.exited_rx.clone()
    }

    /// Ask the task to stop; a step in progress is abandoned
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait for the task to exit; the socket is closed when this returns
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!(error = %e, "Event stream task ended abnormally");
        }
    }

    /// Stop the task and wait for it to exit
    pub async fn stop(self) {
        self.request_stop();
        self.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::stream::bus::Listener;
    use crate::stream::types::StreamEvent;
    use crate::testing::{MockControlPlane, MockTransport, ScriptedRead};

    struct Harness {
        control: Arc<MockControlPlane>,
        transport: Arc<MockTransport>,
        seen: Arc<Mutex<Vec<Value>>>,
        supervisor: Supervisor,
    }

    fn harness(control: MockControlPlane) -> Harness {
        let control = Arc::new(control);
        let transport = Arc::new(MockTransport::new());
        let bus = Arc::new(EventBus::new());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Arc::new(move |e: &StreamEvent| -> anyhow::Result<()> {
            sink.lock().push(Value::Object(e.as_map().clone()));
            Ok(())
        });
        bus.add_listener(listener);

        let supervisor = Supervisor::new(
            control.clone(),
            transport.clone(),
            bus,
            StreamSettings::default(),
        );
        Harness {
            control,
            transport,
            seen,
            supervisor,
        }
    }

    async fn connected() -> Harness {
        let mut h = harness(MockControlPlane::enabled(5000));
        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        h
    }

    #[tokio::test]
    async fn test_starts_connecting_and_connects_in_one_step() {
        let mut h = harness(MockControlPlane::enabled(5000));
        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);

        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        assert_eq!(h.transport.connects(), vec![("127.0.0.1".to_string(), 5000)]);
        assert!(h.control.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_stream_is_enabled_keeping_port() {
        let mut h = harness(MockControlPlane::disabled(5123));
        h.supervisor.step().await;

        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        assert_eq!(
            h.control.set_calls(),
            vec![StreamConfig {
                enabled: true,
                port: 5123
            }]
        );
        assert_eq!(h.transport.connects(), vec![("127.0.0.1".to_string(), 5123)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_plane_failure_retries_with_delay() {
        let mut h = harness(MockControlPlane::failing());
        let start = tokio::time::Instant::now();

        for _ in 0..3 {
            h.supervisor.step().await;
        }

        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);
        assert_eq!(h.control.get_calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert!(h.transport.connects().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_socket_failure_retries_with_delay() {
        let mut h = harness(MockControlPlane::enabled(5000));
        h.transport.fail_connects(true);
        let start = tokio::time::Instant::now();

        for _ in 0..3 {
            h.supervisor.step().await;
        }

        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);
        assert_eq!(h.transport.connects().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_changes_nothing() {
        let mut h = connected().await;
        h.transport.script(ScriptedRead::Hang);

        let start = tokio::time::Instant::now();
        h.supervisor.step().await;

        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        assert!(h.seen.lock().is_empty());
        assert_eq!(h.transport.closes(), 0);
    }

    #[tokio::test]
    async fn test_eof_reconnects_and_closes_once() {
        let mut h = connected().await;
        h.transport.script(ScriptedRead::Eof);

        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);
        assert_eq!(h.transport.closes(), 1);

        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connected);
        assert_eq!(h.transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_read_error_reconnects_and_closes_once() {
        let mut h = connected().await;
        h.transport.script(ScriptedRead::Error);

        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);
        assert_eq!(h.transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_two_events_in_one_read() {
        let mut h = connected().await;
        h.transport
            .script(ScriptedRead::Data(b"{\"a\":1}\r\n{\"b\":2}".to_vec()));

        h.supervisor.step().await;
        assert_eq!(*h.seen.lock(), vec![json!({"a": 1}), json!({"b": 2})]);
        assert!(h.supervisor.buffered().is_empty());
    }

    #[tokio::test]
    async fn test_event_split_across_reads() {
        let mut h = connected().await;
        h.transport
            .script(ScriptedRead::Data(b"{\"data\":{\"sequence\":".to_vec()));
        h.transport.script(ScriptedRead::Data(b"7}}\r\n".to_vec()));

        h.supervisor.step().await;
        assert!(h.seen.lock().is_empty());

        h.supervisor.step().await;
        assert_eq!(*h.seen.lock(), vec![json!({"data": {"sequence": 7}})]);
    }

    #[tokio::test]
    async fn test_partial_data_is_dropped_on_reconnect() {
        let mut h = connected().await;
        h.transport.script(ScriptedRead::Data(b"{\"stale\":".to_vec()));
        h.transport.script(ScriptedRead::Eof);
        h.transport.script(ScriptedRead::Data(b"{\"fresh\":1}".to_vec()));

        h.supervisor.step().await;
        h.supervisor.step().await;
        assert_eq!(h.supervisor.state(), ConnectionState::Connecting);

        h.supervisor.step().await;
        assert!(h.supervisor.buffered().is_empty());

        h.supervisor.step().await;
        assert_eq!(*h.seen.lock(), vec![json!({"fresh": 1})]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_task_stops_and_closes_socket() {
        let h = harness(MockControlPlane::enabled(5000));
        h.transport.script(ScriptedRead::Hang);
        let transport = h.transport.clone();

        let task = h.supervisor.spawn();
        let mut state = task.subscribe_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        task.stop().await;
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_after_waits_for_previous_exit() {
        let h = harness(MockControlPlane::enabled(5000));
        let control = h.control.clone();
        let transport = h.transport.clone();
        let (previous_tx, previous_rx) = watch::channel(false);

        let task = h.supervisor.spawn_after(Some(previous_rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(task.state(), ConnectionState::Connecting);
        assert_eq!(control.get_calls(), 0);

        previous_tx.send_replace(true);
        let mut state = task.subscribe_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        assert!(!*task.exited().borrow());

        let mut exited = task.exited();
        task.stop().await;
        assert!(*exited.borrow_and_update());
        assert_eq!(transport.connects().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_waiting_for_previous_never_connects() {
        let h = harness(MockControlPlane::enabled(5000));
        let control = h.control.clone();
        let (previous_tx, previous_rx) = watch::channel(false);

        let task = h.supervisor.spawn_after(Some(previous_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.request_stop();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(control.get_calls(), 0);

        // Previous task finishes after the stop request
        drop(previous_tx);
        task.join().await;
        assert_eq!(control.get_calls(), 0);
    }
}
