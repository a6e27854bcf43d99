//! Public event stream handle

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use super::bus::{EventBus, Listener};
use super::supervisor::{Supervisor, SupervisorTask};
use super::transport::{StreamTransport, TcpTransport};
use super::types::{ConnectionState, StreamSettings};
use crate::client::WvaClient;
use crate::control::{ControlPlane, HttpControlPlane};

/// Event stream of one device
///
/// Listeners can be registered at any time; they only receive events
/// while the stream is enabled. The device supports a single event
/// stream, so share one `EventStream` per device session (see
/// [`crate::Wva::event_stream`]).
pub struct EventStream {
    control: Arc<dyn ControlPlane>,
    transport: Arc<dyn StreamTransport>,
    settings: StreamSettings,
    bus: Arc<EventBus>,
    task: Mutex<TaskSlot>,
}

#[derive(Default)]
struct TaskSlot {
    running: Option<SupervisorTask>,
    /// Exit signal of the most recently stopped task
    last_exit: Option<watch::Receiver<bool>>,
}

impl EventStream {
    pub fn new(
        control: Arc<dyn ControlPlane>,
        transport: Arc<dyn StreamTransport>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            control,
            transport,
            settings,
            bus: Arc::new(EventBus::new()),
            task: Mutex::new(TaskSlot::default()),
        }
    }

    /// Event stream over the device's web services and a TCP socket
    pub fn for_client(client: WvaClient, settings: StreamSettings) -> Self {
        Self::new(
            Arc::new(HttpControlPlane::new(client)),
            Arc::new(TcpTransport::with_connect_timeout(settings.connect_timeout)),
            settings,
        )
    }

    /// Start the background connection task if it is not running
    ///
    /// If a previous task is still shutting down, the new one does not
    /// connect until the old socket is closed. Must be called from within
    /// a tokio runtime.
    pub fn enable(&self) {
        let mut slot = self.task.lock();
        if slot.running.is_some() {
            return;
        }

        let supervisor = Supervisor::new(
            self.control.clone(),
            self.transport.clone(),
            self.bus.clone(),
            self.settings.clone(),
        );
        let previous = slot.last_exit.take();
        slot.running = Some(supervisor.spawn_after(previous));
        info!("Event stream enabled");
    }

    /// Stop the background task and wait until its socket is closed
    pub async fn disable(&self) {
        let task = {
            let mut slot = self.task.lock();
            let Some(task) = slot.running.take() else {
                return;
            };
            task.request_stop();
            slot.last_exit = Some(task.exited());
            task
        };

        task.join().await;
        info!("Event stream disabled");
    }

    /// Current state; [`ConnectionState::Disabled`] when not enabled
    pub fn status(&self) -> ConnectionState {
        self.task
            .lock()
            .running
            .as_ref()
            .map_or(ConnectionState::Disabled, SupervisorTask::state)
    }

    pub fn is_enabled(&self) -> bool {
        self.task.lock().running.is_some()
    }

    /// Wait until the stream reaches `target`, up to `timeout`
    ///
    /// Returns `true` if the state was reached.
    pub async fn wait_for_status(&self, target: ConnectionState, timeout: Duration) -> bool {
        let receiver = self
            .task
            .lock()
            .running
            .as_ref()
            .map(SupervisorTask::subscribe_state);
        let Some(mut receiver) = receiver else {
            return target == ConnectionState::Disabled;
        };

        let wait = receiver.wait_for(|s| *s == target);
        let reached = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => {
                debug!("Event stream task exited while waiting for {}", target);
                false
            }
            Err(_) => false,
        };
        reached
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub fn add_event_listener(&self, listener: Listener) -> bool {
        self.bus.add_listener(listener)
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, listener: &Listener) -> bool {
        self.bus.remove_listener(listener)
    }

    /// The bus listeners are registered on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("status", &self.status())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::stream::types::StreamEvent;
    use crate::testing::{MockControlPlane, MockTransport, ScriptedRead};

    fn stream(control: Arc<MockControlPlane>, transport: Arc<MockTransport>) -> EventStream {
        EventStream::new(control, transport, StreamSettings::default())
    }

    #[tokio::test]
    async fn test_disable_without_enable_is_noop() {
        let es = stream(
            Arc::new(MockControlPlane::failing()),
            Arc::new(MockTransport::new()),
        );
        assert_eq!(es.status(), ConnectionState::Disabled);
        assert!(!es.is_enabled());

        let start = Instant::now();
        es.disable().await;
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(es.status(), ConnectionState::Disabled);
        assert!(!es.is_enabled());
    }

    #[tokio::test]
    async fn test_enable_twice_runs_one_task() {
        let control = Arc::new(MockControlPlane::hanging());
        let es = stream(control.clone(), Arc::new(MockTransport::new()));

        es.enable();
        es.enable();
        assert!(es.is_enabled());
        assert_eq!(es.status(), ConnectionState::Connecting);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(control.get_calls(), 1);

        es.disable().await;
        es.disable().await;
        assert!(!es.is_enabled());
        assert_eq!(es.status(), ConnectionState::Disabled);
    }

    #[tokio::test]
    async fn test_enable_connect_disable_closes_socket() {
        let control = Arc::new(MockControlPlane::enabled(5000));
        let transport = Arc::new(MockTransport::new());
        transport.script(ScriptedRead::Data(b"{\"a\":1}\r\n".to_vec()));
        let es = stream(control, transport.clone());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener: Listener = Arc::new(move |e: &StreamEvent| -> anyhow::Result<()> {
            tx.send(e.clone())?;
            Ok(())
        });
        es.add_event_listener(listener);

        es.enable();
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.get::<i64>("a"), Some(1));

        es.disable().await;
        assert_eq!(es.status(), ConnectionState::Disabled);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn test_reenable_starts_fresh_supervisor() {
        let control = Arc::new(MockControlPlane::enabled(5000));
        let transport = Arc::new(MockTransport::new());
        let es = stream(control, transport.clone());

        es.enable();
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );
        es.disable().await;

        es.enable();
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );
        es.disable().await;
        assert_eq!(transport.connects().len(), 2);
        assert_eq!(transport.closes(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_during_disable_waits_for_socket_close() {
        let control = Arc::new(MockControlPlane::enabled(5000));
        let transport = Arc::new(MockTransport::new());
        transport.close_delay(Duration::from_millis(200));
        let es = Arc::new(stream(control, transport.clone()));

        es.enable();
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );

        let disabling = tokio::spawn({
            let es = es.clone();
            async move { es.disable().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!es.is_enabled());
        assert_eq!(transport.closes(), 0);

        es.enable();
        assert!(es.is_enabled());
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );
        assert_eq!(transport.closes(), 1);
        assert_eq!(transport.max_open(), 1);

        disabling.await.unwrap();
        es.disable().await;
        assert_eq!(transport.connects().len(), 2);
        assert_eq!(transport.closes(), 2);
        assert_eq!(transport.max_open(), 1);
    }

    #[tokio::test]
    async fn test_disable_while_previous_shutdown_pending() {
        let control = Arc::new(MockControlPlane::enabled(5000));
        let transport = Arc::new(MockTransport::new());
        transport.close_delay(Duration::from_millis(100));
        let es = Arc::new(stream(control, transport.clone()));

        es.enable();
        assert!(
            es.wait_for_status(ConnectionState::Connected, Duration::from_secs(2))
                .await
        );

        // Enable and disable again before the first shutdown ends
        let first = tokio::spawn({
            let es = es.clone();
            async move { es.disable().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        es.enable();
        es.disable().await;
        first.await.unwrap();

        assert_eq!(transport.connects().len(), 1);
        assert_eq!(transport.closes(), 1);
        assert!(!es.is_enabled());
    }

    #[tokio::test]
    async fn test_listener_registration_delegates_to_bus() {
        let es = stream(
            Arc::new(MockControlPlane::failing()),
            Arc::new(MockTransport::new()),
        );
        let listener: Listener = Arc::new(|_: &StreamEvent| -> anyhow::Result<()> { Ok(()) });

        assert!(es.add_event_listener(listener.clone()));
        assert!(!es.add_event_listener(listener.clone()));
        assert_eq!(es.bus().listener_count(), 1);
        assert!(es.remove_event_listener(&listener));
        assert_eq!(es.bus().listener_count(), 0);
    }
}
