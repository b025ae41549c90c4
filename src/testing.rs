//! Shared test doubles

use async_trait::async_trait;
use edge_shared::{
    AdapterError, DeviceAdapter, NavigationRequest, StatusCallback, StatusUpdate, TelemetrySnapshot,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AdapterConfig, EdgeConfig};
use crate::device::DeviceSupervisor;
use crate::node::EdgeNode;
use crate::transport::{MemoryTransport, PlatformTransport, Twin};

/// Scriptable adapter that records every call
pub struct MockAdapter {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    accept_commands: AtomicBool,
    fail_commands: AtomicBool,
    fail_poll: AtomicBool,
    connect_calls: AtomicUsize,
    connect_delay: Mutex<Duration>,
    snapshot: Mutex<Option<TelemetrySnapshot>>,
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<NavigationRequest>>,
    callback: Mutex<Option<StatusCallback>>,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            accept_commands: AtomicBool::new(true),
            fail_commands: AtomicBool::new(false),
            fail_poll: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            connect_delay: Mutex::new(Duration::ZERO),
            snapshot: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
        })
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make every later connect take `delay` before it settles
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    pub fn set_accept_commands(&self, accept: bool) {
        self.accept_commands.store(accept, Ordering::SeqCst);
    }

    pub fn set_fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_poll(&self, fail: bool) {
        self.fail_poll.store(fail, Ordering::SeqCst);
    }

    pub fn set_snapshot(&self, snapshot: Option<TelemetrySnapshot>) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Control calls in order: `cancel:<id>`, `pause`, `resume`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn sent_requests(&self) -> Vec<NavigationRequest> {
        self.sent.lock().clone()
    }

    /// Report a status update through the registered callback
    pub fn emit(&self, update: StatusUpdate) -> bool {
        let callback = self.callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(update);
                true
            }
            None => false,
        }
    }

    fn control(&self, call: String) -> Result<bool, AdapterError> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(AdapterError::Command("mock command failure".into()));
        }
        self.calls.lock().push(call);
        Ok(true)
    }
}

#[async_trait]
impl DeviceAdapter for MockAdapter {
    async fn connect(&self) -> Result<(), AdapterError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(AdapterError::Connection("mock refused".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn poll_telemetry(&self) -> Result<Option<TelemetrySnapshot>, AdapterError> {
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(AdapterError::Poll("mock poll failure".into()));
        }
        Ok(self.snapshot.lock().clone())
    }

    async fn send_navigation_command(&self, request: NavigationRequest) -> Result<bool, AdapterError> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(AdapterError::Command("mock command failure".into()));
        }
        self.sent.lock().push(request);
        Ok(self.accept_commands.load(Ordering::SeqCst))
    }

    async fn cancel_navigation(&self, action_id: &str) -> Result<bool, AdapterError> {
        self.control(format!("cancel:{}", action_id))
    }

    async fn pause_navigation(&self) -> Result<bool, AdapterError> {
        self.control("pause".into())
    }

    async fn resume_navigation(&self) -> Result<bool, AdapterError> {
        self.control("resume".into())
    }

    fn set_status_callback(&self, callback: StatusCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn test_config() -> EdgeConfig {
    EdgeConfig {
        token: "token".into(),
        edge_uuid: "edge-1".into(),
        ..Default::default()
    }
}

pub fn test_adapter_config() -> AdapterConfig {
    AdapterConfig {
        adapter_type: "mock".into(),
        robot_id: "robot-1".into(),
        ..Default::default()
    }
}

fn twins(ids: &[&str]) -> Vec<Twin> {
    ids.iter().map(|id| Twin::new(*id, format!("Twin {}", id))).collect()
}

/// Supervisor over a memory transport discovering `twin_ids`, not yet set up
pub fn supervisor(
    adapter: Option<Arc<MockAdapter>>,
    twin_ids: &[&str],
) -> (Arc<DeviceSupervisor>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::with_twins(twins(twin_ids)));
    let supervisor = DeviceSupervisor::new(
        test_config(),
        test_adapter_config(),
        transport.clone(),
        Box::new(move |_: &AdapterConfig| adapter.clone().map(|a| a as Arc<dyn DeviceAdapter>)),
    );
    (Arc::new(supervisor), transport)
}

/// Supervisor with a connected transport after `setup` has run
pub async fn harness(
    adapter: Option<Arc<MockAdapter>>,
    twin_ids: &[&str],
) -> (Arc<DeviceSupervisor>, Arc<MemoryTransport>) {
    let (supervisor, transport) = self::supervisor(adapter, twin_ids);
    transport.connect().await.expect("memory transport connects");
    supervisor.clone().setup().await.expect("setup succeeds");
    (supervisor, transport)
}
