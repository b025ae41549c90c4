//! Adapter connection and bounded reconnection
//!
//! A failed connect feeds the reconnect state machine. While attempts remain,
//! a single deferred reconnect task is scheduled; scheduling a new one aborts
//! the previous one so at most one timer is ever live. A firing timer keeps
//! its slot until its connect attempt settles, so cleanup can always reach it.

use edge_shared::state_machine::{ReconnectEvent, ReconnectState, ReconnectStateMachine};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::device::DeviceSupervisor;

#[derive(Debug)]
struct PendingReconnect {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Reconnect bookkeeping owned by the supervisor
#[derive(Debug, Default)]
pub(crate) struct Reconnector {
    machine: Mutex<ReconnectStateMachine>,
    pending: Mutex<Option<PendingReconnect>>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl Reconnector {
    pub(crate) async fn state(&self) -> ReconnectState {
        self.machine.lock().await.state()
    }

    pub(crate) async fn attempts(&self) -> u32 {
        self.machine.lock().await.attempts()
    }

    pub(crate) async fn has_pending(&self) -> bool {
        self.pending.lock().await.is_some()
    }

    /// Stop scheduling. Timers that fire afterwards do nothing.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) async fn take_pending(&self) -> Option<JoinHandle<()>> {
        self.pending.lock().await.take().map(|pending| pending.handle)
    }

    /// Drop the slot if it still belongs to the timer `generation`
    async fn release(&self, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending.as_ref().is_some_and(|p| p.generation == generation) {
            pending.take();
        }
    }
}

impl DeviceSupervisor {
    /// Connect the adapter, scheduling a reconnect on failure
    pub(crate) async fn connect_adapter(self: &Arc<Self>) {
        self.connect_from(None).await;
    }

    /// Record a connect failure and schedule the next attempt if any remain
    pub(crate) async fn schedule_reconnect(self: &Arc<Self>) -> ReconnectState {
        self.schedule_from(None).await
    }

    // `origin` is the generation of the timer running this attempt, if any
    async fn connect_from(self: &Arc<Self>, origin: Option<u64>) {
        let Some(adapter) = self.adapter().cloned() else {
            return;
        };
        if self.reconnect.is_closed() {
            debug!("Reconnect closed, skipping connect");
            return;
        }

        match adapter.connect().await {
            Ok(()) => {
                self.reconnect
                    .machine
                    .lock()
                    .await
                    .process_event(ReconnectEvent::ConnectSucceeded);
                if let Some(generation) = origin {
                    self.reconnect.release(generation).await;
                }
                info!("Adapter {} connected", adapter.name());
            }
            Err(e) => {
                error!("Adapter {} connection failed: {}", adapter.name(), e);
                self.schedule_from(origin).await;
            }
        }
    }

    async fn schedule_from(self: &Arc<Self>, origin: Option<u64>) -> ReconnectState {
        if self.reconnect.is_closed() {
            debug!("Reconnect closed, not scheduling");
            return self.reconnect.state().await;
        }

        let state = self
            .reconnect
            .machine
            .lock()
            .await
            .process_event(ReconnectEvent::ConnectFailed);

        let mut pending = self.reconnect.pending.lock().await;
        // Cleanup may have closed while we waited for the slot
        if self.reconnect.is_closed() {
            return state;
        }
        if let Some(previous) = pending.take() {
            // The calling timer finishes on its own
            if Some(previous.generation) != origin {
                previous.handle.abort();
            }
        }

        match state {
            ReconnectState::Reconnecting { attempt, delay } => {
                info!("Reconnecting adapter in {:?} (attempt {})", delay, attempt);
                let generation = self.reconnect.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let handle = tokio::spawn(self.clone().reconnect_after(delay, generation));
                *pending = Some(PendingReconnect { generation, handle });
            }
            ReconnectState::Exhausted => {
                error!("Max reconnection attempts reached, giving up on adapter");
            }
            ReconnectState::Idle | ReconnectState::Connected => {
                warn!("Unexpected reconnect state after failure: {:?}", state);
            }
        }

        state
    }

    // Boxed so the connect -> schedule -> connect cycle has a nameable future type
    fn reconnect_after(self: Arc<Self>, delay: Duration, generation: u64) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            self.connect_from(Some(generation)).await;
        })
    }
}
