//! Edge node lifecycle
//!
//! [`run`] drives any [`EdgeNode`]: validate, connect the transport, run the
//! node's setup and subscription hooks, start health reporting, then wait for
//! shutdown. Cleanup always runs before `run` returns.

mod base;
pub mod health;

pub use base::NodeCore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, EdgeError};

/// Hooks a concrete node plugs into the shared lifecycle
#[async_trait]
pub trait EdgeNode: Send + Sync + 'static {
    fn core(&self) -> &NodeCore;

    /// Check configuration before anything connects
    fn validate(&self) -> Result<(), ConfigError> {
        self.core().config().validate()
    }

    /// Prepare devices and background work after the transport is up
    async fn setup(self: Arc<Self>) -> Result<(), EdgeError>;

    /// Register command handlers
    async fn subscribe_to_commands(self: Arc<Self>) -> Result<(), EdgeError>;

    /// Release everything `setup` started
    async fn cleanup(&self);

    /// Node-specific health fields, merged with identity and uptime on publish
    async fn build_health_status(&self) -> Map<String, Value>;

    async fn main_loop(&self) {
        self.core().wait_for_shutdown().await;
    }
}

/// Run a node until shutdown is requested or startup fails
pub async fn run<N: EdgeNode>(node: Arc<N>) -> Result<(), EdgeError> {
    // Fatal before any connection attempt
    node.validate()?;

    node.core().mark_started();
    info!("Starting edge node {}", node.core().config().edge_uuid);

    let result = start(&node).await;
    if let Err(e) = &result {
        error!("Edge node error: {}", e);
    }

    shutdown(node.as_ref()).await;
    result
}

async fn start<N: EdgeNode>(node: &Arc<N>) -> Result<(), EdgeError> {
    let core = node.core();

    core.transport().connect().await?;
    info!("Connected to platform via {}", core.transport().name());

    node.clone().setup().await?;
    node.clone().subscribe_to_commands().await?;

    core.set_health_task(health::spawn_health_loop(node.clone()));
    info!("Edge node {} running", core.config().edge_uuid);

    node.main_loop().await;
    Ok(())
}

/// Stop background work, run the node's cleanup and close the transport.
///
/// Only the first call does anything.
pub async fn shutdown<N: EdgeNode + ?Sized>(node: &N) {
    let core = node.core();
    if !core.begin_shutdown() {
        return;
    }

    info!("Shutting down edge node");
    core.request_shutdown();

    if let Some(handle) = core.take_health_task() {
        cancel_task(handle, "health").await;
    }

    node.cleanup().await;
    core.transport().disconnect().await;

    info!("Edge node stopped");
}

/// Abort a background task and wait until it has unwound
pub(crate) async fn cancel_task(handle: JoinHandle<()>, name: &str) {
    handle.abort();
    match handle.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => debug!("{} task cancelled", name),
        Err(e) => warn!("{} task failed: {}", name, e),
    }
}
