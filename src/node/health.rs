//! Health Reporter
//!
//! Runs a background task that periodically publishes the node's health
//! document to every known twin. Failures never stop the loop.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::node::EdgeNode;

/// Start the health reporting background task
pub(crate) fn spawn_health_loop<N: EdgeNode>(node: Arc<N>) -> JoinHandle<()> {
    let period = node.core().config().health_interval;

    tokio::spawn(async move {
        // First report after one full interval
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // Check if we should stop
            if !node.core().is_running() {
                break;
            }

            publish_health_once(node.as_ref()).await;
        }

        info!("[HEALTH] Reporting stopped");
    })
}

/// Build the health document once and publish it to every twin
pub async fn publish_health_once<N: EdgeNode + ?Sized>(node: &N) {
    let health = node.build_health_status().await;
    let core = node.core();

    let twins = core.twin_ids();
    if twins.is_empty() {
        debug!("[HEALTH] No twins to report to");
    }
    for twin in twins {
        core.publish_health(&twin, health.clone()).await;
    }
}
