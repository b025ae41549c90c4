//! Position streaming and telemetry polling loops
//!
//! Both loops poll the adapter independently at their own rate. A poll error
//! is logged and the loop keeps its cadence.

use edge_shared::AdapterError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::device::DeviceSupervisor;

const FALLBACK_PERIOD: Duration = Duration::from_secs(1);

fn poll_period(rate_hz: f64) -> Duration {
    match Duration::try_from_secs_f64(1.0 / rate_hz) {
        Ok(period) if !period.is_zero() => period,
        _ => {
            warn!("Unusable poll rate {} Hz, polling every {:?}", rate_hz, FALLBACK_PERIOD);
            FALLBACK_PERIOD
        }
    }
}

fn poll_ticker(rate_hz: f64) -> Interval {
    let mut ticker = interval(poll_period(rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl DeviceSupervisor {
    pub(crate) async fn position_stream_loop(self: Arc<Self>) {
        let mut ticker = poll_ticker(self.adapter_config.position_poll_rate_hz);

        loop {
            ticker.tick().await;
            if !self.core.is_running() {
                break;
            }

            if let Err(e) = self.stream_position_once().await {
                warn!("Position stream error: {}", e);
            }
        }

        debug!("Position stream stopped");
    }

    pub(crate) async fn telemetry_poll_loop(self: Arc<Self>) {
        let mut ticker = poll_ticker(self.adapter_config.telemetry_poll_rate_hz);

        loop {
            ticker.tick().await;
            if !self.core.is_running() {
                break;
            }

            if let Err(e) = self.poll_telemetry_once().await {
                warn!("Telemetry poll error: {}", e);
            }
        }

        debug!("Telemetry poll stopped");
    }

    /// One position-stream step; `Ok(true)` when a position was published
    pub async fn stream_position_once(&self) -> Result<bool, AdapterError> {
        let Some(adapter) = self.adapter() else {
            return Ok(false);
        };
        if !adapter.is_connected() {
            return Ok(false);
        }

        let Some(snapshot) = adapter.poll_telemetry().await? else {
            return Ok(false);
        };
        let Some(position) = snapshot.position else {
            return Ok(false);
        };
        let rotation = snapshot.rotation;
        *self.latest.write().await = Some(snapshot);

        for twin in self.core.twin_ids() {
            self.core.publish_position(&twin, position, rotation, None).await;
        }
        Ok(true)
    }

    /// One telemetry-poll step; `Ok(true)` when a snapshot was published
    pub async fn poll_telemetry_once(&self) -> Result<bool, AdapterError> {
        let Some(adapter) = self.adapter() else {
            return Ok(false);
        };
        if !adapter.is_connected() {
            return Ok(false);
        }

        let Some(snapshot) = adapter.poll_telemetry().await? else {
            return Ok(false);
        };
        *self.latest.write().await = Some(snapshot.clone());

        for twin in self.core.twin_ids() {
            if let Some(level) = snapshot.battery_level {
                self.core
                    .publish_telemetry(
                        &twin,
                        "battery",
                        json!({"level": level, "charging": snapshot.battery_charging}),
                    )
                    .await;
            }

            if !snapshot.errors.is_empty() {
                self.core
                    .publish_telemetry(&twin, "errors", json!({"errors": snapshot.errors}))
                    .await;
            }

            self.core
                .publish_event(
                    &twin,
                    "robot_state",
                    json!({"state": snapshot.state, "vendor_data": snapshot.vendor_data}),
                )
                .await;
        }
        Ok(true)
    }
}
