//! In-process simulated robot
//!
//! [`SimulatedAdapter`] drives a point robot toward its navigation goal by a
//! fixed step on every telemetry poll, drains the battery a little each
//! poll, and reports `running` / `completed` through the status callback.
//! Lets the whole node run without vendor hardware.

use async_trait::async_trait;
use edge_shared::{
    AdapterError, DeviceAdapter, NavigationRequest, NavigationStatus, Quaternion, RobotState,
    StatusCallback, StatusUpdate, TelemetrySnapshot, Vector3, Velocity,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::config::AdapterConfig;

/// Meters travelled per poll unless overridden by the `step` extra
pub const DEFAULT_STEP_M: f64 = 0.1;
/// Battery percent lost per poll unless overridden by the `battery_drain` extra
pub const DEFAULT_BATTERY_DRAIN: f64 = 0.01;

#[derive(Debug, Clone)]
struct Goal {
    action_id: String,
    target: Vector3,
    start_distance: f64,
}

#[derive(Debug)]
struct SimState {
    position: Vector3,
    yaw: f64,
    battery: f64,
    paused: bool,
    goal: Option<Goal>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            position: Vector3::default(),
            yaw: 0.0,
            battery: 100.0,
            paused: false,
            goal: None,
        }
    }
}

pub struct SimulatedAdapter {
    robot_id: String,
    step: f64,
    battery_drain: f64,
    fail_connect: bool,
    connected: AtomicBool,
    state: Mutex<SimState>,
    callback: Mutex<Option<StatusCallback>>,
}

impl SimulatedAdapter {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            robot_id: config.robot_id.clone(),
            step: config
                .extra_f64("step")
                .filter(|s| *s > 0.0)
                .unwrap_or(DEFAULT_STEP_M),
            battery_drain: config
                .extra_f64("battery_drain")
                .filter(|d| *d >= 0.0)
                .unwrap_or(DEFAULT_BATTERY_DRAIN),
            fail_connect: config.extra_bool("fail_connect").unwrap_or(false),
            connected: AtomicBool::new(false),
            state: Mutex::new(SimState::default()),
            callback: Mutex::new(None),
        }
    }

    fn notify(&self, updates: Vec<StatusUpdate>) {
        if updates.is_empty() {
            return;
        }
        let Some(callback) = self.callback.lock().clone() else {
            return;
        };
        for update in updates {
            callback(update);
        }
    }

    fn ensure_connected(&self) -> Result<(), AdapterError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    /// Advance the simulation by one poll
    fn advance(&self) -> (TelemetrySnapshot, Vec<StatusUpdate>) {
        let mut updates = Vec::new();
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.battery = (state.battery - self.battery_drain).max(0.0);

        let mut speed = 0.0;
        let mut progress = None;
        if let Some(goal) = state.goal.clone().filter(|_| !state.paused) {
            let remaining = state.position.distance_to(&goal.target);
            if remaining <= self.step {
                state.position = goal.target;
                state.goal = None;
                speed = remaining;
                updates.push(
                    StatusUpdate::new(&goal.action_id, NavigationStatus::Completed)
                        .with_message("Goal reached")
                        .with_progress(100.0),
                );
            } else {
                let ratio = self.step / remaining;
                let dx = (goal.target.x - state.position.x) * ratio;
                let dy = (goal.target.y - state.position.y) * ratio;
                let dz = (goal.target.z - state.position.z) * ratio;
                state.position = Vector3::new(
                    state.position.x + dx,
                    state.position.y + dy,
                    state.position.z + dz,
                );
                state.yaw = dy.atan2(dx);
                speed = self.step;

                let pct = if goal.start_distance > 0.0 {
                    (1.0 - (remaining - self.step) / goal.start_distance) * 100.0
                } else {
                    0.0
                };
                let pct = pct.clamp(0.0, 99.9);
                progress = Some(pct);
                updates.push(
                    StatusUpdate::new(&goal.action_id, NavigationStatus::Running).with_progress(pct),
                );
            }
        }

        let robot_state = match (&state.goal, state.paused) {
            (Some(_), true) => RobotState::Paused,
            (Some(_), false) => RobotState::Navigating,
            (None, _) => RobotState::Idle,
        };

        let mut vendor_data = Map::new();
        vendor_data.insert("simulated".into(), Value::Bool(true));
        vendor_data.insert("robot_id".into(), json!(self.robot_id));

        let snapshot = TelemetrySnapshot {
            position: Some(state.position),
            rotation: Some(Quaternion::from_yaw(state.yaw)),
            velocity: Some(Velocity {
                linear: Vector3::new(speed, 0.0, 0.0),
                angular: Vector3::default(),
            }),
            battery_level: Some(state.battery),
            battery_charging: false,
            state: robot_state,
            errors: Vec::new(),
            current_action_id: state.goal.as_ref().map(|g| g.action_id.clone()),
            action_progress: progress,
            vendor_data,
        };
        (snapshot, updates)
    }
}

/// Target of a request: explicit position, else the last waypoint
fn target_of(request: &NavigationRequest) -> Option<Vector3> {
    request.position.or_else(|| {
        request
            .waypoints
            .as_ref()
            .and_then(|w| w.last())
            .and_then(|w| serde_json::from_value::<Vector3>(w.clone()).ok())
    })
}

#[async_trait]
impl DeviceAdapter for SimulatedAdapter {
    async fn connect(&self) -> Result<(), AdapterError> {
        if self.fail_connect {
            return Err(AdapterError::Connection("simulated connection failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        info!("Simulated robot {} online", self.robot_id);
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
        self.ensure_connected()?;
        let (snapshot, updates) = self.advance();
        self.notify(updates);
        Ok(Some(snapshot))
    }

    async fn send_navigation_command(&self, request: NavigationRequest) -> Result<bool, AdapterError> {
        self.ensure_connected()?;
        let Some(target) = target_of(&request) else {
            debug!("Simulated robot has no target for {}", request.action_id);
            return Ok(false);
        };

        let replaced = {
            let mut state = self.state.lock();
            let goal = Goal {
                action_id: request.action_id.clone(),
                start_distance: state.position.distance_to(&target),
                target,
            };
            state.paused = false;
            state.goal.replace(goal)
        };

        if let Some(previous) = replaced {
            self.notify(vec![StatusUpdate::new(previous.action_id, NavigationStatus::Cancelled)
                .with_message("Superseded by a new goal")]);
        }
        Ok(true)
    }

    async fn cancel_navigation(&self, action_id: &str) -> Result<bool, AdapterError> {
        self.ensure_connected()?;
        let cancelled = {
            let mut state = self.state.lock();
            if state.goal.as_ref().is_some_and(|g| g.action_id == action_id) {
                state.paused = false;
                state.goal.take()
            } else {
                None
            }
        };

        match cancelled {
            Some(goal) => {
                self.notify(vec![StatusUpdate::new(goal.action_id, NavigationStatus::Cancelled)]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pause_navigation(&self) -> Result<bool, AdapterError> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        state.paused = state.goal.is_some();
        Ok(state.paused)
    }

    async fn resume_navigation(&self) -> Result<bool, AdapterError> {
        self.ensure_connected()?;
        let mut state = self.state.lock();
        let was_paused = state.paused;
        state.paused = false;
        Ok(was_paused)
    }

    fn set_status_callback(&self, callback: StatusCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn name(&self) -> &str {
        "sim"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn adapter(extra: Value) -> (SimulatedAdapter, Arc<Mutex<Vec<StatusUpdate>>>) {
        let config = AdapterConfig {
            adapter_type: "sim".into(),
            robot_id: "sim-1".into(),
            extra: match extra {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            ..Default::default()
        };
        let adapter = SimulatedAdapter::new(&config);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        adapter.set_status_callback(Arc::new(move |u| sink.lock().push(u)));
        (adapter, seen)
    }

    fn goto(action_id: &str, x: f64, y: f64) -> NavigationRequest {
        NavigationRequest {
            action_id: action_id.into(),
            command: "goto".into(),
            position: Some(Vector3::new(x, y, 0.0)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let (adapter, _) = adapter(json!({}));
        assert!(matches!(adapter.poll_telemetry().await, Err(AdapterError::NotConnected)));
        assert!(matches!(
            adapter.send_navigation_command(goto("a", 1.0, 0.0)).await,
            Err(AdapterError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_drives_to_goal_and_completes() {
        let (adapter, seen) = adapter(json!({"step": 0.5}));
        adapter.connect().await.unwrap();
        assert!(adapter.send_navigation_command(goto("a-1", 1.0, 0.0)).await.unwrap());

        let first = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(first.state, RobotState::Navigating);
        assert_eq!(first.position, Some(Vector3::new(0.5, 0.0, 0.0)));
        assert_eq!(first.current_action_id.as_deref(), Some("a-1"));

        let second = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(second.position, Some(Vector3::new(1.0, 0.0, 0.0)));
        assert_eq!(second.state, RobotState::Idle);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].status, NavigationStatus::Running);
        assert_eq!(seen[0].progress, Some(50.0));
        assert_eq!(seen[1].status, NavigationStatus::Completed);
        assert_eq!(seen[1].progress, Some(100.0));
    }

    #[tokio::test]
    async fn test_rejects_request_without_target() {
        let (adapter, _) = adapter(json!({}));
        adapter.connect().await.unwrap();
        let request = NavigationRequest {
            action_id: "a-1".into(),
            command: "goto".into(),
            ..Default::default()
        };
        assert!(!adapter.send_navigation_command(request).await.unwrap());
    }

    #[tokio::test]
    async fn test_uses_last_waypoint() {
        let (adapter, _) = adapter(json!({"step": 10.0}));
        adapter.connect().await.unwrap();
        let request = NavigationRequest {
            action_id: "p-1".into(),
            command: "path".into(),
            waypoints: Some(vec![json!({"x": 1, "y": 1}), json!({"x": 2, "y": 3})]),
            ..Default::default()
        };
        assert!(adapter.send_navigation_command(request).await.unwrap());
        let snapshot = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(snapshot.position, Some(Vector3::new(2.0, 3.0, 0.0)));
    }

    #[tokio::test]
    async fn test_new_goal_cancels_previous() {
        let (adapter, seen) = adapter(json!({}));
        adapter.connect().await.unwrap();
        adapter.send_navigation_command(goto("a-1", 5.0, 0.0)).await.unwrap();
        adapter.send_navigation_command(goto("a-2", 0.0, 5.0)).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].action_id, "a-1");
        assert_eq!(seen[0].status, NavigationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_pause_holds_position() {
        let (adapter, seen) = adapter(json!({"step": 1.0}));
        adapter.connect().await.unwrap();
        adapter.send_navigation_command(goto("a-1", 5.0, 0.0)).await.unwrap();
        assert!(adapter.pause_navigation().await.unwrap());

        let snapshot = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(snapshot.state, RobotState::Paused);
        assert_eq!(snapshot.position, Some(Vector3::default()));
        assert!(seen.lock().is_empty());

        assert!(adapter.resume_navigation().await.unwrap());
        let snapshot = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(snapshot.position, Some(Vector3::new(1.0, 0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_cancel_matches_action() {
        let (adapter, seen) = adapter(json!({}));
        adapter.connect().await.unwrap();
        adapter.send_navigation_command(goto("a-1", 5.0, 0.0)).await.unwrap();

        assert!(!adapter.cancel_navigation("other").await.unwrap());
        assert!(adapter.cancel_navigation("a-1").await.unwrap());
        assert_eq!(seen.lock()[0].status, NavigationStatus::Cancelled);
        assert!(!adapter.pause_navigation().await.unwrap());
    }

    #[tokio::test]
    async fn test_battery_drains_per_poll() {
        let (adapter, _) = adapter(json!({"battery_drain": 1.5}));
        adapter.connect().await.unwrap();
        adapter.poll_telemetry().await.unwrap();
        let snapshot = adapter.poll_telemetry().await.unwrap().unwrap();
        assert_eq!(snapshot.battery_level, Some(97.0));
    }

    #[tokio::test]
    async fn test_fail_connect_extra() {
        let (adapter, _) = adapter(json!({"fail_connect": true}));
        assert!(adapter.connect().await.is_err());
        assert!(!adapter.is_connected());
    }
}
