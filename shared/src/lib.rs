//! Edge Node Shared Types
//!
//! This crate provides the telemetry model, the device adapter contract and
//! the JSON wire codec shared between the edge node supervisor and the
//! vendor adapters that plug into it.

pub mod adapter;
pub mod codec;
pub mod messages;
pub mod state_machine;
pub mod telemetry;
pub mod topics;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use adapter::{AdapterError, DeviceAdapter, NavigationRequest, StatusCallback, StatusUpdate};
pub use telemetry::*;

/// Get current wall-clock timestamp in seconds since Unix epoch
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Adapter reconnection parameters
pub mod backoff {
    /// Delay before the first reconnect attempt, in seconds
    pub const BASE_DELAY_SECS: u64 = 5;

    /// Maximum number of scheduled reconnect attempts before giving up
    pub const MAX_ATTEMPTS: u32 = 10;

    /// Cap on the backoff exponent (delay never exceeds base * 2^5)
    pub const MAX_EXPONENT: u32 = 5;
}

/// Identifier of the publisher written into outbound events
pub const EVENT_SOURCE: &str = "edge_node";
