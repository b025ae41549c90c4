//! Edge node for autonomous mobile robots
//!
//! Bridges one robot, reached through a vendor [`DeviceAdapter`], to the
//! platform's publish/subscribe bus. The [`DeviceSupervisor`] streams pose and
//! telemetry upstream, forwards navigation and mission commands down to the
//! robot and keeps the adapter connected with bounded backoff.
//!
//! [`DeviceAdapter`]: edge_shared::DeviceAdapter
//! [`DeviceSupervisor`]: device::DeviceSupervisor

pub mod adapter;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod node;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, EdgeError};
