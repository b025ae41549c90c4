//! Device adapter implementations
//!
//! Vendor drivers live here. [`create_adapter`] maps `ADAPTER_TYPE` to a
//! concrete [`DeviceAdapter`] and is the default factory handed to the
//! supervisor.

pub mod sim;

pub use sim::SimulatedAdapter;

use edge_shared::DeviceAdapter;
use std::sync::Arc;
use tracing::warn;

use crate::config::AdapterConfig;

/// Adapter types this build knows how to create
pub fn available_adapters() -> &'static [&'static str] {
    &["sim"]
}

/// Build the adapter selected by `config.adapter_type`.
///
/// Returns `None` when no type is configured or the type is unknown; the node
/// then runs without telemetry or command handling.
pub fn create_adapter(config: &AdapterConfig) -> Option<Arc<dyn DeviceAdapter>> {
    match config.adapter_type.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "sim" | "simulated" => Some(Arc::new(SimulatedAdapter::new(config))),
        other => {
            warn!(
                "Unknown adapter type: {}. Available adapters: {}",
                other,
                available_adapters().join(", ")
            );
            None
        }
    }
}
