//! Command handling for the edge node
//!
//! Inbound navigation and mission commands are routed per twin to the
//! handlers, and adapter status callbacks are republished as navigation
//! status messages.

pub mod handlers;
mod router;

pub use router::CommandResult;
pub(crate) use router::{run_status_pump, subscribe_commands};
