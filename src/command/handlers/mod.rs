//! Command handlers for navigation, mission and adapter status traffic

mod mission;
mod navigate;
mod status;

pub use mission::handle_mission_command;
pub use navigate::handle_navigate_command;
pub use status::handle_adapter_status;

use crate::device::DeviceSupervisor;

/// Context passed to command handlers
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub supervisor: &'a DeviceSupervisor,
    /// Twin whose command topic the message arrived on
    pub twin_uuid: &'a str,
}

impl<'a> HandlerContext<'a> {
    pub fn new(supervisor: &'a DeviceSupervisor, twin_uuid: &'a str) -> Self {
        Self { supervisor, twin_uuid }
    }
}
