pub mod actions;
pub mod map;
mod reconnect;
mod streams;
pub mod supervisor;

pub use actions::ActionTracker;
pub use map::{MapProvider, MapSnapshot};
pub use supervisor::{AdapterFactory, DeviceSupervisor};
