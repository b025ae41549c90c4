pub mod memory;
pub mod mqtt;
pub mod traits;

pub use memory::{MemoryTransport, PublishedMessage};
pub use mqtt::{MqttTransport, MqttTransportConfig};
pub use traits::{MessageHandler, PlatformTransport, TransportError, Twin};
