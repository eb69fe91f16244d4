//! Transport layer module.

pub mod midir;
pub mod mock;
pub mod traits;

pub use self::midir::{MidirInput, MidirTransport, list_ports};
pub use mock::MockTransport;
pub use traits::{
    InboundMessage, MidiTransport, PortDirection, PortId, PortState, TransportError,
};
