//! Denki-Core: config protocol and session tracking for the 8x2 and OMX-27
//! MIDI controllers.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Constants, sysex signatures, inbound message classification
//! - **Codec**: Config dump decoding and save frame encoding per device family
//! - **Transport**: MIDI output abstraction (midir, mock) and input forwarding
//! - **State**: Session state machine and message handlers
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Drives the state machine from port and message events
//!
//! # Example
//!
//! ```no_run
//! use denki_core::codec::HachiNi;
//! use denki_core::session::{DeviceSession, SessionConfig};
//! use denki_core::transport::{MidirTransport, PortDirection, PortState};
//!
//! # fn main() -> anyhow::Result<()> {
//! let transport = MidirTransport::open("hachi-ni")?;
//! let mut session = DeviceSession::new(HachiNi, transport, SessionConfig::default());
//! session.on_port_state(PortDirection::Input, PortState::Connected, Some("in".into()))?;
//! session.on_port_state(PortDirection::Output, PortState::Connected, Some("out".into()))?;
//! session.select_bank(3)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod events;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use codec::{
    Bank, DecodeError, DeviceFamily, DeviceInfo, DeviceProfile, EncodeError, HachiNi, Omx27,
    identify,
};
pub use events::{
    LogLevel, NullObserver, PacketDirection, RecordingObserver, SessionEvent, SessionObserver,
    TracingObserver,
};
pub use protocol::{Message, classify};
pub use session::{DeviceSession, SessionConfig, SessionError};
pub use state::{AccessState, HandleResult, LinkState};
pub use transport::{MidiTransport, MidirInput, MidirTransport, MockTransport, TransportError};
