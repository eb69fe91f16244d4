//! MIDI transport abstraction.
//!
//! Defines the `MidiTransport` trait the session sends through, allowing
//! different implementations (midir, mock, etc.). Inbound traffic is not
//! pulled through the trait: the owner of the session feeds messages and
//! port transitions in as they arrive.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("MIDI backend unavailable: {0}")]
    Unavailable(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to open port: {0}")]
    OpenFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Output port closed")]
    Closed,
}

/// Abstract MIDI output.
///
/// This trait enables:
/// - Production implementation using midir
/// - Mock implementation for unit testing
pub trait MidiTransport: Send + Sync {
    /// Send one complete MIDI message.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Whether the output port is open. `send` on a closed port fails.
    fn is_output_open(&self) -> bool;
}

impl<T: MidiTransport + ?Sized> MidiTransport for &T {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn is_output_open(&self) -> bool {
        (**self).is_output_open()
    }
}

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "IN"),
            PortDirection::Output => write!(f, "OUT"),
        }
    }
}

/// Port connection state as reported by the MIDI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Disconnected => write!(f, "disconnected"),
            PortState::Connecting => write!(f, "connecting"),
            PortState::Connected => write!(f, "connected"),
        }
    }
}

/// Port identity. Used to drop traffic from a port that has been replaced.
pub type PortId = String;

/// Raw message received on an input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub port: PortId,
    pub bytes: Vec<u8>,
}
