//! midir-based MIDI transport implementation.

use std::sync::Mutex;
use std::sync::mpsc::Sender;

use midir::{Ignore, MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, instrument, trace};

use super::traits::{InboundMessage, MidiTransport, TransportError};
use crate::protocol::format_hex;

const CLIENT_NAME: &str = "denki";

/// Case-insensitive substring match on a port name.
///
/// midir only exposes the name, so the manufacturer is never checked. A
/// foreign port whose name contains the pattern still matches; pass a more
/// specific pattern to avoid it.
fn name_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Find a port whose name contains `pattern`, case-insensitively.
fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        if name_matches(&name, pattern) {
            debug!(port = %name, pattern = %pattern, "Found matching port");
            Some((port, name))
        } else {
            None
        }
    })
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// Names of every input and output port currently visible.
pub fn list_ports() -> Result<(Vec<String>, Vec<String>), TransportError> {
    let midi_in =
        MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Unavailable(e.to_string()))?;
    let midi_out =
        MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Unavailable(e.to_string()))?;
    Ok((port_names(&midi_in), port_names(&midi_out)))
}

/// midir output transport.
pub struct MidirTransport {
    connection: Mutex<Option<MidiOutputConnection>>,
    port_name: String,
}

impl MidirTransport {
    /// Open the first output port whose name contains `pattern`.
    #[instrument(level = "info")]
    pub fn open(pattern: &str) -> Result<Self, TransportError> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let (port, port_name) = find_port(&midi_out, pattern)
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        let connection = midi_out
            .connect(&port, &format!("{CLIENT_NAME}-out"))
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        info!(port = %port_name, "Output port opened");

        Ok(Self {
            connection: Mutex::new(Some(connection)),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Close the port. Later sends fail with [`TransportError::Closed`].
    pub fn close(&self) {
        let taken = self
            .connection
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());
        if let Some(connection) = taken {
            let _ = connection.close();
            info!(port = %self.port_name, "Output port closed");
        }
    }
}

impl MidiTransport for MidirTransport {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| TransportError::SendFailed("connection lock poisoned".into()))?;
        let connection = guard.as_mut().ok_or(TransportError::Closed)?;
        trace!(port = %self.port_name, bytes = %format_hex(data), "TX");
        connection
            .send(data)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_output_open(&self) -> bool {
        self.connection
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

/// midir input connection forwarding every message to a channel.
///
/// Dropping (or closing) the connection stops the callback before a new
/// input is opened, so a replaced port cannot deliver into the new stream.
pub struct MidirInput {
    connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidirInput {
    /// Open the first input port whose name contains `pattern`.
    #[instrument(level = "info", skip(sender))]
    pub fn open(pattern: &str, sender: Sender<InboundMessage>) -> Result<Self, TransportError> {
        let mut midi_in =
            MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Unavailable(e.to_string()))?;
        // Sysex must come through.
        midi_in.ignore(Ignore::None);

        let (port, port_name) = find_port(&midi_in, pattern)
            .ok_or_else(|| TransportError::PortNotFound(pattern.to_string()))?;

        let tag = port_name.clone();
        let connection = midi_in
            .connect(
                &port,
                &format!("{CLIENT_NAME}-in"),
                move |_stamp, bytes, _| {
                    trace!(port = %tag, bytes = %format_hex(bytes), "RX");
                    // Receiver gone means the session is shutting down.
                    let _ = sender.send(InboundMessage {
                        port: tag.clone(),
                        bytes: bytes.to_vec(),
                    });
                },
                (),
            )
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        info!(port = %port_name, "Input port opened");

        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn close(self) {
        let _ = self.connection.close();
        info!(port = %self.port_name, "Input port closed");
    }
}
