//! Mock MIDI transport for testing.

use std::sync::{Arc, Mutex};

use super::traits::{MidiTransport, TransportError};

/// Mock transport for unit testing session logic.
///
/// Clones share the same write log, so a test can hand one clone to the
/// session and inspect traffic through another.
#[derive(Clone)]
pub struct MockTransport {
    /// Captured writes.
    write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Whether the output port is "open".
    open: Arc<Mutex<bool>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            write_log: Arc::new(Mutex::new(Vec::new())),
            open: Arc::new(Mutex::new(true)),
        }
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Simulate the output port closing.
    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    /// Simulate the output port reopening.
    pub fn reopen(&self) {
        *self.open.lock().unwrap() = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiTransport for MockTransport {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !*self.open.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        self.write_log.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn is_output_open(&self) -> bool {
        *self.open.lock().unwrap()
    }
}
