//! Event system for UI decoupling.
//!
//! Allows CLI/GUI front ends to follow session state without polling
//! or tight coupling to the core logic.

use std::fmt;
use std::sync::Mutex;

use crate::codec::{Bank, DecodeError, DeviceInfo};
use crate::protocol::format_hex;
use crate::state::{AccessState, LinkState};
use crate::transport::{PortDirection, PortState};

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Events emitted by a device session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// MIDI access state changed.
    AccessChanged { from: AccessState, to: AccessState },
    /// One port changed state.
    PortChanged {
        direction: PortDirection,
        state: PortState,
        port: Option<String>,
    },
    /// Device link state changed.
    LinkChanged { from: LinkState, to: LinkState },
    /// Identify / request frame sent.
    ConfigRequested,
    /// Bank select sent; the bank changes once the device echoes it.
    BankRequested { bank: Bank },
    /// Current bank changed.
    BankChanged { bank: Bank },
    /// A config dump replaced the cache entries for `banks`.
    ConfigCached { banks: Vec<Bank>, info: DeviceInfo },
    /// Live potentiometer value changed.
    LiveValueChanged { index: usize, value: u8 },
    /// Key pressed or released. `key` is the MIDI note number.
    KeyChanged { key: u8, pressed: bool },
    /// Cached banks and live values dropped.
    CacheCleared,
    /// Save frame sent.
    SaveSent { length: usize },
    /// A config dump failed to decode. State is unchanged.
    DecodeFailed { error: DecodeError },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// MIDI message sent/received.
    Packet {
        direction: PacketDirection,
        data: Vec<u8>,
    },
}

/// MIDI packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Device
    Rx, // Device -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait SessionObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SessionEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_event(&self, _event: &SessionEvent) {}
}

/// Observer that keeps every event. Handy in tests and for replaying
/// a session into a UI that attaches late.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::AccessChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "MIDI access changed");
            }
            SessionEvent::PortChanged {
                direction,
                state,
                port,
            } => {
                tracing::info!(dir = %direction, state = %state, port = ?port, "Port changed");
            }
            SessionEvent::LinkChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Link changed");
            }
            SessionEvent::ConfigRequested => {
                tracing::debug!("Config requested");
            }
            SessionEvent::BankRequested { bank } => {
                tracing::debug!(bank = %bank, "Bank requested");
            }
            SessionEvent::BankChanged { bank } => {
                tracing::info!(bank = %bank, "Bank changed");
            }
            SessionEvent::ConfigCached { banks, info } => {
                tracing::info!(
                    model = %info.model,
                    version = %info.firmware_version,
                    eeprom = info.eeprom_version,
                    banks = ?banks.iter().map(|b| b.get()).collect::<Vec<_>>(),
                    "Config cached"
                );
            }
            SessionEvent::LiveValueChanged { index, value } => {
                tracing::trace!(index = index, value = value, "Live value");
            }
            SessionEvent::KeyChanged { key, pressed } => {
                tracing::trace!(key = key, pressed = pressed, "Key");
            }
            SessionEvent::CacheCleared => {
                tracing::info!("Cached config cleared");
            }
            SessionEvent::SaveSent { length } => {
                tracing::info!(length = length, "Save sent");
            }
            SessionEvent::DecodeFailed { error } => {
                tracing::warn!(error = %error, "Config decode failed");
            }
            SessionEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            SessionEvent::Packet { direction, data } => {
                tracing::trace!(dir = %direction, len = data.len(), bytes = %format_hex(data), "MIDI packet");
            }
        }
    }
}
