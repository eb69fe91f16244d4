//! Session state: access, ports, link, bank cache and live values.

use std::collections::BTreeMap;
use std::fmt;

use crate::codec::{Bank, DeviceInfo};
use crate::transport::{PortDirection, PortId, PortState};

/// Host MIDI access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessState {
    /// Access was refused or revoked. Terminal.
    Disabled,
    /// Not requested yet.
    #[default]
    Pending,
    /// Request in flight.
    Requesting,
    Enabled,
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessState::Disabled => write!(f, "DISABLED"),
            AccessState::Pending => write!(f, "PENDING"),
            AccessState::Requesting => write!(f, "REQUESTING"),
            AccessState::Enabled => write!(f, "ENABLED"),
        }
    }
}

/// Device link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    /// Both ports open, waiting for the first config dump.
    Connecting,
    /// Config dump received.
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "DISCONNECTED"),
            LinkState::Connecting => write!(f, "CONNECTING"),
            LinkState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// State and identity of one port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortStatus {
    pub state: PortState,
    pub id: Option<PortId>,
}

impl PortStatus {
    pub fn is_connected(&self) -> bool {
        self.state == PortState::Connected
    }
}

/// Everything the session knows about the device.
///
/// `C` is the family's decoded config type.
#[derive(Debug)]
pub struct SessionState<C> {
    pub access: AccessState,
    pub input: PortStatus,
    pub output: PortStatus,
    pub link: LinkState,
    pub current_bank: Bank,
    /// Last decoded config per bank.
    pub cache: BTreeMap<Bank, C>,
    /// Mirror of the device's potentiometer positions.
    pub live_values: Vec<u8>,
    /// Mirror of held keys, indexed from the profile's first key.
    pub keys: Vec<bool>,
    /// Identity from the latest dump.
    pub info: Option<DeviceInfo>,
    /// Output port the request frame was last sent to while open.
    pub requested_for: Option<PortId>,
}

impl<C> SessionState<C> {
    pub fn new(live_width: usize) -> Self {
        Self {
            access: AccessState::default(),
            input: PortStatus::default(),
            output: PortStatus::default(),
            link: LinkState::default(),
            current_bank: Bank::FIRST,
            cache: BTreeMap::new(),
            live_values: vec![0; live_width],
            keys: Vec::new(),
            info: None,
            requested_for: None,
        }
    }

    /// Size the key mirror. Families without a keyboard keep it empty.
    pub fn with_keys(mut self, key_width: usize) -> Self {
        self.keys = vec![false; key_width];
        self
    }

    pub fn port(&self, direction: PortDirection) -> &PortStatus {
        match direction {
            PortDirection::Input => &self.input,
            PortDirection::Output => &self.output,
        }
    }

    pub fn port_mut(&mut self, direction: PortDirection) -> &mut PortStatus {
        match direction {
            PortDirection::Input => &mut self.input,
            PortDirection::Output => &mut self.output,
        }
    }

    /// Both ports connected.
    pub fn ports_open(&self) -> bool {
        self.input.is_connected() && self.output.is_connected()
    }

    /// Transition the link. Returns the previous state if it changed.
    pub fn goto_link(&mut self, to: LinkState) -> Option<LinkState> {
        if self.link == to {
            return None;
        }
        let from = self.link;
        tracing::info!(from = %from, to = %to, "Link transition");
        self.link = to;
        Some(from)
    }

    /// Link up but no config seen yet.
    pub fn is_connecting(&self) -> bool {
        self.link == LinkState::Connecting
    }

    /// Drop cached banks, zero the live mirror and release every key.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.live_values.iter_mut().for_each(|v| *v = 0);
        self.keys.iter_mut().for_each(|k| *k = false);
        self.info = None;
        self.requested_for = None;
    }
}
