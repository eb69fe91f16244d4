//! Device session - drives the state machine from port and message events.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::codec::{Bank, DeviceFamily, DeviceInfo, DeviceProfile, EncodeError};
use crate::events::{PacketDirection, SessionEvent, SessionObserver, TracingObserver};
use crate::protocol::classify;
use crate::state::handlers::{HandleResult, HandlerContext, handle_message, request_config};
use crate::state::machine::{AccessState, LinkState, SessionState};
use crate::transport::{MidiTransport, PortDirection, PortId, PortState, TransportError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("MIDI access disabled")]
    Disabled,

    #[error("Output port not open")]
    OutputClosed,

    #[error("Bank {bank} outside 1..={banks}")]
    BankOutOfRange { bank: u8, banks: u8 },

    #[error("MIDI channel {0} outside 1..=16")]
    InvalidChannel(u8),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Configuration for a device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Device family to talk to.
    pub family: DeviceFamily,
    /// Port name substring. Defaults to the family's port name.
    pub port_name: Option<String>,
    /// Channel (1-16) bank selects are sent on.
    pub bank_select_channel: u8,
    /// Emit packet events for every frame sent and received.
    pub log_packets: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            family: DeviceFamily::HachiNi,
            port_name: None,
            bank_select_channel: 1,
            log_packets: false,
        }
    }
}

impl SessionConfig {
    pub fn for_family(family: DeviceFamily) -> Self {
        Self {
            family,
            ..Default::default()
        }
    }

    /// Port name substring to look for.
    pub fn port_pattern(&self) -> &str {
        self.port_name
            .as_deref()
            .unwrap_or_else(|| self.family.port_name())
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=16).contains(&self.bank_select_channel) {
            return Err(SessionError::InvalidChannel(self.bank_select_channel));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Session with one device.
///
/// Owns the state machine. The caller feeds in access changes, port
/// transitions and inbound messages; the session answers through the
/// transport and reports to the observer.
pub struct DeviceSession<P: DeviceProfile, T: MidiTransport, O: SessionObserver> {
    profile: P,
    transport: T,
    observer: Arc<O>,
    config: SessionConfig,
    state: SessionState<P::Config>,
}

impl<P: DeviceProfile, T: MidiTransport> DeviceSession<P, T, TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(profile: P, transport: T, config: SessionConfig) -> Self {
        Self::with_observer(profile, transport, config, Arc::new(TracingObserver))
    }
}

impl<P: DeviceProfile, T: MidiTransport, O: SessionObserver> DeviceSession<P, T, O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(profile: P, transport: T, config: SessionConfig, observer: Arc<O>) -> Self {
        let state = SessionState::new(profile.live_width()).with_keys(profile.key_width());
        Self {
            profile,
            transport,
            observer,
            config,
            state,
        }
    }

    fn emit(&self, event: SessionEvent) {
        self.observer.on_event(&event);
    }

    fn observed(&self) -> ObservableTransport<'_, T, O> {
        ObservableTransport::new(&self.transport, self.observer.as_ref(), self.config.log_packets)
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Record a change of host MIDI access. `Disabled` is final.
    pub fn set_access(&mut self, access: AccessState) {
        let from = self.state.access;
        if from == AccessState::Disabled {
            warn!(to = %access, "MIDI access disabled, ignoring change");
            return;
        }
        if from == access {
            return;
        }

        info!(from = %from, to = %access, "MIDI access transition");
        self.state.access = access;
        self.emit(SessionEvent::AccessChanged { from, to: access });

        if access == AccessState::Disabled {
            self.drop_link();
        }
    }

    /// Record a port transition reported by the MIDI backend.
    ///
    /// The request frame goes out once when both ports come up, and again
    /// if the output port is replaced while the link is up.
    #[instrument(level = "debug", skip(self))]
    pub fn on_port_state(
        &mut self,
        direction: PortDirection,
        state: PortState,
        port: Option<PortId>,
    ) -> Result<()> {
        if self.state.access == AccessState::Disabled {
            debug!("Access disabled, ignoring port event");
            return Ok(());
        }

        let status = self.state.port_mut(direction);
        status.state = state;
        status.id = port.clone();
        self.emit(SessionEvent::PortChanged {
            direction,
            state,
            port,
        });

        if !self.state.ports_open() {
            self.drop_link();
            return Ok(());
        }

        let output = self.state.output.id.clone();
        if self.state.link == LinkState::Disconnected {
            // Anything that arrived while a port was down predates this link.
            if !self.state.cache.is_empty() {
                self.state.clear();
                self.emit(SessionEvent::CacheCleared);
            }
            self.goto_link(LinkState::Connecting);
        } else if self.state.requested_for == output {
            return Ok(());
        } else {
            info!(port = ?output, "Output port replaced");
        }

        self.request()?;
        self.state.requested_for = output;
        Ok(())
    }

    /// Handle one raw inbound message.
    pub fn on_message(&mut self, bytes: &[u8]) -> Result<HandleResult> {
        if self.state.access == AccessState::Disabled {
            return Ok(HandleResult::Ignored);
        }
        if self.config.log_packets {
            self.emit(SessionEvent::Packet {
                direction: PacketDirection::Rx,
                data: bytes.to_vec(),
            });
        }

        let message = classify(bytes, &self.profile.signature());
        let transport = ObservableTransport::new(
            &self.transport,
            self.observer.as_ref(),
            self.config.log_packets,
        );
        let mut ctx = HandlerContext {
            profile: &self.profile,
            transport: &transport,
            observer: self.observer.as_ref(),
            state: &mut self.state,
        };
        handle_message(&message, &mut ctx)
    }

    /// Handle a message tagged with the input port it arrived on.
    ///
    /// Traffic from a port other than the current input is dropped.
    pub fn on_message_from(&mut self, port: &str, bytes: &[u8]) -> Result<HandleResult> {
        if let Some(current) = self.state.input.id.as_deref()
            && current != port
        {
            debug!(port = %port, current = %current, "Dropping message from stale port");
            return Ok(HandleResult::Ignored);
        }
        self.on_message(bytes)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Ask the device to switch to `bank` (1-indexed) and send its config.
    ///
    /// The current bank only moves once the device answers.
    #[instrument(level = "info", skip(self))]
    pub fn select_bank(&mut self, bank: u8) -> Result<()> {
        self.check_ready()?;
        let banks = self.profile.banks();
        let bank =
            Bank::new(bank, banks).ok_or(SessionError::BankOutOfRange { bank, banks })?;

        let frame = self
            .profile
            .bank_select_frame(bank, self.config.bank_select_channel);
        self.observed().send(&frame)?;
        self.emit(SessionEvent::BankRequested { bank });
        self.request()?;
        Ok(())
    }

    /// Ask the device for its config.
    pub fn request_config(&mut self) -> Result<()> {
        self.check_ready()?;
        self.request()
    }

    /// Write an edit to the device.
    #[instrument(level = "info", skip(self))]
    pub fn save_config(&mut self, edit: &P::Edit) -> Result<()> {
        self.check_ready()?;
        let cached = self.state.cache.get(&self.state.current_bank);
        let frame = self
            .profile
            .encode_save(cached, edit)
            .map_err(SessionError::from)?;

        self.observed().send(&frame)?;
        self.emit(SessionEvent::SaveSent {
            length: frame.len(),
        });

        if let Some(bank) = self.profile.reselect_after_save(edit) {
            self.select_bank(bank.get())?;
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn profile(&self) -> &P {
        &self.profile
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState<P::Config> {
        &self.state
    }

    pub fn access(&self) -> AccessState {
        self.state.access
    }

    pub fn link_state(&self) -> LinkState {
        self.state.link
    }

    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    pub fn is_connected(&self) -> bool {
        self.state.link == LinkState::Connected
    }

    pub fn current_bank(&self) -> Bank {
        self.state.current_bank
    }

    /// Cached config for `bank`.
    pub fn bank_config(&self, bank: Bank) -> Option<&P::Config> {
        self.state.cache.get(&bank)
    }

    /// Cached config for the current bank.
    pub fn current_config(&self) -> Option<&P::Config> {
        self.bank_config(self.state.current_bank)
    }

    pub fn info(&self) -> Option<&DeviceInfo> {
        self.state.info.as_ref()
    }

    pub fn live_values(&self) -> &[u8] {
        &self.state.live_values
    }

    /// Held keys, indexed from the profile's first key.
    pub fn keys(&self) -> &[bool] {
        &self.state.keys
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_ready(&self) -> Result<(), SessionError> {
        if self.state.access == AccessState::Disabled {
            return Err(SessionError::Disabled);
        }
        if !self.transport.is_output_open() {
            return Err(SessionError::OutputClosed);
        }
        Ok(())
    }

    fn request(&mut self) -> Result<()> {
        let transport = ObservableTransport::new(
            &self.transport,
            self.observer.as_ref(),
            self.config.log_packets,
        );
        let mut ctx = HandlerContext {
            profile: &self.profile,
            transport: &transport,
            observer: self.observer.as_ref(),
            state: &mut self.state,
        };
        request_config(&mut ctx)?;
        Ok(())
    }

    fn goto_link(&mut self, to: LinkState) {
        if let Some(from) = self.state.goto_link(to) {
            self.emit(SessionEvent::LinkChanged { from, to });
        }
    }

    /// Link down: nothing cached can be trusted when the device returns.
    fn drop_link(&mut self) {
        if self.state.link == LinkState::Disconnected && self.state.cache.is_empty() {
            return;
        }
        self.goto_link(LinkState::Disconnected);
        self.state.clear();
        self.emit(SessionEvent::CacheCleared);
    }
}

/// Transport wrapper that emits packet events.
struct ObservableTransport<'a, T: MidiTransport, O: SessionObserver> {
    inner: &'a T,
    observer: &'a O,
    enabled: bool,
}

impl<'a, T: MidiTransport, O: SessionObserver> ObservableTransport<'a, T, O> {
    fn new(inner: &'a T, observer: &'a O, enabled: bool) -> Self {
        Self {
            inner,
            observer,
            enabled,
        }
    }
}

impl<T: MidiTransport, O: SessionObserver> MidiTransport for ObservableTransport<'_, T, O> {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let res = self.inner.send(data);
        if res.is_ok() && self.enabled {
            self.observer.on_event(&SessionEvent::Packet {
                direction: PacketDirection::Tx,
                data: data.to_vec(),
            });
        }
        res
    }

    fn is_output_open(&self) -> bool {
        self.inner.is_output_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::HachiNi;
    use crate::events::{NullObserver, RecordingObserver};
    use crate::protocol::constants::REQUEST_CONFIG_FRAME;
    use crate::transport::MockTransport;

    fn session(
        transport: &MockTransport,
    ) -> DeviceSession<HachiNi, MockTransport, NullObserver> {
        DeviceSession::with_observer(
            HachiNi,
            transport.clone(),
            SessionConfig::default(),
            Arc::new(NullObserver),
        )
    }

    fn connect<P: DeviceProfile, O: SessionObserver>(
        session: &mut DeviceSession<P, MockTransport, O>,
    ) {
        session
            .on_port_state(PortDirection::Input, PortState::Connected, Some("in".into()))
            .unwrap();
        session
            .on_port_state(PortDirection::Output, PortState::Connected, Some("out".into()))
            .unwrap();
    }

    #[test]
    fn test_config_defaults_and_toml() {
        let config: SessionConfig = toml::from_str("family = \"omx-27\"").unwrap();
        assert_eq!(config.family, DeviceFamily::Omx27);
        assert_eq!(config.bank_select_channel, 1);
        assert_eq!(config.port_pattern(), "omx-27");

        let config = SessionConfig {
            port_name: Some("8x2 MIDI 1".into()),
            ..Default::default()
        };
        assert_eq!(config.port_pattern(), "8x2 MIDI 1");
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<SessionConfig>(&text).unwrap(), config);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("denki-session-{}.toml", std::process::id()));
        let config = SessionConfig {
            family: DeviceFamily::Omx27,
            bank_select_channel: 10,
            log_packets: true,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_rejects_bad_channel() {
        let config = SessionConfig {
            bank_select_channel: 17,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidChannel(17))
        ));
    }

    #[test]
    fn test_request_sent_once_when_ports_open() {
        let transport = MockTransport::new();
        let mut session = session(&transport);

        session
            .on_port_state(PortDirection::Input, PortState::Connected, Some("in".into()))
            .unwrap();
        assert!(transport.get_writes().is_empty());
        assert_eq!(session.link_state(), LinkState::Disconnected);

        session
            .on_port_state(PortDirection::Output, PortState::Connected, Some("out".into()))
            .unwrap();
        assert_eq!(transport.get_writes(), vec![REQUEST_CONFIG_FRAME.to_vec()]);
        assert!(session.is_connecting());

        // Repeated report for the same port.
        session
            .on_port_state(PortDirection::Output, PortState::Connected, Some("out".into()))
            .unwrap();
        assert_eq!(transport.get_writes().len(), 1);

        // Output replaced.
        session
            .on_port_state(PortDirection::Output, PortState::Connected, Some("out-2".into()))
            .unwrap();
        assert_eq!(transport.get_writes().len(), 2);
    }

    #[test]
    fn test_select_bank_validates() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        connect(&mut session);
        transport.clear_writes();

        let err = session.select_bank(9).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::BankOutOfRange { bank: 9, banks: 8 })
        ));
        assert!(transport.get_writes().is_empty());

        transport.close();
        let err = session.select_bank(2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::OutputClosed)
        ));
    }

    #[test]
    fn test_bank_select_channel_from_config() {
        let transport = MockTransport::new();
        let config = SessionConfig {
            bank_select_channel: 10,
            ..Default::default()
        };
        let mut session =
            DeviceSession::with_observer(HachiNi, transport.clone(), config, Arc::new(NullObserver));
        connect(&mut session);
        transport.clear_writes();

        session.select_bank(2).unwrap();
        assert_eq!(transport.get_writes()[0], vec![0xC9, 1]);
    }

    #[test]
    fn test_disabled_is_terminal() {
        let transport = MockTransport::new();
        let observer = Arc::new(RecordingObserver::new());
        let mut session = DeviceSession::with_observer(
            HachiNi,
            transport.clone(),
            SessionConfig::default(),
            observer.clone(),
        );
        session.set_access(AccessState::Requesting);
        session.set_access(AccessState::Disabled);
        session.set_access(AccessState::Enabled);
        assert_eq!(session.access(), AccessState::Disabled);

        connect(&mut session);
        assert!(transport.get_writes().is_empty());
        assert_eq!(session.link_state(), LinkState::Disconnected);
        assert!(session.request_config().is_err());
        assert_eq!(session.on_message(&[0xC0, 1]).unwrap(), HandleResult::Ignored);

        let changes = observer
            .events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::AccessChanged { .. }))
            .count();
        assert_eq!(changes, 2);
    }

    #[test]
    fn test_packet_events_follow_config() {
        let transport = MockTransport::new();
        let observer = Arc::new(RecordingObserver::new());
        let config = SessionConfig {
            log_packets: true,
            ..Default::default()
        };
        let mut session =
            DeviceSession::with_observer(HachiNi, transport.clone(), config, observer.clone());
        connect(&mut session);
        session.on_message(&[0xC0, 1]).unwrap();

        let packets: Vec<_> = observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Packet { direction, data } => Some((direction, data)),
                _ => None,
            })
            .collect();
        assert_eq!(
            packets,
            vec![
                (PacketDirection::Tx, REQUEST_CONFIG_FRAME.to_vec()),
                (PacketDirection::Rx, vec![0xC0, 1]),
            ]
        );
    }
}
