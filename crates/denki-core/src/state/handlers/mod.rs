//! Message handlers - dispatch logic for each classified message.
//!
//! This module is split into submodules by message kind:
//! - `channel`: bank echoes, Control Change live values and key states
//! - `sysex`: config dumps and save acknowledgements

mod channel;
mod sysex;

use anyhow::Result;
use tracing::debug;

use crate::codec::{Bank, DecodeError, DeviceProfile};
use crate::events::{LogLevel, SessionEvent, SessionObserver};
use crate::protocol::Message;
use crate::protocol::constants::REQUEST_CONFIG_FRAME;
use crate::state::machine::{LinkState, SessionState};
use crate::transport::MidiTransport;

use channel::{handle_bank_echo, handle_control_change, handle_key};
use sysex::handle_dump;

/// Result of handling a message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleResult {
    /// Nothing to do with this message.
    Ignored,
    /// Request frame (re)sent.
    ConfigRequested,
    /// Config dump decoded and cached; device now on `bank`.
    ConfigCached { bank: Bank },
    /// Device announced a bank change.
    BankChanged { bank: Bank },
    /// Live value mirror updated.
    LiveValue { index: usize, value: u8 },
    /// Key mirror updated. `key` is the MIDI note number.
    KeyChanged { key: u8, pressed: bool },
    /// Dump did not decode. State untouched.
    DecodeFailed(DecodeError),
}

/// Handler context containing all resources.
pub struct HandlerContext<'a, P: DeviceProfile, T: MidiTransport, O: SessionObserver> {
    pub profile: &'a P,
    pub transport: &'a T,
    pub observer: &'a O,
    pub state: &'a mut SessionState<P::Config>,
}

impl<P: DeviceProfile, T: MidiTransport, O: SessionObserver> HandlerContext<'_, P, T, O> {
    pub(crate) fn emit(&self, event: SessionEvent) {
        self.observer.on_event(&event);
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(SessionEvent::Log {
            level,
            message: message.into(),
        });
    }

    pub(crate) fn goto_link(&mut self, to: LinkState) {
        if let Some(from) = self.state.goto_link(to) {
            self.emit(SessionEvent::LinkChanged { from, to });
        }
    }
}

/// Send the identify / request frame.
pub fn request_config<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    ctx: &mut HandlerContext<'_, P, T, O>,
) -> Result<HandleResult> {
    ctx.transport.send(&REQUEST_CONFIG_FRAME)?;
    ctx.emit(SessionEvent::ConfigRequested);
    Ok(HandleResult::ConfigRequested)
}

/// Handle a classified message and perform the appropriate action.
pub fn handle_message<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    message: &Message<'_>,
    ctx: &mut HandlerContext<'_, P, T, O>,
) -> Result<HandleResult> {
    debug!(kind = %message.kind(), "Dispatching message");

    // Bank echoes take priority: on the OMX-27 the echo is itself a Control Change.
    if let Some(wire) = ctx.profile.bank_echo(message) {
        return handle_bank_echo(ctx, wire);
    }

    match message {
        Message::SysexConfig { payload } | Message::SysexSaveEcho { payload } => {
            handle_dump(ctx, payload)
        }
        Message::ControlChange {
            channel,
            control,
            value,
        } => handle_control_change(ctx, *channel, *control, *value),
        Message::NoteOn { .. } | Message::NoteOff { .. } => match message.key_state() {
            Some((channel, key, pressed)) => handle_key(ctx, channel, key, pressed),
            None => Ok(HandleResult::Ignored),
        },
        Message::BankChange { .. } | Message::Unrecognized => Ok(HandleResult::Ignored),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hachi_ni::tests::{config_frame, sample_mapping};
    use crate::codec::omx27::tests::DEVICE_DUMP;
    use crate::codec::{HachiNi, Omx27};
    use crate::events::NullObserver;
    use crate::protocol::classify;
    use crate::transport::{MockTransport, PortState};

    fn open<C>(state: &mut SessionState<C>) {
        state.input.state = PortState::Connected;
        state.output.state = PortState::Connected;
        state.link = LinkState::Connecting;
    }

    fn dispatch<P: DeviceProfile>(
        profile: &P,
        transport: &MockTransport,
        state: &mut SessionState<P::Config>,
        bytes: &[u8],
    ) -> HandleResult {
        let message = classify(bytes, &profile.signature());
        let mut ctx = HandlerContext {
            profile,
            transport,
            observer: &NullObserver,
            state,
        };
        handle_message(&message, &mut ctx).unwrap()
    }

    #[test]
    fn test_config_dump_caches_and_connects() {
        let transport = MockTransport::new();
        let mut state = SessionState::new(16);
        open(&mut state);

        let frame = config_frame([1, 0, 0], 2, &sample_mapping());
        let result = dispatch(&HachiNi, &transport, &mut state, &frame);

        let bank = Bank::new(3, 8).unwrap();
        assert_eq!(result, HandleResult::ConfigCached { bank });
        assert_eq!(state.current_bank, bank);
        assert_eq!(state.link, LinkState::Connected);
        assert_eq!(state.cache.len(), 1);
        assert_eq!(state.cache[&bank].mapping, sample_mapping());
        assert!(transport.get_writes().is_empty());
    }

    #[test]
    fn test_empty_payload_rerequests() {
        let transport = MockTransport::new();
        let mut state = SessionState::new(25);
        open(&mut state);

        let result = dispatch(&Omx27, &transport, &mut state, &[0xF0, 0x7D, 0x00, 0x00, 0xF7]);
        assert_eq!(result, HandleResult::ConfigRequested);

        let result = dispatch(&Omx27, &transport, &mut state, &[0xFC, 0x7D, 0x00, 0x00]);
        assert_eq!(result, HandleResult::ConfigRequested);

        assert_eq!(
            transport.get_writes(),
            vec![REQUEST_CONFIG_FRAME.to_vec(), REQUEST_CONFIG_FRAME.to_vec()]
        );
    }

    #[test]
    fn test_decode_failure_leaves_state() {
        let transport = MockTransport::new();
        let mut state = SessionState::new(25);
        open(&mut state);

        let result = dispatch(&Omx27, &transport, &mut state, &DEVICE_DUMP[..20]);
        assert!(matches!(
            result,
            HandleResult::DecodeFailed(DecodeError::TooShort { .. })
        ));
        assert!(state.cache.is_empty());
        assert!(state.is_connecting());
    }

    #[test]
    fn test_foreign_traffic_ignored() {
        let transport = MockTransport::new();
        let mut state = SessionState::new(16);
        open(&mut state);

        for bytes in [&[0xF8][..], &[0x90, 60, 100], &[0xF0, 0x41, 0x10, 0xF7]] {
            assert_eq!(
                dispatch(&HachiNi, &transport, &mut state, bytes),
                HandleResult::Ignored
            );
        }
        // Program Change is not a bank echo on the OMX-27.
        let mut omx_state = SessionState::new(25);
        assert_eq!(
            dispatch(&Omx27, &transport, &mut omx_state, &[0xC0, 2]),
            HandleResult::Ignored
        );
    }
}
