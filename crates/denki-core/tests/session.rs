//! End-to-end session behavior against a mock transport.

use std::sync::Arc;

use denki_core::codec::{
    Bank, DecodeError, EncodeError, HachiNi, InterfaceMapping, Mapping, MappingEdit, Omx27,
    PotBankEdit, ScalePattern, identify,
};
use denki_core::events::{RecordingObserver, SessionEvent};
use denki_core::protocol::REQUEST_CONFIG_FRAME;
use denki_core::session::{DeviceSession, SessionConfig, SessionError};
use denki_core::state::{HandleResult, LinkState};
use denki_core::transport::{MockTransport, PortDirection, PortState};
use denki_core::{DeviceFamily, DeviceProfile, SessionObserver};

fn mapping() -> Mapping {
    let mut usb = InterfaceMapping::default();
    let mut trs = InterfaceMapping::default();
    for i in 0..16 {
        usb.ccs[i] = 40 + i as u8;
        trs.ccs[i] = 60 + i as u8;
        trs.channels[i] = 2;
    }
    usb.ccs[4] = 21;
    Mapping { usb, trs }
}

/// 8x2 config dump for `mapping` on the 0-indexed `wire_bank`.
fn hachi_ni_dump(version: [u8; 3], wire_bank: u8, mapping: &Mapping) -> Vec<u8> {
    let mut frame = vec![0xF0, 0x7D, 0x00, 0x00, 0x0F, 0x05];
    frame.extend_from_slice(&version);
    frame.push(wire_bank);
    frame.push(1);
    frame.extend_from_slice(&[0; 14]);
    frame.extend_from_slice(&mapping.usb.ccs);
    frame.extend_from_slice(&mapping.trs.ccs);
    frame.extend(mapping.usb.channels.iter().map(|ch| ch - 1));
    frame.extend(mapping.trs.channels.iter().map(|ch| ch - 1));
    frame.push(0xF7);
    frame
}

/// OMX-27 config dump with pot CCs `1..=25`, MIDI channel 1 and pot bank `wire_bank`.
fn omx_dump(wire_bank: u8, scale_pattern: u8) -> Vec<u8> {
    let mut frame = vec![0xF0, 0x7D, 0x00, 0x00, 0x0F, 0x02, 1, 13, 4, 36, 0, 0, 0];
    frame.extend(1..=25u8);
    frame.extend_from_slice(&[9, 0, 0, scale_pattern, 0, 0, 100, 0, 0, wire_bank, 0xF7]);
    frame
}

fn open<P: DeviceProfile, O: SessionObserver>(
    session: &mut DeviceSession<P, MockTransport, O>,
) {
    session
        .on_port_state(PortDirection::Input, PortState::Connected, Some("in-1".into()))
        .unwrap();
    session
        .on_port_state(PortDirection::Output, PortState::Connected, Some("out-1".into()))
        .unwrap();
}

fn omx_session(
    transport: &MockTransport,
) -> (
    DeviceSession<Omx27, MockTransport, RecordingObserver>,
    Arc<RecordingObserver>,
) {
    let observer = Arc::new(RecordingObserver::new());
    let session = DeviceSession::with_observer(
        Omx27,
        transport.clone(),
        SessionConfig::for_family(DeviceFamily::Omx27),
        observer.clone(),
    );
    (session, observer)
}

fn hachi_ni_session(
    transport: &MockTransport,
) -> (
    DeviceSession<HachiNi, MockTransport, RecordingObserver>,
    Arc<RecordingObserver>,
) {
    let observer = Arc::new(RecordingObserver::new());
    let session = DeviceSession::with_observer(
        HachiNi,
        transport.clone(),
        SessionConfig::default(),
        observer.clone(),
    );
    (session, observer)
}

#[test]
fn identify_8x2() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);

    let dump = hachi_ni_dump([1, 0, 0], 0, &mapping());
    assert_eq!(identify(&dump), Some(DeviceFamily::HachiNi));
    session.on_message(&dump).unwrap();

    let info = session.info().unwrap();
    assert_eq!(info.model.model_name(), "8x2");
    assert_eq!(info.firmware_version, "1.0.0");
    assert_eq!(info.version_major, 1);
    assert!(session.is_connected());
}

#[test]
fn bank_round_trip() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);
    transport.clear_writes();

    session.select_bank(3).unwrap();
    assert_eq!(
        transport.get_writes(),
        vec![vec![0xC0, 2], REQUEST_CONFIG_FRAME.to_vec()]
    );
    // Not optimistic.
    assert_eq!(session.current_bank().get(), 1);
    assert!(session.is_connecting());

    session
        .on_message(&hachi_ni_dump([1, 0, 0], 2, &mapping()))
        .unwrap();
    assert_eq!(session.current_bank().get(), 3);
    assert!(!session.is_connecting());
    assert_eq!(session.current_config().unwrap().mapping, mapping());
}

#[test]
fn cc_live_update() {
    let transport = MockTransport::new();
    let (mut session, observer) = hachi_ni_session(&transport);
    open(&mut session);
    session
        .on_message(&hachi_ni_dump([1, 0, 0], 0, &mapping()))
        .unwrap();

    let result = session.on_message(&[176, 21, 90]).unwrap();
    assert_eq!(result, HandleResult::LiveValue { index: 4, value: 90 });
    for (i, &value) in session.live_values().iter().enumerate() {
        assert_eq!(value, if i == 4 { 90 } else { 0 });
    }
    assert!(
        observer
            .events()
            .contains(&SessionEvent::LiveValueChanged { index: 4, value: 90 })
    );
}

#[test]
fn disconnect_invalidates_banks() {
    let transport = MockTransport::new();
    let (mut session, observer) = hachi_ni_session(&transport);
    open(&mut session);
    session
        .on_message(&hachi_ni_dump([1, 0, 0], 0, &mapping()))
        .unwrap();
    session.on_message(&[176, 21, 90]).unwrap();
    assert!(session.current_config().is_some());

    session
        .on_port_state(PortDirection::Input, PortState::Disconnected, None)
        .unwrap();
    assert_eq!(session.link_state(), LinkState::Disconnected);
    assert!(session.state().cache.is_empty());
    assert!(session.live_values().iter().all(|&v| v == 0));
    assert!(session.info().is_none());
    assert!(observer.events().contains(&SessionEvent::CacheCleared));

    // Reconnect requests again.
    transport.clear_writes();
    session
        .on_port_state(PortDirection::Input, PortState::Connected, Some("in-1".into()))
        .unwrap();
    assert_eq!(transport.get_writes(), vec![REQUEST_CONFIG_FRAME.to_vec()]);
    assert!(session.is_connecting());
}

#[test]
fn bank_echo_does_not_rerequest() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);
    transport.clear_writes();

    let result = session.on_message(&[0xC4, 5]).unwrap();
    assert_eq!(
        result,
        HandleResult::BankChanged {
            bank: Bank::new(6, 8).unwrap()
        }
    );
    assert!(transport.get_writes().is_empty());
}

#[test]
fn out_of_range_bank_is_rejected() {
    let transport = MockTransport::new();
    let (mut session, observer) = hachi_ni_session(&transport);
    open(&mut session);

    let result = session
        .on_message(&hachi_ni_dump([1, 0, 0], 8, &mapping()))
        .unwrap();
    let error = DecodeError::BankOutOfRange { wire: 8, banks: 8 };
    assert_eq!(result, HandleResult::DecodeFailed(error.clone()));
    assert!(session.state().cache.is_empty());
    assert!(session.is_connecting());
    assert!(
        observer
            .events()
            .contains(&SessionEvent::DecodeFailed { error })
    );
}

#[test]
fn stale_input_port_dropped() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);
    session
        .on_port_state(PortDirection::Input, PortState::Connected, Some("in-2".into()))
        .unwrap();

    let dump = hachi_ni_dump([1, 0, 0], 0, &mapping());
    assert_eq!(
        session.on_message_from("in-1", &dump).unwrap(),
        HandleResult::Ignored
    );
    assert!(session.is_connecting());

    session.on_message_from("in-2", &dump).unwrap();
    assert!(session.is_connected());
}

#[test]
fn hachi_ni_save_reselects_bank() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);
    transport.clear_writes();

    let edit = MappingEdit {
        bank: Bank::new(4, 8).unwrap(),
        mapping: mapping(),
    };
    session.save_config(&edit).unwrap();

    let writes = transport.get_writes();
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[0].len(), 90);
    assert_eq!(&writes[0][..5], &[0xF0, 0x7D, 0x00, 0x00, 0x0E]);
    assert_eq!(writes[0][9], 3);
    assert_eq!(writes[1], vec![0xC0, 3]);
    assert_eq!(writes[2], REQUEST_CONFIG_FRAME.to_vec());
}

#[test]
fn omx_scale_sentinel_and_banks() {
    let transport = MockTransport::new();
    let mut session = DeviceSession::with_observer(
        Omx27,
        transport.clone(),
        SessionConfig::for_family(DeviceFamily::Omx27),
        Arc::new(RecordingObserver::new()),
    );
    open(&mut session);

    session.on_message(&omx_dump(3, 127)).unwrap();
    let config = session.current_config().unwrap();
    assert_eq!(config.scale.pattern, ScalePattern::Off);
    assert_eq!(session.current_bank().get(), 4);
    assert_eq!(session.state().cache.len(), 5);
    assert_eq!(session.live_values().len(), 25);

    // Third pot of bank 4 is CC 18 on channel 1.
    let result = session.on_message(&[0xB0, 18, 77]).unwrap();
    assert_eq!(result, HandleResult::LiveValue { index: 17, value: 77 });
}

#[test]
fn omx_select_bank_and_save() {
    let transport = MockTransport::new();
    let mut session = DeviceSession::with_observer(
        Omx27,
        transport.clone(),
        SessionConfig::for_family(DeviceFamily::Omx27),
        Arc::new(RecordingObserver::new()),
    );
    open(&mut session);
    transport.clear_writes();

    // Nothing cached yet.
    let edit = PotBankEdit {
        bank: Bank::new(1, 5).unwrap(),
        ccs: [70, 71, 72, 73, 74],
    };
    assert!(session.save_config(&edit).is_err());
    assert!(transport.get_writes().is_empty());

    session.select_bank(5).unwrap();
    assert_eq!(
        transport.get_writes(),
        vec![vec![0xB0, 0, 4], REQUEST_CONFIG_FRAME.to_vec()]
    );
    assert!(session.select_bank(6).is_err());

    session.on_message(&omx_dump(4, 0)).unwrap();
    transport.clear_writes();
    session.save_config(&edit).unwrap();

    let writes = transport.get_writes();
    assert_eq!(writes.len(), 1);
    let save = &writes[0];
    assert_eq!(save.len(), 38);
    assert_eq!(&save[..5], &[0xF0, 0x7D, 0x00, 0x00, 0x0D]);
    assert_eq!(&save[9..14], &[70, 71, 72, 73, 74]);
    assert_eq!(&save[14..34], &(6..=25u8).collect::<Vec<_>>()[..]);
    assert_eq!(save[37], 0xF7);
}

#[test]
fn omx_empty_save_echo_rerequests() {
    let transport = MockTransport::new();
    let mut session = DeviceSession::with_observer(
        Omx27,
        transport.clone(),
        SessionConfig::for_family(DeviceFamily::Omx27),
        Arc::new(RecordingObserver::new()),
    );
    open(&mut session);
    transport.clear_writes();

    let result = session.on_message(&[0xFC, 0x7D, 0x00, 0x00, 0xF7]).unwrap();
    assert_eq!(result, HandleResult::ConfigRequested);
    assert_eq!(transport.get_writes(), vec![REQUEST_CONFIG_FRAME.to_vec()]);
}

#[test]
fn hachi_ni_dump_with_bad_channel_rejected() {
    let transport = MockTransport::new();
    let (mut session, _) = hachi_ni_session(&transport);
    open(&mut session);

    let mut dump = hachi_ni_dump([1, 0, 0], 0, &mapping());
    // First USB channel byte.
    dump[4 + 53] = 0x7F;
    let result = session.on_message(&dump).unwrap();
    assert_eq!(
        result,
        HandleResult::DecodeFailed(DecodeError::UnknownEnumValue {
            field: "usb channel",
            value: 0x7F
        })
    );
    assert!(session.current_config().is_none());
    assert!(session.is_connecting());
}

#[test]
fn omx_save_rejects_bank_past_pot_banks() {
    let transport = MockTransport::new();
    let (mut session, _) = omx_session(&transport);
    open(&mut session);
    session.on_message(&omx_dump(0, 0)).unwrap();
    transport.clear_writes();

    let edit = PotBankEdit {
        bank: Bank::new(7, 8).unwrap(),
        ccs: [70, 71, 72, 73, 74],
    };
    let error = session.save_config(&edit).unwrap_err();
    assert!(error.to_string().contains("bank value 7 out of range"));
    assert!(matches!(
        error.downcast_ref::<SessionError>(),
        Some(SessionError::Encode(EncodeError::ValueOutOfRange {
            field: "bank",
            value: 7
        }))
    ));
    assert!(transport.get_writes().is_empty());
}

#[test]
fn omx_keys_mirror_notes_and_clear_on_disconnect() {
    let transport = MockTransport::new();
    let (mut session, observer) = omx_session(&transport);
    open(&mut session);
    assert_eq!(session.keys().len(), 26);

    session.on_message(&omx_dump(0, 0)).unwrap();
    let result = session.on_message(&[0x90, 64, 100]).unwrap();
    assert_eq!(
        result,
        HandleResult::KeyChanged {
            key: 64,
            pressed: true
        }
    );
    assert!(session.keys()[64 - 59]);
    assert!(observer.events().contains(&SessionEvent::KeyChanged {
        key: 64,
        pressed: true
    }));

    session
        .on_port_state(PortDirection::Output, PortState::Disconnected, None)
        .unwrap();
    assert_eq!(session.keys().len(), 26);
    assert!(session.keys().iter().all(|&k| !k));
}

#[test]
fn dump_before_output_opens_is_discarded() {
    let transport = MockTransport::new();
    let (mut session, observer) = hachi_ni_session(&transport);
    session
        .on_port_state(PortDirection::Input, PortState::Connected, Some("in-1".into()))
        .unwrap();
    session
        .on_message(&hachi_ni_dump([1, 0, 0], 0, &mapping()))
        .unwrap();
    assert_eq!(session.link_state(), LinkState::Disconnected);

    session
        .on_port_state(PortDirection::Output, PortState::Connected, Some("out-1".into()))
        .unwrap();
    assert!(session.is_connecting());
    assert!(session.current_config().is_none());
    assert!(session.info().is_none());
    assert!(observer.events().contains(&SessionEvent::CacheCleared));
    assert_eq!(transport.get_writes(), vec![REQUEST_CONFIG_FRAME.to_vec()]);
}
