//! Inbound message classification.
//!
//! Every raw MIDI message from the input port lands in exactly one
//! [`Message`] variant. Traffic that does not belong to the device (other
//! vendors' sysex, system real-time bytes, truncated channel messages) is
//! `Unrecognized`, which is not an error on a shared bus.

use std::fmt;

use super::constants::{
    CONTROL_CHANGE, MANUFACTURER_ID, NOTE_OFF, NOTE_ON, OMX_SAVE_ACK_STATUS, PROGRAM_CHANGE,
    SYSEX_END, SYSEX_START,
};

/// Leading bytes identifying sysex traffic for one device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorSignature {
    pub manufacturer_id: [u8; 3],
    /// Extra status byte accepted in place of `0xF0` for save acknowledgements.
    pub save_ack_status: Option<u8>,
}

impl VendorSignature {
    /// 8x2 signature: plain sysex only.
    pub const HACHI_NI: Self = Self {
        manufacturer_id: MANUFACTURER_ID,
        save_ack_status: None,
    };

    /// OMX-27 signature: sysex plus the on-device save acknowledgement.
    pub const OMX_27: Self = Self {
        manufacturer_id: MANUFACTURER_ID,
        save_ack_status: Some(OMX_SAVE_ACK_STATUS),
    };

    /// Strip the manufacturer id and a trailing end-of-exclusive byte.
    ///
    /// `body` is the message without its status byte. Returns `None` if the
    /// manufacturer id does not match.
    fn strip<'a>(&self, body: &'a [u8]) -> Option<&'a [u8]> {
        let rest = body.strip_prefix(&self.manufacturer_id[..])?;
        Some(rest.strip_suffix(&[SYSEX_END]).unwrap_or(rest))
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// Program Change. `bank` is the raw (0-indexed) wire byte.
    BankChange { channel: u8, bank: u8 },
    /// Control Change.
    ControlChange { channel: u8, control: u8, value: u8 },
    /// Note On. Velocity 0 is left as sent; see [`Message::key_state`].
    NoteOn { channel: u8, key: u8, velocity: u8 },
    /// Note Off.
    NoteOff { channel: u8, key: u8 },
    /// Vendor sysex. Empty `payload` means the device acknowledged without data.
    SysexConfig { payload: &'a [u8] },
    /// Save acknowledgement sent by the device after an on-device save.
    SysexSaveEcho { payload: &'a [u8] },
    /// Anything else.
    Unrecognized,
}

/// Discriminant of [`Message`], handy for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    BankChange,
    ControlChange,
    NoteOn,
    NoteOff,
    SysexConfig,
    SysexSaveEcho,
    Unrecognized,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::BankChange => write!(f, "BANK_CHANGE"),
            MessageKind::ControlChange => write!(f, "CONTROL_CHANGE"),
            MessageKind::NoteOn => write!(f, "NOTE_ON"),
            MessageKind::NoteOff => write!(f, "NOTE_OFF"),
            MessageKind::SysexConfig => write!(f, "SYSEX_CONFIG"),
            MessageKind::SysexSaveEcho => write!(f, "SYSEX_SAVE_ECHO"),
            MessageKind::Unrecognized => write!(f, "UNRECOGNIZED"),
        }
    }
}

impl Message<'_> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::BankChange { .. } => MessageKind::BankChange,
            Message::ControlChange { .. } => MessageKind::ControlChange,
            Message::NoteOn { .. } => MessageKind::NoteOn,
            Message::NoteOff { .. } => MessageKind::NoteOff,
            Message::SysexConfig { .. } => MessageKind::SysexConfig,
            Message::SysexSaveEcho { .. } => MessageKind::SysexSaveEcho,
            Message::Unrecognized => MessageKind::Unrecognized,
        }
    }

    /// Sysex payload, if this is a vendor sysex message.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Message::SysexConfig { payload } | Message::SysexSaveEcho { payload } => Some(payload),
            _ => None,
        }
    }

    /// Channel, key and pressed flag of a note message.
    ///
    /// Note On with velocity 0 counts as a release.
    pub fn key_state(&self) -> Option<(u8, u8, bool)> {
        match *self {
            Message::NoteOn {
                channel,
                key,
                velocity,
            } => Some((channel, key, velocity > 0)),
            Message::NoteOff { channel, key } => Some((channel, key, false)),
            _ => None,
        }
    }
}

/// Classify a raw inbound message against a family's signature.
pub fn classify<'a>(bytes: &'a [u8], signature: &VendorSignature) -> Message<'a> {
    let Some((&status, body)) = bytes.split_first() else {
        return Message::Unrecognized;
    };

    match status & 0xF0 {
        PROGRAM_CHANGE => {
            return match body.first() {
                Some(&bank) => Message::BankChange {
                    channel: status & 0x0F,
                    bank,
                },
                None => Message::Unrecognized,
            };
        }
        CONTROL_CHANGE => {
            return match body {
                [control, value, ..] => Message::ControlChange {
                    channel: status & 0x0F,
                    control: *control,
                    value: *value,
                },
                _ => Message::Unrecognized,
            };
        }
        NOTE_ON => {
            return match body {
                [key, velocity, ..] => Message::NoteOn {
                    channel: status & 0x0F,
                    key: *key,
                    velocity: *velocity,
                },
                _ => Message::Unrecognized,
            };
        }
        NOTE_OFF => {
            return match body {
                [key, _, ..] => Message::NoteOff {
                    channel: status & 0x0F,
                    key: *key,
                },
                _ => Message::Unrecognized,
            };
        }
        _ => {}
    }

    if status == SYSEX_START {
        return match signature.strip(body) {
            Some(payload) => Message::SysexConfig { payload },
            None => Message::Unrecognized,
        };
    }

    if signature.save_ack_status == Some(status) {
        return match signature.strip(body) {
            Some(payload) => Message::SysexSaveEcho { payload },
            None => Message::Unrecognized,
        };
    }

    Message::Unrecognized
}

/// Hex dump used in log lines.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
