//! Config codecs for both device families.
//!
//! Decoding takes a sysex payload as produced by [`classify`]: status byte,
//! manufacturer id and trailing `0xF7` already stripped. Encoding produces
//! a complete frame ready for [`MidiTransport::send`].
//!
//! [`classify`]: crate::protocol::classify
//! [`MidiTransport::send`]: crate::transport::MidiTransport::send

pub mod hachi_ni;
pub mod omx27;

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

use byteorder::ReadBytesExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::constants::{
    DATA_MAX, MANUFACTURER_ID, MODEL_HACHI_NI, MODEL_OMX_27, OFFSET_COMMAND, OFFSET_MODEL,
    OFFSET_VERSION, SYSEX_START, VERSION_LEN,
};
use crate::protocol::{Message, VendorSignature};

pub use hachi_ni::{HachiNi, HachiNiConfig, InterfaceMapping, Mapping, MappingEdit};
pub use omx27::{
    MacroMode, MidiInfo, Omx27, Omx27Config, Omx27Save, PotBankEdit, PotentiometerBank,
    ScaleInfo, ScalePattern, ScaleRoot, SequencerInfo, SequencerMode,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("Unknown {field} value {value}")]
    UnknownEnumValue { field: &'static str, value: u8 },
    #[error("{field} value {value} is not a MIDI data byte")]
    ValueOutOfRange { field: &'static str, value: u8 },
    #[error("Unexpected sysex command 0x{0:02X}")]
    UnexpectedCommand(u8),
    #[error("Model mismatch: expected {expected}, got {actual}")]
    ModelMismatch {
        expected: DeviceFamily,
        actual: DeviceFamily,
    },
    #[error("Bank byte {wire} outside 1..={banks}")]
    BankOutOfRange { wire: u8, banks: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} value {value} out of range")]
    ValueOutOfRange { field: &'static str, value: u8 },
    #[error("No cached config to build the save message from")]
    NoCachedConfig,
}

// ============================================================================
// Banks
// ============================================================================

/// Device bank, 1-indexed. The wire carries `bank - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Bank(u8);

impl Bank {
    pub const FIRST: Bank = Bank(1);

    /// Bank `number` if it lies in `1..=banks`.
    pub fn new(number: u8, banks: u8) -> Option<Self> {
        (1..=banks).contains(&number).then_some(Self(number))
    }

    /// Bank from a 0-indexed wire byte.
    pub fn from_wire(wire: u8, banks: u8) -> Option<Self> {
        wire.checked_add(1).and_then(|n| Self::new(n, banks))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn to_wire(self) -> u8 {
        self.0 - 1
    }

    /// Every bank in `1..=banks`.
    pub fn all(banks: u8) -> impl Iterator<Item = Bank> {
        (1..=banks).map(Bank)
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Device identification
// ============================================================================

/// Supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceFamily {
    #[serde(rename = "8x2")]
    HachiNi,
    #[serde(rename = "omx-27")]
    Omx27,
}

impl DeviceFamily {
    pub fn from_model(model: u8) -> Option<Self> {
        match model {
            MODEL_HACHI_NI => Some(Self::HachiNi),
            MODEL_OMX_27 => Some(Self::Omx27),
            _ => None,
        }
    }

    pub fn model_number(self) -> u8 {
        match self {
            Self::HachiNi => MODEL_HACHI_NI,
            Self::Omx27 => MODEL_OMX_27,
        }
    }

    /// Model name reported to users.
    pub fn model_name(self) -> &'static str {
        match self {
            Self::HachiNi => "8x2",
            Self::Omx27 => "OMX-27",
        }
    }

    /// Substring the device's MIDI port names contain.
    pub fn port_name(self) -> &'static str {
        match self {
            Self::HachiNi => "hachi-ni",
            Self::Omx27 => "omx-27",
        }
    }

    pub fn banks(self) -> u8 {
        match self {
            Self::HachiNi => crate::protocol::hachi_ni::BANKS,
            Self::Omx27 => crate::protocol::omx27::BANKS,
        }
    }

    pub fn signature(self) -> VendorSignature {
        match self {
            Self::HachiNi => VendorSignature::HACHI_NI,
            Self::Omx27 => VendorSignature::OMX_27,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

impl FromStr for DeviceFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "8x2" | "hachi-ni" | "hachini" => Ok(Self::HachiNi),
            "omx-27" | "omx27" | "omx" => Ok(Self::Omx27),
            other => Err(format!("unknown device family '{other}'")),
        }
    }
}

/// Identify the family a complete sysex frame came from.
///
/// Looks at the signature, the config sub-command and the model byte.
pub fn identify(frame: &[u8]) -> Option<DeviceFamily> {
    match frame {
        [SYSEX_START, a, b, c, command, model, ..]
            if [*a, *b, *c] == MANUFACTURER_ID
                && *command == crate::protocol::constants::CMD_CONFIG =>
        {
            DeviceFamily::from_model(*model)
        }
        _ => None,
    }
}

/// Identity block shared by both families' config dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub model_number: u8,
    pub model: DeviceFamily,
    /// Major version byte on its own.
    pub version_major: u8,
    /// `major.minor.patch`.
    pub firmware_version: String,
    pub eeprom_version: u8,
}

impl DeviceInfo {
    /// Decode the identity block. Only the EEPROM slot differs between families.
    fn decode(
        reader: &mut PayloadReader<'_>,
        expected: DeviceFamily,
        eeprom_offset: usize,
    ) -> Result<Self, DecodeError> {
        let model_number = reader.u8_at(OFFSET_MODEL)?;
        let model = DeviceFamily::from_model(model_number).ok_or(DecodeError::UnknownEnumValue {
            field: "model",
            value: model_number,
        })?;
        if model != expected {
            return Err(DecodeError::ModelMismatch {
                expected,
                actual: model,
            });
        }

        let version: [u8; VERSION_LEN] = reader.array_at(OFFSET_VERSION)?;

        Ok(Self {
            model_number,
            model,
            version_major: version[0],
            firmware_version: format!("{}.{}.{}", version[0], version[1], version[2]),
            eeprom_version: reader.u8_at(eeprom_offset)?,
        })
    }
}

// ============================================================================
// Payload access
// ============================================================================

/// Fixed-offset reader over a sysex payload.
///
/// The minimum length is checked once on construction, so individual reads
/// only fail if a layout table disagrees with its own length constant.
pub(crate) struct PayloadReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(payload: &'a [u8], min_len: usize) -> Result<Self, DecodeError> {
        if payload.len() < min_len {
            return Err(DecodeError::TooShort {
                expected: min_len,
                actual: payload.len(),
            });
        }
        Ok(Self {
            cursor: Cursor::new(payload),
        })
    }

    /// Check the sub-command byte.
    pub(crate) fn expect_command(&mut self, command: u8) -> Result<(), DecodeError> {
        match self.u8_at(OFFSET_COMMAND)? {
            c if c == command => Ok(()),
            other => Err(DecodeError::UnexpectedCommand(other)),
        }
    }

    pub(crate) fn u8_at(&mut self, offset: usize) -> Result<u8, DecodeError> {
        self.seek(offset);
        self.cursor.read_u8().map_err(|_| self.too_short(offset + 1))
    }

    pub(crate) fn array_at<const N: usize>(&mut self, offset: usize) -> Result<[u8; N], DecodeError> {
        self.seek(offset);
        let mut buf = [0u8; N];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.too_short(offset + N))?;
        Ok(buf)
    }

    pub(crate) fn bool_at(&mut self, offset: usize) -> Result<bool, DecodeError> {
        Ok(self.u8_at(offset)? != 0)
    }

    fn seek(&mut self, offset: usize) {
        self.cursor.set_position(offset as u64);
    }

    fn too_short(&self, expected: usize) -> DecodeError {
        DecodeError::TooShort {
            expected,
            actual: self.cursor.get_ref().len(),
        }
    }
}

/// Reject values that do not fit a MIDI data byte.
pub(crate) fn check_data(field: &'static str, values: &[u8]) -> Result<(), EncodeError> {
    match values.iter().find(|&&v| v > DATA_MAX) {
        Some(&value) => Err(EncodeError::ValueOutOfRange { field, value }),
        None => Ok(()),
    }
}

/// Reject received values that do not fit a MIDI data byte.
pub(crate) fn check_wire_data(field: &'static str, values: &[u8]) -> Result<(), DecodeError> {
    match values.iter().find(|&&v| v > DATA_MAX) {
        Some(&value) => Err(DecodeError::ValueOutOfRange { field, value }),
        None => Ok(()),
    }
}

/// Convert 0-indexed wire channels to 1-16.
pub(crate) fn channels_from_wire<const N: usize>(
    field: &'static str,
    wire: [u8; N],
) -> Result<[u8; N], DecodeError> {
    if let Some(&value) = wire.iter().find(|&&ch| ch > 15) {
        return Err(DecodeError::UnknownEnumValue { field, value });
    }
    Ok(wire.map(|ch| ch + 1))
}

/// Convert 1-16 channels to their 0-indexed wire form.
pub(crate) fn channels_to_wire(
    field: &'static str,
    channels: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    channels
        .iter()
        .map(|&ch| match ch {
            1..=16 => Ok(ch - 1),
            value => Err(EncodeError::ValueOutOfRange { field, value }),
        })
        .collect()
}

// ============================================================================
// Device profile
// ============================================================================

/// Family-specific behavior the session state machine delegates to.
///
/// Implemented by [`HachiNi`] and [`Omx27`]. The session itself is the same
/// for both families.
pub trait DeviceProfile: Send + Sync {
    /// Decoded config dump.
    type Config: Clone + fmt::Debug + PartialEq;
    /// Edit the user wants written to the device.
    type Edit: fmt::Debug;

    fn family(&self) -> DeviceFamily;

    fn signature(&self) -> VendorSignature {
        self.family().signature()
    }

    fn banks(&self) -> u8 {
        self.family().banks()
    }

    /// Width of the live value mirror.
    fn live_width(&self) -> usize;

    fn decode_config(&self, payload: &[u8]) -> Result<Self::Config, DecodeError>;

    fn info<'c>(&self, config: &'c Self::Config) -> &'c DeviceInfo;

    /// Bank the device reported as active in this dump.
    fn config_bank(&self, config: &Self::Config) -> Bank;

    /// Banks whose cache entries this dump replaces.
    fn covered_banks(&self, config: &Self::Config) -> Vec<Bank>;

    /// Frame that switches the device to `bank`. `channel` is 1-16.
    fn bank_select_frame(&self, bank: Bank, channel: u8) -> Vec<u8>;

    /// Wire bank byte if `message` is the device announcing a bank change.
    fn bank_echo(&self, message: &Message<'_>) -> Option<u8>;

    /// Index into the live value mirror for a Control Change, if any.
    fn live_index(
        &self,
        config: &Self::Config,
        bank: Bank,
        channel: u8,
        control: u8,
    ) -> Option<usize>;

    /// Width of the key mirror. Zero for families without a keyboard.
    fn key_width(&self) -> usize {
        0
    }

    /// Index into the key mirror for a note on `channel` (0-indexed wire).
    fn key_index(&self, _config: &Self::Config, _channel: u8, _key: u8) -> Option<usize> {
        None
    }

    /// Build the save frame. `cached` is the config for the current bank.
    fn encode_save(
        &self,
        cached: Option<&Self::Config>,
        edit: &Self::Edit,
    ) -> Result<Vec<u8>, EncodeError>;

    /// Bank to re-select after a save so the device echoes it back.
    fn reselect_after_save(&self, edit: &Self::Edit) -> Option<Bank>;
}
