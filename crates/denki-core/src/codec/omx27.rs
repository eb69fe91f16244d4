//! OMX-27 codec.
//!
//! Config dump byte map (payload offsets):
//!
//! ```text
//!  0      0x0F config
//!  1      model (0x02)
//!  2..5   version major, minor, patch
//!  5      EEPROM version
//!  6      sequencer mode
//!  7      playing pattern
//!  8      MIDI channel (0-indexed)
//!  9..34  pot CCs, 5 banks x 5 pots
//!  34     MIDI macro channel (0-indexed)
//!  35     MIDI macro mode
//!  36     scale root
//!  37     scale pattern, 127 = off
//!  38     lock scale
//!  39     scale group 16
//!  40     default velocity
//!  43     active pot bank (0-indexed)
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use super::{
    Bank, DecodeError, DeviceFamily, DeviceInfo, DeviceProfile, EncodeError, PayloadReader,
    check_data,
};
use crate::protocol::Message;
use crate::protocol::constants::omx27::*;
use crate::protocol::constants::{
    CC_BANK_SELECT, CC_OMX_BANK_ECHO, CMD_CONFIG, CMD_OMX_SAVE, CONTROL_CHANGE, MANUFACTURER_ID,
    SYSEX_END, SYSEX_START,
};

/// Single-byte enumerations. Serialized by display name.
macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident = $value:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_byte(value: u8) -> Result<Self, DecodeError> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(DecodeError::UnknownEnumValue { field: $field, value }),
                }
            }

            pub fn to_byte(self) -> u8 {
                self as u8
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }
    };
}

byte_enum! {
    /// Sequencer / device mode.
    SequencerMode, "mode" {
        Midi = 0 => "MIDI",
        Drum = 1 => "Drum",
        Chords = 2 => "Chords",
        S1 = 3 => "S1",
        S2 = 4 => "S2",
        Grids = 5 => "Grids",
        Euclid = 6 => "Euclid",
        Om = 7 => "OM",
    }
}

byte_enum! {
    /// MIDI macro target.
    MacroMode, "macro mode" {
        Off = 0 => "Off",
        M8 = 1 => "M8",
        Norns = 2 => "Norns",
        Deluge = 3 => "Deluge",
    }
}

byte_enum! {
    ScaleRoot, "scale root" {
        C = 0 => "C",
        CSharp = 1 => "C#",
        D = 2 => "D",
        DSharp = 3 => "D#",
        E = 4 => "E",
        F = 5 => "F",
        FSharp = 6 => "F#",
        G = 7 => "G",
        GSharp = 8 => "G#",
        A = 9 => "A",
        ASharp = 10 => "A#",
        B = 11 => "B",
    }
}

byte_enum! {
    /// Scale pattern. `Off` is the device's "no scale" sentinel, not an index.
    ScalePattern, "scale pattern" {
        Major = 0 => "major",
        Dorian = 1 => "dorian",
        Phrygian = 2 => "phrygian",
        Lydian = 3 => "lydian",
        Mixolydian = 4 => "mixolydian",
        Minor = 5 => "minor",
        Locrian = 6 => "locrian",
        MelodicMinor = 7 => "mel minor",
        DorianFlat2 = 8 => "dorian b2",
        LydianSharp5 = 9 => "lydian #5",
        LydianFlat7 = 10 => "lydian b7",
        MixolydianFlat6 = 11 => "mixo b6",
        HalfDiminished = 12 => "half-dim",
        Altered = 13 => "altered",
        HarmonicMinor = 14 => "harm minor",
        Locrian6 = 15 => "locrian 6",
        IonianSharp5 = 16 => "ionian #5",
        DorianSharp4 = 17 => "dorian #4",
        PhrygianDominant = 18 => "phrygian dom",
        LydianSharp2 = 19 => "lydian #2",
        SuperLocrianDoubleFlat7 = 20 => "sup loc bb7",
        DoubleHarmonicMajor = 21 => "dbl harm.maj",
        LydianSharp2Sharp6 = 22 => "lydian #2#6",
        Ultraphrygian = 23 => "ultraphrygian",
        Hungarian = 24 => "hungarian",
        Oriental = 25 => "oriental",
        IonianSharp2Sharp5 = 26 => "ionian #2#5",
        LocrianDoubleFlat3DoubleFlat7 = 27 => "loc bb3bb7",
        BluesMajor = 28 => "blues maj",
        BluesMinor = 29 => "blues min",
        PentatonicMajor = 30 => "penta maj",
        PentatonicMinor = 31 => "penta min",
        InSen = 32 => "in sen",
        Iwato = 33 => "iwato",
        Yo = 34 => "yo",
        Hirajoshi = 35 => "hirajoshi",
        Egyptian = 36 => "egyptian",
        Off = 127 => "off",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequencerInfo {
    pub mode: SequencerMode,
    pub playing_pattern: u8,
}

/// MIDI settings. Channels are 1-16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MidiInfo {
    pub channel: u8,
    pub default_velocity: u8,
    pub macro_channel: u8,
    pub macro_mode: MacroMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleInfo {
    pub root: ScaleRoot,
    pub pattern: ScalePattern,
    pub lock: bool,
    pub group16: bool,
}

/// Pot CCs for every bank plus the bank the device has active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PotentiometerBank {
    pub ccs: [u8; POT_CCS],
    pub bank: Bank,
}

impl PotentiometerBank {
    /// Offset of `bank`'s window into the flat CC array, `None` past the
    /// last pot bank.
    pub fn offset(bank: Bank) -> Option<usize> {
        (bank.get() <= BANKS).then(|| POTS_PER_BANK * bank.to_wire() as usize)
    }

    pub fn window(&self, bank: Bank) -> Option<&[u8]> {
        let offset = Self::offset(bank)?;
        Some(&self.ccs[offset..offset + POTS_PER_BANK])
    }

    /// CCs of the active bank.
    pub fn active_ccs(&self) -> &[u8] {
        self.window(self.bank).unwrap_or_default()
    }
}

/// Decoded OMX-27 config dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omx27Config {
    pub info: DeviceInfo,
    pub sequencer: SequencerInfo,
    pub midi: MidiInfo,
    pub potentiometers: PotentiometerBank,
    pub scale: ScaleInfo,
}

/// Fields carried by the save frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Omx27Save {
    pub eeprom_version: u8,
    pub mode: SequencerMode,
    pub playing_pattern: u8,
    /// 1-16.
    pub midi_channel: u8,
    pub pot_ccs: [u8; POT_CCS],
}

impl Omx27Save {
    pub fn from_config(config: &Omx27Config) -> Self {
        Self {
            eeprom_version: config.info.eeprom_version,
            mode: config.sequencer.mode,
            playing_pattern: config.sequencer.playing_pattern,
            midi_channel: config.midi.channel,
            pot_ccs: config.potentiometers.ccs,
        }
    }

    /// Replace `bank`'s pot CCs.
    pub fn with_pot_bank(
        mut self,
        bank: Bank,
        ccs: [u8; POTS_PER_BANK],
    ) -> Result<Self, EncodeError> {
        let offset = PotentiometerBank::offset(bank).ok_or(EncodeError::ValueOutOfRange {
            field: "bank",
            value: bank.get(),
        })?;
        self.pot_ccs[offset..offset + POTS_PER_BANK].copy_from_slice(&ccs);
        Ok(self)
    }
}

/// Write `ccs` into pot bank `bank`, keeping everything else as last dumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotBankEdit {
    pub bank: Bank,
    pub ccs: [u8; POTS_PER_BANK],
}

fn channel_at(
    reader: &mut PayloadReader<'_>,
    offset: usize,
    field: &'static str,
) -> Result<u8, DecodeError> {
    match reader.u8_at(offset)? {
        wire @ 0..=15 => Ok(wire + 1),
        value => Err(DecodeError::UnknownEnumValue { field, value }),
    }
}

/// Decode a config dump payload.
pub fn decode_config(payload: &[u8]) -> Result<Omx27Config, DecodeError> {
    let mut reader = PayloadReader::new(payload, CONFIG_LEN)?;
    reader.expect_command(CMD_CONFIG)?;

    let info = DeviceInfo::decode(&mut reader, DeviceFamily::Omx27, OFFSET_EEPROM)?;

    let sequencer = SequencerInfo {
        mode: SequencerMode::from_byte(reader.u8_at(OFFSET_MODE)?)?,
        playing_pattern: reader.u8_at(OFFSET_PLAYING_PATTERN)?,
    };

    let midi = MidiInfo {
        channel: channel_at(&mut reader, OFFSET_MIDI_CHANNEL, "midi channel")?,
        default_velocity: reader.u8_at(OFFSET_DEFAULT_VELOCITY)?,
        macro_channel: channel_at(&mut reader, OFFSET_MACRO_CHANNEL, "macro channel")?,
        macro_mode: MacroMode::from_byte(reader.u8_at(OFFSET_MACRO_MODE)?)?,
    };

    let wire_bank = reader.u8_at(OFFSET_POT_BANK)?;
    let potentiometers = PotentiometerBank {
        ccs: reader.array_at(OFFSET_POT_CCS)?,
        bank: Bank::from_wire(wire_bank, BANKS).ok_or(DecodeError::BankOutOfRange {
            wire: wire_bank,
            banks: BANKS,
        })?,
    };

    let scale = ScaleInfo {
        root: ScaleRoot::from_byte(reader.u8_at(OFFSET_SCALE_ROOT)?)?,
        pattern: ScalePattern::from_byte(reader.u8_at(OFFSET_SCALE_PATTERN)?)?,
        lock: reader.bool_at(OFFSET_SCALE_LOCK)?,
        group16: reader.bool_at(OFFSET_SCALE_GROUP)?,
    };

    Ok(Omx27Config {
        info,
        sequencer,
        midi,
        potentiometers,
        scale,
    })
}

/// Decode a save frame payload.
pub fn decode_save(payload: &[u8]) -> Result<Omx27Save, DecodeError> {
    let mut reader = PayloadReader::new(payload, SAVE_LEN)?;
    reader.expect_command(CMD_OMX_SAVE)?;

    Ok(Omx27Save {
        eeprom_version: reader.u8_at(SAVE_OFFSET_EEPROM)?,
        mode: SequencerMode::from_byte(reader.u8_at(SAVE_OFFSET_MODE)?)?,
        playing_pattern: reader.u8_at(SAVE_OFFSET_PLAYING_PATTERN)?,
        midi_channel: channel_at(&mut reader, SAVE_OFFSET_MIDI_CHANNEL, "midi channel")?,
        pot_ccs: reader.array_at(SAVE_OFFSET_POT_CCS)?,
    })
}

/// Encode the save frame.
pub fn encode_save(save: &Omx27Save) -> Result<Vec<u8>, EncodeError> {
    check_data("eeprom version", &[save.eeprom_version])?;
    check_data("playing pattern", &[save.playing_pattern])?;
    check_data("pot cc", &save.pot_ccs)?;
    if !(1..=16).contains(&save.midi_channel) {
        return Err(EncodeError::ValueOutOfRange {
            field: "midi channel",
            value: save.midi_channel,
        });
    }

    let mut frame = Vec::with_capacity(SAVE_FRAME_LEN);
    frame.push(SYSEX_START);
    frame.extend_from_slice(&MANUFACTURER_ID);
    frame.push(CMD_OMX_SAVE);
    frame.push(save.eeprom_version);
    frame.push(save.mode.to_byte());
    frame.push(save.playing_pattern);
    frame.push(save.midi_channel - 1);
    frame.extend_from_slice(&save.pot_ccs);
    // Purpose unknown; the device expects them present.
    frame.extend_from_slice(&[0; SAVE_RESERVED_LEN]);
    frame.push(SYSEX_END);

    debug_assert_eq!(frame.len(), SAVE_FRAME_LEN);
    Ok(frame)
}

/// OMX-27 profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct Omx27;

impl DeviceProfile for Omx27 {
    type Config = Omx27Config;
    type Edit = PotBankEdit;

    fn family(&self) -> DeviceFamily {
        DeviceFamily::Omx27
    }

    fn live_width(&self) -> usize {
        POT_CCS
    }

    fn decode_config(&self, payload: &[u8]) -> Result<Omx27Config, DecodeError> {
        decode_config(payload)
    }

    fn info<'c>(&self, config: &'c Omx27Config) -> &'c DeviceInfo {
        &config.info
    }

    fn config_bank(&self, config: &Omx27Config) -> Bank {
        config.potentiometers.bank
    }

    /// A dump carries the CCs of every pot bank.
    fn covered_banks(&self, _config: &Omx27Config) -> Vec<Bank> {
        Bank::all(BANKS).collect()
    }

    fn bank_select_frame(&self, bank: Bank, channel: u8) -> Vec<u8> {
        vec![
            CONTROL_CHANGE | (channel.saturating_sub(1) & 0x0F),
            CC_BANK_SELECT,
            bank.to_wire(),
        ]
    }

    /// CC 90 on any channel: the MIDI channel can change on-device without
    /// a dump, so the echo is not filtered by channel.
    fn bank_echo(&self, message: &Message<'_>) -> Option<u8> {
        match message {
            Message::ControlChange {
                control: CC_OMX_BANK_ECHO,
                value,
                ..
            } => Some(*value),
            _ => None,
        }
    }

    fn live_index(
        &self,
        config: &Omx27Config,
        bank: Bank,
        channel: u8,
        control: u8,
    ) -> Option<usize> {
        if channel.wrapping_add(1) != config.midi.channel || control == CC_OMX_BANK_ECHO {
            return None;
        }
        let offset = PotentiometerBank::offset(bank)?;
        config
            .potentiometers
            .window(bank)?
            .iter()
            .position(|&cc| cc == control)
            .map(|i| offset + i)
    }

    fn key_width(&self) -> usize {
        KEYS
    }

    /// Keys 59-84 on the dump's MIDI channel.
    fn key_index(&self, config: &Omx27Config, channel: u8, key: u8) -> Option<usize> {
        if channel.wrapping_add(1) != config.midi.channel || !(KEY_FIRST..KEY_END).contains(&key) {
            return None;
        }
        Some(usize::from(key - KEY_FIRST))
    }

    fn encode_save(
        &self,
        cached: Option<&Omx27Config>,
        edit: &PotBankEdit,
    ) -> Result<Vec<u8>, EncodeError> {
        let config = cached.ok_or(EncodeError::NoCachedConfig)?;
        encode_save(&Omx27Save::from_config(config).with_pot_bank(edit.bank, edit.ccs)?)
    }

    /// The device acknowledges a save with its own echo.
    fn reselect_after_save(&self, _edit: &PotBankEdit) -> Option<Bank> {
        None
    }
}
