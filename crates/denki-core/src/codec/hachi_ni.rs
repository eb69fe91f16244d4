//! 8x2 (hachi-ni) codec.
//!
//! The config dump carries one bank's mapping: 16 CC numbers and 16 MIDI
//! channels for each of the USB and TRS outputs.

use serde::Serialize;

use super::{
    Bank, DecodeError, DeviceFamily, DeviceInfo, DeviceProfile, EncodeError, PayloadReader,
    channels_from_wire, channels_to_wire, check_data, check_wire_data,
};
use crate::protocol::constants::hachi_ni::*;
use crate::protocol::constants::{
    CMD_CONFIG, CMD_HACHI_NI_SAVE, MANUFACTURER_ID, MODEL_HACHI_NI, PROGRAM_CHANGE, SYSEX_END,
    SYSEX_START,
};
use crate::protocol::Message;

/// CCs and channels for one output interface. Channels are 1-16.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceMapping {
    pub ccs: [u8; CONTROLS],
    pub channels: [u8; CONTROLS],
}

impl Default for InterfaceMapping {
    fn default() -> Self {
        Self {
            ccs: [0; CONTROLS],
            channels: [1; CONTROLS],
        }
    }
}

/// Mapping of one bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub usb: InterfaceMapping,
    pub trs: InterfaceMapping,
}

/// Decoded 8x2 config dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HachiNiConfig {
    pub info: DeviceInfo,
    pub bank: Bank,
    pub mapping: Mapping,
}

/// Write `mapping` into bank `bank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEdit {
    pub bank: Bank,
    pub mapping: Mapping,
}

fn decode_bank(reader: &mut PayloadReader<'_>) -> Result<Bank, DecodeError> {
    let wire = reader.u8_at(OFFSET_BANK)?;
    Bank::from_wire(wire, BANKS).ok_or(DecodeError::BankOutOfRange { wire, banks: BANKS })
}

fn decode_mapping(reader: &mut PayloadReader<'_>) -> Result<Mapping, DecodeError> {
    let usb_ccs: [u8; CONTROLS] = reader.array_at(OFFSET_USB_CCS)?;
    let trs_ccs: [u8; CONTROLS] = reader.array_at(OFFSET_TRS_CCS)?;
    check_wire_data("usb cc", &usb_ccs)?;
    check_wire_data("trs cc", &trs_ccs)?;

    Ok(Mapping {
        usb: InterfaceMapping {
            ccs: usb_ccs,
            channels: channels_from_wire("usb channel", reader.array_at(OFFSET_USB_CHANNELS)?)?,
        },
        trs: InterfaceMapping {
            ccs: trs_ccs,
            channels: channels_from_wire("trs channel", reader.array_at(OFFSET_TRS_CHANNELS)?)?,
        },
    })
}

/// Decode a config dump payload.
pub fn decode_config(payload: &[u8]) -> Result<HachiNiConfig, DecodeError> {
    let mut reader = PayloadReader::new(payload, CONFIG_LEN)?;
    reader.expect_command(CMD_CONFIG)?;

    Ok(HachiNiConfig {
        info: DeviceInfo::decode(&mut reader, DeviceFamily::HachiNi, OFFSET_EEPROM)?,
        bank: decode_bank(&mut reader)?,
        mapping: decode_mapping(&mut reader)?,
    })
}

/// Decode a save frame payload back into its bank and mapping.
pub fn decode_save(payload: &[u8]) -> Result<(Bank, Mapping), DecodeError> {
    let mut reader = PayloadReader::new(payload, CONFIG_LEN)?;
    reader.expect_command(CMD_HACHI_NI_SAVE)?;
    Ok((decode_bank(&mut reader)?, decode_mapping(&mut reader)?))
}

/// Encode the save frame writing `mapping` into `bank`.
///
/// The layout mirrors the config dump: version bytes and the settings block
/// are sent as zeros.
pub fn encode_save(mapping: &Mapping, bank: Bank) -> Result<Vec<u8>, EncodeError> {
    if bank.get() > BANKS {
        return Err(EncodeError::ValueOutOfRange {
            field: "bank",
            value: bank.get(),
        });
    }
    check_data("usb cc", &mapping.usb.ccs)?;
    check_data("trs cc", &mapping.trs.ccs)?;
    let usb_channels = channels_to_wire("usb channel", &mapping.usb.channels)?;
    let trs_channels = channels_to_wire("trs channel", &mapping.trs.channels)?;

    let mut frame = Vec::with_capacity(SAVE_FRAME_LEN);
    frame.push(SYSEX_START);
    frame.extend_from_slice(&MANUFACTURER_ID);
    frame.extend_from_slice(&[CMD_HACHI_NI_SAVE, MODEL_HACHI_NI, 0, 0, 0]);
    frame.push(bank.to_wire());
    frame.extend_from_slice(&[0; SETTINGS_LEN]);
    frame.extend_from_slice(&mapping.usb.ccs);
    frame.extend_from_slice(&mapping.trs.ccs);
    frame.extend_from_slice(&usb_channels);
    frame.extend_from_slice(&trs_channels);
    frame.push(SYSEX_END);

    debug_assert_eq!(frame.len(), SAVE_FRAME_LEN);
    Ok(frame)
}

/// 8x2 profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct HachiNi;

impl DeviceProfile for HachiNi {
    type Config = HachiNiConfig;
    type Edit = MappingEdit;

    fn family(&self) -> DeviceFamily {
        DeviceFamily::HachiNi
    }

    fn live_width(&self) -> usize {
        CONTROLS
    }

    fn decode_config(&self, payload: &[u8]) -> Result<HachiNiConfig, DecodeError> {
        decode_config(payload)
    }

    fn info<'c>(&self, config: &'c HachiNiConfig) -> &'c DeviceInfo {
        &config.info
    }

    fn config_bank(&self, config: &HachiNiConfig) -> Bank {
        config.bank
    }

    fn covered_banks(&self, config: &HachiNiConfig) -> Vec<Bank> {
        vec![config.bank]
    }

    fn bank_select_frame(&self, bank: Bank, channel: u8) -> Vec<u8> {
        vec![PROGRAM_CHANGE | (channel.saturating_sub(1) & 0x0F), bank.to_wire()]
    }

    fn bank_echo(&self, message: &Message<'_>) -> Option<u8> {
        match message {
            Message::BankChange { bank, .. } => Some(*bank),
            _ => None,
        }
    }

    /// Position of `control` among the bank's USB CCs, on any channel.
    fn live_index(
        &self,
        config: &HachiNiConfig,
        _bank: Bank,
        _channel: u8,
        control: u8,
    ) -> Option<usize> {
        config.mapping.usb.ccs.iter().position(|&cc| cc == control)
    }

    fn encode_save(
        &self,
        _cached: Option<&HachiNiConfig>,
        edit: &MappingEdit,
    ) -> Result<Vec<u8>, EncodeError> {
        encode_save(&edit.mapping, edit.bank)
    }

    fn reselect_after_save(&self, edit: &MappingEdit) -> Option<Bank> {
        Some(edit.bank)
    }
}
