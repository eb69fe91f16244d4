//! Protocol constants for the hachi-ni (8x2) and OMX-27 sysex dialect.
//!
//! Offsets were recovered from device dumps. Payload offsets are relative to
//! the first byte after the manufacturer id; add [`SIGNATURE_LEN`] for the
//! offset into the full frame.

// ============================================================================
// Framing
// ============================================================================

/// Sysex start of message.
pub const SYSEX_START: u8 = 0xF0;

/// Sysex end of message.
pub const SYSEX_END: u8 = 0xF7;

/// Status byte the OMX-27 sends when it saves on-device.
pub const OMX_SAVE_ACK_STATUS: u8 = 0xFC;

/// Non-commercial / educational manufacturer id.
pub const MANUFACTURER_ID: [u8; 3] = [0x7D, 0x00, 0x00];

/// Status byte plus manufacturer id.
pub const SIGNATURE_LEN: usize = 1 + MANUFACTURER_ID.len();

// ============================================================================
// Channel voice messages
// ============================================================================

/// Control Change, channel 1. Channel 16 is `0xBF`.
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Note Off, channel 1.
pub const NOTE_OFF: u8 = 0x80;

/// Note On, channel 1.
pub const NOTE_ON: u8 = 0x90;

/// Program Change, channel 1. Channel 16 is `0xCF`.
pub const PROGRAM_CHANGE: u8 = 0xC0;

/// Bank Select MSB controller, used by the OMX-27 for pot banks.
pub const CC_BANK_SELECT: u8 = 0;

/// Controller the OMX-27 sends when its pot bank changes on-device.
pub const CC_OMX_BANK_ECHO: u8 = 90;

// ============================================================================
// Sub-commands (first payload byte)
// ============================================================================

/// Identify / request config (host -> device).
pub const CMD_REQUEST_CONFIG: u8 = 0x1F;

/// Config dump (device -> host).
pub const CMD_CONFIG: u8 = 0x0F;

/// 8x2 save mapping (host -> device).
pub const CMD_HACHI_NI_SAVE: u8 = 0x0E;

/// OMX-27 save config (host -> device).
pub const CMD_OMX_SAVE: u8 = 0x0D;

/// Identify / request frame, identical for both families.
pub const REQUEST_CONFIG_FRAME: [u8; 6] = [
    SYSEX_START,
    MANUFACTURER_ID[0],
    MANUFACTURER_ID[1],
    MANUFACTURER_ID[2],
    CMD_REQUEST_CONFIG,
    SYSEX_END,
];

// ============================================================================
// Model numbers
// ============================================================================

pub const MODEL_OMX_27: u8 = 0x02;
pub const MODEL_HACHI_NI: u8 = 0x05;

// ============================================================================
// Shared header offsets
// ============================================================================

pub const OFFSET_COMMAND: usize = 0;
pub const OFFSET_MODEL: usize = 1;
/// Version major, minor, patch occupy three consecutive bytes.
pub const OFFSET_VERSION: usize = 2;
pub const VERSION_LEN: usize = 3;

// ============================================================================
// 8x2 layout
// ============================================================================

pub mod hachi_ni {
    /// Bank count exposed by the device.
    pub const BANKS: u8 = 8;
    /// Controls per interface.
    pub const CONTROLS: usize = 16;

    pub const OFFSET_BANK: usize = 5;
    pub const OFFSET_EEPROM: usize = 6;

    /// Device settings block. The save frame carries `SETTINGS_LEN` zero
    /// bytes starting at the EEPROM slot.
    pub const OFFSET_SETTINGS: usize = 6;
    pub const SETTINGS_LEN: usize = 15;

    pub const OFFSET_USB_CCS: usize = 21;
    pub const OFFSET_TRS_CCS: usize = 37;
    pub const OFFSET_USB_CHANNELS: usize = 53;
    pub const OFFSET_TRS_CHANNELS: usize = 69;

    /// Minimum config payload length.
    pub const CONFIG_LEN: usize = OFFSET_TRS_CHANNELS + CONTROLS;

    /// Full save frame length including framing.
    pub const SAVE_FRAME_LEN: usize = super::SIGNATURE_LEN + CONFIG_LEN + 1;
}

// ============================================================================
// OMX-27 layout
// ============================================================================

pub mod omx27 {
    /// Pot banks.
    pub const BANKS: u8 = 5;
    /// Pots per bank.
    pub const POTS_PER_BANK: usize = 5;
    /// Pot CCs across all banks.
    pub const POT_CCS: usize = POTS_PER_BANK * BANKS as usize;

    pub const OFFSET_EEPROM: usize = 5;
    pub const OFFSET_MODE: usize = 6;
    pub const OFFSET_PLAYING_PATTERN: usize = 7;
    pub const OFFSET_MIDI_CHANNEL: usize = 8;
    pub const OFFSET_POT_CCS: usize = 9;
    pub const OFFSET_MACRO_CHANNEL: usize = 34;
    pub const OFFSET_MACRO_MODE: usize = 35;
    pub const OFFSET_SCALE_ROOT: usize = 36;
    pub const OFFSET_SCALE_PATTERN: usize = 37;
    pub const OFFSET_SCALE_LOCK: usize = 38;
    pub const OFFSET_SCALE_GROUP: usize = 39;
    pub const OFFSET_DEFAULT_VELOCITY: usize = 40;
    pub const OFFSET_POT_BANK: usize = 43;

    /// Minimum config payload length.
    pub const CONFIG_LEN: usize = OFFSET_POT_BANK + 1;

    /// Scale pattern byte meaning "no scale".
    pub const SCALE_PATTERN_OFF: u8 = 127;

    /// Note numbers of the keyboard, first key inclusive, last exclusive.
    pub const KEY_FIRST: u8 = 59;
    pub const KEY_END: u8 = 85;
    /// Keys mirrored from note traffic.
    pub const KEYS: usize = (KEY_END - KEY_FIRST) as usize;

    // Save frame, payload offsets.
    pub const SAVE_OFFSET_EEPROM: usize = 1;
    pub const SAVE_OFFSET_MODE: usize = 2;
    pub const SAVE_OFFSET_PLAYING_PATTERN: usize = 3;
    pub const SAVE_OFFSET_MIDI_CHANNEL: usize = 4;
    pub const SAVE_OFFSET_POT_CCS: usize = 5;
    /// Trailing bytes of unknown purpose, always sent as zero.
    pub const SAVE_RESERVED_LEN: usize = 3;
    /// Save payload length (without framing).
    pub const SAVE_LEN: usize = SAVE_OFFSET_POT_CCS + POT_CCS + SAVE_RESERVED_LEN;
    /// Full save frame length including framing.
    pub const SAVE_FRAME_LEN: usize = super::SIGNATURE_LEN + SAVE_LEN + 1;
}

/// Highest value a MIDI data byte may carry.
pub const DATA_MAX: u8 = 0x7F;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_lengths() {
        assert_eq!(hachi_ni::CONFIG_LEN, 85);
        assert_eq!(hachi_ni::SAVE_FRAME_LEN, 90);
        assert_eq!(omx27::CONFIG_LEN, 44);
        assert_eq!(omx27::SAVE_FRAME_LEN, 38);
    }

    #[test]
    fn test_request_frame() {
        assert_eq!(REQUEST_CONFIG_FRAME, [0xF0, 0x7D, 0x00, 0x00, 0x1F, 0xF7]);
    }
}
