//! Channel voice handlers: bank echoes, live potentiometer values and keys.

use anyhow::Result;
use tracing::{debug, trace, warn};

use super::{HandleResult, HandlerContext};
use crate::codec::{Bank, DeviceProfile};
use crate::events::{LogLevel, SessionEvent, SessionObserver};
use crate::transport::MidiTransport;

/// Device switched bank on its own or confirmed a bank select.
///
/// Only the current bank moves. A dump for the new bank arrives when the
/// host asks for it.
pub(super) fn handle_bank_echo<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    ctx: &mut HandlerContext<'_, P, T, O>,
    wire: u8,
) -> Result<HandleResult> {
    let banks = ctx.profile.banks();
    let Some(bank) = Bank::from_wire(wire, banks) else {
        warn!(wire = wire, banks = banks, "Bank echo out of range");
        ctx.log(
            LogLevel::Warn,
            format!("Ignoring bank echo {wire}, device has {banks} banks"),
        );
        return Ok(HandleResult::Ignored);
    };

    debug!(bank = %bank, "Bank echo");
    ctx.state.current_bank = bank;
    ctx.emit(SessionEvent::BankChanged { bank });
    Ok(HandleResult::BankChanged { bank })
}

/// Control Change: mirror the value if it maps onto a potentiometer.
pub(super) fn handle_control_change<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    ctx: &mut HandlerContext<'_, P, T, O>,
    channel: u8,
    control: u8,
    value: u8,
) -> Result<HandleResult> {
    let bank = ctx.state.current_bank;
    let Some(config) = ctx.state.cache.get(&bank) else {
        trace!(control = control, "No cached config, dropping CC");
        return Ok(HandleResult::Ignored);
    };

    let Some(index) = ctx.profile.live_index(config, bank, channel, control) else {
        return Ok(HandleResult::Ignored);
    };

    match ctx.state.live_values.get_mut(index) {
        Some(slot) => *slot = value,
        None => return Ok(HandleResult::Ignored),
    }

    ctx.emit(SessionEvent::LiveValueChanged { index, value });
    Ok(HandleResult::LiveValue { index, value })
}

/// Note On/Off: mirror the key if it is on the device's keyboard.
pub(super) fn handle_key<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    ctx: &mut HandlerContext<'_, P, T, O>,
    channel: u8,
    key: u8,
    pressed: bool,
) -> Result<HandleResult> {
    let Some(config) = ctx.state.cache.get(&ctx.state.current_bank) else {
        trace!(key = key, "No cached config, dropping note");
        return Ok(HandleResult::Ignored);
    };

    let Some(index) = ctx.profile.key_index(config, channel, key) else {
        return Ok(HandleResult::Ignored);
    };

    match ctx.state.keys.get_mut(index) {
        Some(slot) => *slot = pressed,
        None => return Ok(HandleResult::Ignored),
    }

    ctx.emit(SessionEvent::KeyChanged { key, pressed });
    Ok(HandleResult::KeyChanged { key, pressed })
}
