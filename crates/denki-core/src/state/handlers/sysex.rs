//! Sysex handlers: config dumps and save acknowledgements.

use anyhow::Result;
use tracing::{info, warn};

use super::{HandleResult, HandlerContext, request_config};
use crate::codec::DeviceProfile;
use crate::events::{SessionEvent, SessionObserver};
use crate::protocol::format_hex;
use crate::state::machine::LinkState;
use crate::transport::MidiTransport;

/// Config dump or save acknowledgement.
///
/// An empty payload means the device acknowledged without data, so the
/// config is asked for again. Otherwise the payload replaces every cache
/// entry it covers.
pub(super) fn handle_dump<P: DeviceProfile, T: MidiTransport, O: SessionObserver>(
    ctx: &mut HandlerContext<'_, P, T, O>,
    payload: &[u8],
) -> Result<HandleResult> {
    if payload.is_empty() {
        info!("Empty sysex, requesting config again");
        return request_config(ctx);
    }

    let config = match ctx.profile.decode_config(payload) {
        Ok(config) => config,
        Err(error) => {
            warn!(error = %error, bytes = %format_hex(payload), "Config decode failed");
            ctx.emit(SessionEvent::DecodeFailed {
                error: error.clone(),
            });
            return Ok(HandleResult::DecodeFailed(error));
        }
    };

    let bank = ctx.profile.config_bank(&config);
    let banks = ctx.profile.covered_banks(&config);
    let device_info = ctx.profile.info(&config).clone();

    for covered in &banks {
        ctx.state.cache.insert(*covered, config.clone());
    }
    ctx.state.info = Some(device_info.clone());

    let bank_moved = ctx.state.current_bank != bank;
    ctx.state.current_bank = bank;

    info!(
        model = %device_info.model,
        version = %device_info.firmware_version,
        bank = %bank,
        "Config received"
    );
    ctx.emit(SessionEvent::ConfigCached {
        banks,
        info: device_info,
    });
    if bank_moved {
        ctx.emit(SessionEvent::BankChanged { bank });
    }

    if ctx.state.ports_open() {
        ctx.goto_link(LinkState::Connected);
    }

    Ok(HandleResult::ConfigCached { bank })
}
