//! Command dispatch: applies one inbound [`Command`] to the radio context.
//!
//! Every outcome is side effects only. Broadcasts go to the [`Outbox`],
//! persistence to the [`Store`], tuning through the [`Tuner`]. Failures are
//! logged and never reported back to the peer.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::codec::{Frequency, SearchDirection};
use crate::comm::{send, Outbox};
use crate::control::RadioContext;
use crate::protocol::{Command, DeviceMessage};
use crate::storage::{self, Store, KEY_PRESET_FREQ, KEY_SEGMENT_COLOR};
use crate::tuner::Tuner;

/// Process a received command and update state accordingly.
pub fn handle_command<I2C, D, S, O>(
    cmd: Command,
    ctx: &mut RadioContext,
    tuner: &mut Tuner<I2C, D>,
    store: &mut S,
    outbox: &mut O,
) where
    I2C: I2c,
    D: DelayNs,
    S: Store,
    O: Outbox + ?Sized,
{
    log::debug!("command: {}", cmd.id());
    match cmd {
        Command::Init => {
            send(outbox, &DeviceMessage::Color(ctx.settings.color));
            for tenths in ctx.presets.iter() {
                send(
                    outbox,
                    &DeviceMessage::PresetEntry {
                        tenths,
                        current: tenths == ctx.settings.last_tuned,
                    },
                );
            }
        }
        Command::SearchUp => start_search(ctx, tuner, SearchDirection::Up),
        Command::SearchDown => start_search(ctx, tuner, SearchDirection::Down),
        Command::Preset(value) => {
            if !ctx.presets.has_room() {
                log::warn!("preset list full ({} entries), ignoring {}", ctx.presets.len(), value);
                return;
            }
            send(outbox, &DeviceMessage::Preset(&value));
            let Some(freq) = parse_value("preset-request", &value) else {
                return;
            };
            ctx.presets.try_push(freq);
            ctx.presets.save(store);
            remember_last_tuned(ctx, store, freq);
        }
        Command::Jump(value) => {
            let Some(freq) = parse_value("jump-request", &value) else {
                return;
            };
            // Failure already logged by the tuner
            let _ = tuner.set_frequency(&mut ctx.radio, freq);
        }
        Command::Write(value) => {
            if let Some(freq) = parse_value("write-request", &value) {
                remember_last_tuned(ctx, store, freq);
            }
        }
        Command::ColorCycle => {
            let color = ctx.settings.cycle_color();
            send(outbox, &DeviceMessage::Color(color));
            storage::write_i16(store, KEY_SEGMENT_COLOR, color);
        }
    }
}

fn start_search<I2C: I2c, D: DelayNs>(
    ctx: &mut RadioContext,
    tuner: &mut Tuner<I2C, D>,
    direction: SearchDirection,
) {
    if let Err(e) = ctx.search.start(tuner, &mut ctx.radio, direction) {
        log::warn!("search {} not started: {}", direction.as_str(), e);
    }
}

fn remember_last_tuned<S: Store>(ctx: &mut RadioContext, store: &mut S, freq: Frequency) {
    ctx.settings.last_tuned = freq.tenths();
    storage::write_i16(store, KEY_PRESET_FREQ, ctx.settings.last_tuned);
}

fn parse_value(id: &str, value: &str) -> Option<Frequency> {
    match Frequency::parse_mhz(value) {
        Ok(freq) => Some(freq),
        Err(e) => {
            log::warn!("{}: bad value '{}': {}", id, value, e);
            None
        }
    }
}
