//! Message protocol between the radio and its remote peers.
//!
//! Inbound: one JSON object per message, `{"id": "...", "value": "..."}`.
//! Outbound: ASCII fields separated by `0x04`, e.g. `STATUS\x0489.1\x041\x047`.
//! Uses `heapless` types for no_std/no-alloc operation.

use core::fmt;

use heapless::{String, Vec};
use serde::Deserialize;

use crate::codec::Frequency;

/// Field separator in outbound messages
pub const FIELD_SEP: char = '\x04';

/// Largest inbound message accepted from a peer
pub const MAX_INBOUND_LEN: usize = 512;

/// Largest rendered outbound message
pub const MAX_OUTBOUND_LEN: usize = 64;

/// Longest command value kept (frequencies are short)
pub const MAX_VALUE_LEN: usize = 16;

/// Raw inbound message bytes
pub type InboundFrame = Vec<u8, MAX_INBOUND_LEN>;

/// Rendered outbound message
pub type MsgBuffer = String<MAX_OUTBOUND_LEN>;

/// Command value as received
pub type ValueString = String<MAX_VALUE_LEN>;

/// Commands sent from a remote peer to the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Peer connected: replay color and presets
    Init,
    SearchUp,
    SearchDown,
    /// Store the value as a preset and as the last-tuned frequency
    Preset(ValueString),
    /// Tune directly, no search
    Jump(ValueString),
    /// Persist the value as the last-tuned frequency without retuning
    Write(ValueString),
    /// Advance the display color
    ColorCycle,
}

impl Command {
    pub fn id(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::SearchUp => "searchup-request",
            Command::SearchDown => "searchdown-request",
            Command::Preset(_) => "preset-request",
            Command::Jump(_) => "jump-request",
            Command::Write(_) => "write-request",
            Command::ColorCycle => "color-request",
        }
    }
}

/// Wire format for inbound commands. A flat struct, since `serde_json_core`
/// cannot deserialize tagged enums. Converted to [`Command`] with `TryFrom`.
#[derive(Debug, Deserialize)]
pub struct RawCommand {
    pub id: String<24>,
    #[serde(default)]
    pub value: Option<ValueString>,
}

/// Why an inbound message was discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Not a JSON object with a string `id`
    Malformed,
    UnknownId(String<24>),
    /// A value-carrying command arrived without `value`
    MissingValue(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed => f.write_str("malformed command"),
            CommandError::UnknownId(id) => write!(f, "unknown command id '{}'", id),
            CommandError::MissingValue(id) => write!(f, "{} without value", id),
        }
    }
}

impl TryFrom<RawCommand> for Command {
    type Error = CommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        let with_value = |id: &'static str, value: Option<ValueString>| {
            value.ok_or(CommandError::MissingValue(id))
        };
        match raw.id.as_str() {
            "init" => Ok(Command::Init),
            "searchup-request" => Ok(Command::SearchUp),
            "searchdown-request" => Ok(Command::SearchDown),
            "preset-request" => with_value("preset-request", raw.value).map(Command::Preset),
            "jump-request" => with_value("jump-request", raw.value).map(Command::Jump),
            "write-request" => with_value("write-request", raw.value).map(Command::Write),
            "color-request" => Ok(Command::ColorCycle),
            _ => Err(CommandError::UnknownId(raw.id)),
        }
    }
}

/// Messages sent from the radio to every connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMessage<'a> {
    /// Periodic tuner status
    Status {
        frequency: Frequency,
        stereo: bool,
        /// ADC level 0-15
        level: u8,
    },
    /// Display color index 1-6
    Color(i16),
    /// Echo of an accepted preset request, value as the peer sent it
    Preset(&'a str),
    /// One stored preset, replayed on `init`
    PresetEntry {
        /// Tenths of MHz
        tenths: i16,
        /// Equals the last-tuned frequency
        current: bool,
    },
}

impl fmt::Display for DeviceMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = FIELD_SEP;
        match self {
            DeviceMessage::Status {
                frequency,
                stereo,
                level,
            } => write!(f, "STATUS{sep}{frequency}{sep}{}{sep}{level}", u8::from(*stereo)),
            DeviceMessage::Color(index) => write!(f, "COLOR{sep}{index}"),
            DeviceMessage::Preset(value) => write!(f, "PRESET{sep}{value}"),
            DeviceMessage::PresetEntry { tenths, current } => {
                write!(f, "PRESET*10{sep}{tenths}{sep}{}", u8::from(*current))
            }
        }
    }
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
