//! TEA5767 register codec.
//!
//! The chip has no addressable registers: every write is a 5-byte frame that
//! reprograms the whole device, and every read returns a 5-byte status frame.
//! This module holds the bit layout and the divider arithmetic. All functions
//! are pure; bus access lives in [`crate::tuner`].

use core::fmt;

// ── Write frame bits ─────────────────────────────────────────────────

// byte 0 (bits 0-5: divider high bits)
const W0_MUTE: u8 = 0x80;
const W0_SEARCH: u8 = 0x40;

// byte 2
const W2_SEARCH_UP: u8 = 0x80;
const W2_HIGH_SIDE: u8 = 0x10;
const W2_MONO: u8 = 0x08;
const W2_MUTE_RIGHT: u8 = 0x04;
const W2_MUTE_LEFT: u8 = 0x02;
const W2_PORT1: u8 = 0x01;

// byte 3
const W3_PORT2: u8 = 0x80;
const W3_STANDBY: u8 = 0x40;
const W3_JAPAN_BAND: u8 = 0x20;
const W3_XTAL_32768: u8 = 0x10;
const W3_SOFT_MUTE: u8 = 0x08;
const W3_HIGH_CUT: u8 = 0x04;
const W3_STEREO_NOISE: u8 = 0x02;
const W3_SEARCH_INDICATOR: u8 = 0x01;

// byte 4
const W4_PLLREF: u8 = 0x80;
const W4_DEEMPH_75: u8 = 0x40;

// ── Read frame bits ──────────────────────────────────────────────────

const R0_READY: u8 = 0x80;
const R0_BAND_LIMIT: u8 = 0x40;
const R2_STEREO: u8 = 0x80;
const R2_IF_COUNTER: u8 = 0x7F;
const R3_LEVEL: u8 = 0xF0;
const R3_CHIP_ID: u8 = 0x0F;

/// Size of both the write and the read frame
pub const FRAME_LEN: usize = 5;

/// Largest divider the 14-bit PLL word can hold
pub const DIVIDER_MAX: u16 = 0x3FFF;

/// Intermediate frequency offset applied by the injection side (kHz)
pub const IF_KHZ: u32 = 225;

/// Reference clock (32.768 kHz crystal), in Hz
const REF_HZ: u32 = 32_768;

/// One divider step is `REF_HZ / 4` Hz
const HZ_PER_DIVIDER_STEP: u32 = REF_HZ / 4;

/// A tuner frequency, stored in kHz.
///
/// Remote peers and the persisted keys speak tenths of MHz; the divider
/// math works in Hz. kHz keeps both conversions exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Frequency(u32);

impl Frequency {
    pub const fn from_khz(khz: u32) -> Self {
        Self(khz)
    }

    /// From a tenths-of-MHz value as stored in `preset_freq` / `preset_list`.
    /// Non-positive values have no meaning and return `None`.
    pub fn from_tenths(tenths: i16) -> Option<Self> {
        if tenths > 0 {
            Some(Self(tenths as u32 * 100))
        } else {
            None
        }
    }

    /// Round a frequency in Hz to the nearest 0.1 MHz.
    pub const fn from_hz_rounded(hz: u32) -> Self {
        Self((hz + 50_000) / 100_000 * 100)
    }

    /// Parse a MHz value sent by a remote peer ("89.1", " 101.5 ").
    pub fn parse_mhz(text: &str) -> Result<Self, ValueError> {
        let mhz: f32 = text.trim().parse().map_err(|_| ValueError::NotANumber)?;
        if !mhz.is_finite() || mhz <= 0.0 || mhz > 1_000.0 {
            return Err(ValueError::OutOfRange);
        }
        Ok(Self((mhz * 1000.0 + 0.5) as u32))
    }

    pub const fn khz(self) -> u32 {
        self.0
    }

    /// Tenths of MHz, rounded, as persisted.
    pub fn tenths(self) -> i16 {
        ((self.0 + 50) / 100).min(i16::MAX as u32) as i16
    }

    /// Shift by a signed kHz amount, saturating at zero.
    pub fn offset(self, khz: i32) -> Self {
        Self(self.0.saturating_add_signed(khz))
    }
}

impl fmt::Display for Frequency {
    /// MHz with one decimal, e.g. `89.1`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenths = self.tenths();
        write!(f, "{}.{}", tenths / 10, tenths % 10)
    }
}

/// Why a command value could not be turned into a frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    NotANumber,
    OutOfRange,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::NotANumber => f.write_str("not a number"),
            ValueError::OutOfRange => f.write_str("out of range"),
        }
    }
}

/// FM band limits selectable on the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// 87.5 - 108.0 MHz
    UsEurope,
    /// 76.0 - 91.0 MHz
    Japan,
}

impl Band {
    pub const fn min(self) -> Frequency {
        match self {
            Band::UsEurope => Frequency::from_khz(87_500),
            Band::Japan => Frequency::from_khz(76_000),
        }
    }

    pub const fn max(self) -> Frequency {
        match self {
            Band::UsEurope => Frequency::from_khz(108_000),
            Band::Japan => Frequency::from_khz(91_000),
        }
    }

    pub fn contains(self, freq: Frequency) -> bool {
        freq >= self.min() && freq <= self.max()
    }

    pub fn clamp(self, freq: Frequency) -> Frequency {
        freq.max(self.min()).min(self.max())
    }
}

/// Local oscillator injection side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionSide {
    /// LO above the station: `div = 4 * (f + IF) / fref`
    High,
    /// LO below the station: `div = 4 * (f - IF) / fref`
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Up,
    Down,
}

impl SearchDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDirection::Up => "up",
            SearchDirection::Down => "down",
        }
    }
}

/// ADC level at which an autoscan stops on a station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLevel {
    /// ADC output 5
    Low,
    /// ADC output 7
    Mid,
    /// ADC output 10
    High,
}

impl SearchLevel {
    const fn bits(self) -> u8 {
        match self {
            SearchLevel::Low => 0x20,
            SearchLevel::Mid => 0x40,
            SearchLevel::High => 0x60,
        }
    }
}

/// Static chip configuration, written with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunerConfig {
    /// Software port 1 output level
    pub port1: bool,
    /// Software port 2 output level
    pub port2: bool,
    pub high_cut: bool,
    pub stereo_noise_cancel: bool,
    pub soft_mute: bool,
    pub band: Band,
    /// 32.768 kHz crystal reference (otherwise 13 MHz)
    pub xtal_32768: bool,
    /// 6.5 MHz PLL reference enable
    pub pll_ref: bool,
    /// 75 us de-emphasis (otherwise 50 us)
    pub deemphasis_75us: bool,
    /// Port 1 shows the search/ready state instead of `port1`
    pub search_indicator: bool,
}

impl TunerConfig {
    pub const fn new(band: Band) -> Self {
        Self {
            port1: true,
            port2: true,
            high_cut: true,
            stereo_noise_cancel: true,
            soft_mute: true,
            band,
            xtal_32768: true,
            pll_ref: false,
            deemphasis_75us: false,
            search_indicator: false,
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self::new(Band::UsEurope)
    }
}

/// Per-write fields that are not part of the static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteFrame {
    pub divider: u16,
    pub injection: InjectionSide,
    /// Start an autoscan in the given direction, stopping at the given level
    pub search: Option<(SearchDirection, SearchLevel)>,
    pub mute: bool,
    pub mono: bool,
    pub mute_left: bool,
    pub mute_right: bool,
    pub standby: bool,
}

impl WriteFrame {
    pub const fn tune(injection: InjectionSide, divider: u16) -> Self {
        Self {
            divider,
            injection,
            search: None,
            mute: false,
            mono: false,
            mute_left: false,
            mute_right: false,
            standby: false,
        }
    }
}

/// Encode a full write frame.
pub fn encode(config: &TunerConfig, frame: &WriteFrame) -> [u8; FRAME_LEN] {
    let divider = frame.divider.min(DIVIDER_MAX);
    let mut buf = [0u8; FRAME_LEN];

    buf[0] = (divider >> 8) as u8 & 0x3F;
    buf[1] = divider as u8;

    if frame.mute {
        buf[0] |= W0_MUTE;
    }
    if let Some((direction, level)) = frame.search {
        buf[0] |= W0_SEARCH;
        buf[2] |= level.bits();
        if direction == SearchDirection::Up {
            buf[2] |= W2_SEARCH_UP;
        }
    }

    if frame.injection == InjectionSide::High {
        buf[2] |= W2_HIGH_SIDE;
    }
    if frame.mono {
        buf[2] |= W2_MONO;
    }
    if frame.mute_right {
        buf[2] |= W2_MUTE_RIGHT;
    }
    if frame.mute_left {
        buf[2] |= W2_MUTE_LEFT;
    }
    if config.port1 {
        buf[2] |= W2_PORT1;
    }

    if config.port2 {
        buf[3] |= W3_PORT2;
    }
    if frame.standby {
        buf[3] |= W3_STANDBY;
    }
    if config.band == Band::Japan {
        buf[3] |= W3_JAPAN_BAND;
    }
    if config.xtal_32768 {
        buf[3] |= W3_XTAL_32768;
    }
    if config.soft_mute {
        buf[3] |= W3_SOFT_MUTE;
    }
    if config.high_cut {
        buf[3] |= W3_HIGH_CUT;
    }
    if config.stereo_noise_cancel {
        buf[3] |= W3_STEREO_NOISE;
    }
    if config.search_indicator {
        buf[3] |= W3_SEARCH_INDICATOR;
    }

    if config.pll_ref {
        buf[4] |= W4_PLLREF;
    }
    if config.deemphasis_75us {
        buf[4] |= W4_DEEMPH_75;
    }

    buf
}

/// Frame that tunes to `divider` on the given injection side.
pub fn encode_tune(config: &TunerConfig, injection: InjectionSide, divider: u16) -> [u8; FRAME_LEN] {
    encode(config, &WriteFrame::tune(injection, divider))
}

/// Frame that starts an autoscan from `divider`: mid stop level, high-side
/// injection.
pub fn encode_search(
    config: &TunerConfig,
    direction: SearchDirection,
    divider: u16,
) -> [u8; FRAME_LEN] {
    let mut frame = WriteFrame::tune(InjectionSide::High, divider);
    frame.search = Some((direction, SearchLevel::Mid));
    encode(config, &frame)
}

/// Decoded read frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    /// A station was found, or the band limit was hit
    pub ready: bool,
    /// Autoscan ran into the band edge
    pub band_limit: bool,
    /// PLL word after search or preset
    pub divider: u16,
    pub stereo: bool,
    /// IF counter result
    pub if_counter: u8,
    /// ADC signal level, 0-15
    pub level: u8,
    /// Always 0 on genuine parts
    pub chip_id: u8,
}

impl StatusSnapshot {
    /// Frequency the PLL is locked to, rounded to 0.1 MHz.
    pub fn frequency(&self, injection: InjectionSide) -> Frequency {
        Frequency::from_hz_rounded(frequency_hz(self.divider, injection))
    }
}

pub fn decode(buf: &[u8; FRAME_LEN]) -> StatusSnapshot {
    StatusSnapshot {
        ready: buf[0] & R0_READY != 0,
        band_limit: buf[0] & R0_BAND_LIMIT != 0,
        divider: (u16::from(buf[0] & 0x3F) << 8) | u16::from(buf[1]),
        stereo: buf[2] & R2_STEREO != 0,
        if_counter: buf[2] & R2_IF_COUNTER,
        level: (buf[3] & R3_LEVEL) >> 4,
        chip_id: buf[3] & R3_CHIP_ID,
    }
}

// ── Divider arithmetic ───────────────────────────────────────────────

/// PLL divider for a station at `freq`: `round(4 * (f ± IF) / fref)`.
pub fn divider_for(freq: Frequency, injection: InjectionSide) -> u16 {
    let hz = match injection {
        InjectionSide::High => (freq.khz() + IF_KHZ) * 1000,
        InjectionSide::Low => freq.khz().saturating_sub(IF_KHZ) * 1000,
    };
    divider_from_lo_hz(hz)
}

/// Divider for a local oscillator frequency already including the IF offset.
pub fn divider_from_lo_hz(lo_hz: u32) -> u16 {
    let steps = (u64::from(lo_hz) * 4 + u64::from(REF_HZ) / 2) / u64::from(REF_HZ);
    steps.min(u64::from(DIVIDER_MAX)) as u16
}

/// Station frequency in Hz that a divider corresponds to.
pub fn frequency_hz(divider: u16, injection: InjectionSide) -> u32 {
    let lo_hz = u32::from(divider) * HZ_PER_DIVIDER_STEP;
    match injection {
        InjectionSide::High => lo_hz.saturating_sub(IF_KHZ * 1000),
        InjectionSide::Low => lo_hz + IF_KHZ * 1000,
    }
}
