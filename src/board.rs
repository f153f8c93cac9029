/// Hardware configuration for supported boards.
///
/// Each board module defines the I2C pin assignments for the tuner
/// module, selected at compile time via feature flags. The band is
/// chosen separately with `band-japan`.
use crate::codec::Band;

#[cfg(feature = "board-devkit")]
mod hw {
    pub const SDA_PIN: u8 = 21;
    pub const SCL_PIN: u8 = 22;
    pub const BOARD_NAME: &str = "esp32_devkitc";
}

#[cfg(all(feature = "board-xiao", not(feature = "board-devkit")))]
mod hw {
    pub const SDA_PIN: u8 = 5;
    pub const SCL_PIN: u8 = 6;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(not(any(feature = "board-devkit", feature = "board-xiao")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;

/// 7-bit bus address of the TEA5767
pub const TUNER_ADDRESS: u8 = 0x60;

/// Bus clock. The chip is rated for 400 kHz; run it at half that.
pub const I2C_FREQ_HZ: u32 = 200_000;

/// Band the firmware tunes in
#[cfg(feature = "band-japan")]
pub const BAND: Band = Band::Japan;
#[cfg(not(feature = "band-japan"))]
pub const BAND: Band = Band::UsEurope;
