//! Frequency synthesizer: bus access and tuning for the TEA5767.
//!
//! [`Tuner`] owns the I2C bus and the settle delay. The mutable radio state
//! ([`RadioState`]) is owned by the control loop and passed in by reference,
//! so a failed transaction can leave it untouched.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::codec::{
    self, Frequency, InjectionSide, SearchDirection, StatusSnapshot, TunerConfig, FRAME_LEN,
};

/// Wait after a tuning write before the status frame is meaningful
pub const SETTLE_DELAY_MS: u32 = 30;

/// Distance of the injection trials from the target station (kHz)
pub const TRIAL_OFFSET_KHZ: i32 = 450;

/// Autoscan starts this far from the current station so it does not
/// re-lock on it immediately
pub const SEARCH_STEP_HZ: u32 = 98_304;

/// A failed bus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerError {
    Write(ErrorKind),
    Read(ErrorKind),
}

impl fmt::Display for TunerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerError::Write(kind) => write!(f, "tuner write failed: {kind:?}"),
            TunerError::Read(kind) => write!(f, "tuner read failed: {kind:?}"),
        }
    }
}

/// Everything the control loop knows about the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioState {
    /// 7-bit bus address
    pub address: u8,
    pub config: TunerConfig,
    /// Side used by the last successful write
    pub injection: InjectionSide,
    /// Last frequency committed through [`Tuner::set_frequency`]
    pub frequency: Frequency,
    /// Last successfully decoded status frame (may be stale)
    pub status: StatusSnapshot,
}

impl RadioState {
    pub fn new(address: u8, config: TunerConfig) -> Self {
        Self {
            address,
            config,
            injection: InjectionSide::High,
            frequency: config.band.min(),
            status: StatusSnapshot::default(),
        }
    }
}

/// TEA5767 driver over a blocking I2C bus.
pub struct Tuner<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C: I2c, D: DelayNs> Tuner<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Give the bus and delay back.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_frame(&mut self, radio: &RadioState, frame: &[u8; FRAME_LEN]) -> Result<(), TunerError> {
        match self.i2c.write(radio.address, frame) {
            Ok(()) => {
                log::debug!("tuner write ok: {:02X?}", frame);
                Ok(())
            }
            Err(e) => {
                let err = TunerError::Write(e.kind());
                log::error!("{}", err);
                Err(err)
            }
        }
    }

    /// Read and decode the status frame. On failure `radio.status` keeps its
    /// previous value.
    pub fn read_status(&mut self, radio: &mut RadioState) -> Result<StatusSnapshot, TunerError> {
        let mut buf = [0u8; FRAME_LEN];
        match self.i2c.read(radio.address, &mut buf) {
            Ok(()) => {
                log::debug!("tuner status: {:02X?}", buf);
                radio.status = codec::decode(&buf);
                Ok(radio.status)
            }
            Err(e) => {
                let err = TunerError::Read(e.kind());
                log::error!("{}", err);
                Err(err)
            }
        }
    }

    /// Write a tuning frame for `freq` on the given side. Used for the trials
    /// and for the final commit; does not touch `radio.frequency`.
    fn tune(
        &mut self,
        radio: &mut RadioState,
        injection: InjectionSide,
        freq: Frequency,
    ) -> Result<(), TunerError> {
        log::debug!("tune {:?} side to {} kHz", injection, freq.khz());
        let divider = codec::divider_for(freq, injection);
        let frame = codec::encode_tune(&radio.config, injection, divider);
        self.write_frame(radio, &frame)?;
        radio.injection = injection;
        Ok(())
    }

    /// Try both injection sides around `target` and pick one.
    ///
    /// Tunes 450 kHz above on the high side, then 450 kHz below on the low
    /// side, reading the ADC level after each settle delay. The side whose
    /// trial read the *lower* level wins; ties go to the low side. A failed
    /// status read counts as level 0.
    pub fn optimal_injection(
        &mut self,
        radio: &mut RadioState,
        target: Frequency,
    ) -> Result<InjectionSide, TunerError> {
        self.tune(radio, InjectionSide::High, target.offset(TRIAL_OFFSET_KHZ))?;
        self.delay.delay_ms(SETTLE_DELAY_MS);
        let level_high = self.read_status(radio).map(|s| s.level).unwrap_or(0);

        self.tune(radio, InjectionSide::Low, target.offset(-TRIAL_OFFSET_KHZ))?;
        self.delay.delay_ms(SETTLE_DELAY_MS);
        let level_low = self.read_status(radio).map(|s| s.level).unwrap_or(0);

        let side = if level_high < level_low {
            InjectionSide::High
        } else {
            InjectionSide::Low
        };
        log::debug!(
            "injection trial: high={} low={} -> {:?}",
            level_high,
            level_low,
            side
        );
        Ok(side)
    }

    /// Tune to `target`, clamped to the configured band, on the side chosen
    /// by [`Self::optimal_injection`]. `radio.frequency` only changes when
    /// the final write succeeds.
    pub fn set_frequency(&mut self, radio: &mut RadioState, target: Frequency) -> Result<(), TunerError> {
        let band = radio.config.band;
        let target = if band.contains(target) {
            target
        } else {
            let clamped = band.clamp(target);
            log::warn!("{} MHz is outside the band, using {} MHz", target, clamped);
            clamped
        };

        let side = self.optimal_injection(radio, target)?;
        self.tune(radio, side, target)?;
        radio.frequency = target;
        log::info!("tuned to {} MHz ({:?} side)", target, side);
        Ok(())
    }

    /// Start an autoscan from the current frequency.
    pub fn start_search(&mut self, radio: &mut RadioState, direction: SearchDirection) -> Result<(), TunerError> {
        let from = radio.frequency;
        self.start_search_from(radio, direction, from)
    }

    /// Start an autoscan from `from` instead of the recorded frequency.
    pub fn start_search_from(
        &mut self,
        radio: &mut RadioState,
        direction: SearchDirection,
        from: Frequency,
    ) -> Result<(), TunerError> {
        let station_hz = from.khz() * 1000;
        let start_hz = match direction {
            SearchDirection::Up => station_hz + SEARCH_STEP_HZ,
            SearchDirection::Down => station_hz.saturating_sub(SEARCH_STEP_HZ),
        };
        let divider = codec::divider_from_lo_hz(start_hz + codec::IF_KHZ * 1000);
        let frame = codec::encode_search(&radio.config, direction, divider);
        self.write_frame(radio, &frame)?;
        radio.injection = InjectionSide::High;
        log::info!("search {} from {} MHz", direction.as_str(), from);
        Ok(())
    }
}
