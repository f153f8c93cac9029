//! Autoscan state machine.
//!
//! A search is started with one hardware write and then advanced once per
//! poll tick from the status frame the control loop just read. The chip
//! either locks on a station (`ready` without `band_limit`) or runs into
//! the band edge, in which case the scan restarts from the opposite edge.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::codec::{Frequency, SearchDirection, StatusSnapshot};
use crate::tuner::{RadioState, Tuner, TunerError};

/// Consecutive band-edge wraps before a search gives up
pub const MAX_WRAPS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    Seeking(SearchDirection),
}

/// Outcome of one [`SearchController::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// No search active
    Idle,
    /// Chip still scanning
    NotReady,
    /// Hit the band edge; scan restarted from the other edge
    Wrapped,
    /// Locked and committed
    Complete(Frequency),
    /// Gave up after [`MAX_WRAPS`] wraps without a station
    Exhausted,
    /// A bus transaction failed during the step
    Failed(TunerError),
}

#[derive(Debug, Default)]
pub struct SearchController {
    state: SearchState,
    wraps: u8,
}

impl SearchController {
    pub const fn new() -> Self {
        Self {
            state: SearchState::Idle,
            wraps: 0,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SearchState::Seeking(_))
    }

    /// Enter `Seeking(direction)` and issue the search-start write.
    ///
    /// A search already in progress just takes the new direction. If the
    /// write fails the controller returns to `Idle`.
    pub fn start<I2C: I2c, D: DelayNs>(
        &mut self,
        tuner: &mut Tuner<I2C, D>,
        radio: &mut RadioState,
        direction: SearchDirection,
    ) -> Result<(), TunerError> {
        if let SearchState::Seeking(previous) = self.state {
            log::info!(
                "search redirected {} -> {}",
                previous.as_str(),
                direction.as_str()
            );
        }
        self.state = SearchState::Seeking(direction);
        self.wraps = 0;
        if let Err(e) = tuner.start_search(radio, direction) {
            self.state = SearchState::Idle;
            return Err(e);
        }
        Ok(())
    }

    /// Advance the active search using a freshly read status frame.
    pub fn tick<I2C: I2c, D: DelayNs>(
        &mut self,
        tuner: &mut Tuner<I2C, D>,
        radio: &mut RadioState,
        status: &StatusSnapshot,
    ) -> SearchStep {
        let SearchState::Seeking(direction) = self.state else {
            return SearchStep::Idle;
        };

        if !status.ready {
            return SearchStep::NotReady;
        }

        if status.band_limit {
            if self.wraps >= MAX_WRAPS {
                log::warn!(
                    "search exhausted after {} wraps, staying at {} MHz",
                    self.wraps,
                    radio.frequency
                );
                self.state = SearchState::Idle;
                self.wraps = 0;
                return SearchStep::Exhausted;
            }
            self.wraps += 1;
            return match wrap(tuner, radio, direction) {
                Ok(()) => SearchStep::Wrapped,
                Err(e) => SearchStep::Failed(e),
            };
        }

        let found = status.frequency(radio.injection);
        self.state = SearchState::Idle;
        self.wraps = 0;
        match tuner.set_frequency(radio, found) {
            Ok(()) => {
                log::info!("search complete: {} MHz", radio.frequency);
                SearchStep::Complete(radio.frequency)
            }
            Err(e) => SearchStep::Failed(e),
        }
    }
}

/// Jump to the edge opposite the one the scan ran into and restart it.
fn wrap<I2C: I2c, D: DelayNs>(
    tuner: &mut Tuner<I2C, D>,
    radio: &mut RadioState,
    direction: SearchDirection,
) -> Result<(), TunerError> {
    let band = radio.config.band;
    let edge = match direction {
        SearchDirection::Up => band.min(),
        SearchDirection::Down => band.max(),
    };
    log::info!("search hit band edge, wrapping to {} MHz", edge);
    tuner.set_frequency(radio, edge)?;
    // Restart from where the PLL actually locked, unless the read failed or
    // decodes outside the band.
    let from = match tuner.read_status(radio) {
        Ok(status) if band.contains(status.frequency(radio.injection)) => {
            status.frequency(radio.injection)
        }
        _ => radio.frequency,
    };
    tuner.start_search_from(radio, direction, from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, divider_for, Band, InjectionSide, TunerConfig};
    use crate::testing::{status_frame, FakeBus, NoDelay};

    fn radio_at(khz: u32) -> RadioState {
        let mut radio = RadioState::new(0x60, TunerConfig::new(Band::UsEurope));
        radio.frequency = Frequency::from_khz(khz);
        radio
    }

    fn snapshot(ready: bool, band_limit: bool, divider: u16) -> StatusSnapshot {
        codec::decode(&status_frame(ready, band_limit, divider, 8))
    }

    // ── start ───────────────────────────────────────────────────────

    #[test]
    fn start_enters_seeking_and_writes() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();

        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();
        assert_eq!(search.state(), SearchState::Seeking(SearchDirection::Up));

        let (bus, _) = tuner.release();
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(bus.writes[0][0] & 0x40, 0x40, "search bit set");
        assert_eq!(bus.writes[0][2] & 0x80, 0x80, "direction up");
    }

    #[test]
    fn second_start_overwrites_direction() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();

        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();
        search.start(&mut tuner, &mut radio, SearchDirection::Down).unwrap();
        assert_eq!(search.state(), SearchState::Seeking(SearchDirection::Down));
    }

    #[test]
    fn failed_start_stays_idle() {
        let mut bus = FakeBus::new();
        bus.fail_write_at(0);
        let mut tuner = Tuner::new(bus, NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();

        assert!(search.start(&mut tuner, &mut radio, SearchDirection::Up).is_err());
        assert!(!search.is_active());
    }

    // ── tick ────────────────────────────────────────────────────────

    #[test]
    fn idle_tick_does_nothing() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();

        let step = search.tick(&mut tuner, &mut radio, &snapshot(true, false, 0));
        assert_eq!(step, SearchStep::Idle);
        let (bus, _) = tuner.release();
        assert!(bus.writes.is_empty());
    }

    #[test]
    fn not_ready_keeps_seeking() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Down).unwrap();

        let step = search.tick(&mut tuner, &mut radio, &snapshot(false, false, 0));
        assert_eq!(step, SearchStep::NotReady);
        assert_eq!(search.state(), SearchState::Seeking(SearchDirection::Down));
    }

    #[test]
    fn lock_commits_rounded_frequency() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();

        // Divider of 101.5 MHz on the high side, as the chip reports it
        let divider = divider_for(Frequency::from_khz(101_500), InjectionSide::High);
        let step = search.tick(&mut tuner, &mut radio, &snapshot(true, false, divider));

        assert_eq!(step, SearchStep::Complete(Frequency::from_khz(101_500)));
        assert_eq!(radio.frequency, Frequency::from_khz(101_500));
        assert_eq!(search.state(), SearchState::Idle);
    }

    #[test]
    fn top_edge_wraps_exactly_once_before_completing() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(108_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();

        let step = search.tick(&mut tuner, &mut radio, &snapshot(true, true, 0x3FFF));
        assert_eq!(step, SearchStep::Wrapped);
        assert_eq!(search.state(), SearchState::Seeking(SearchDirection::Up));
        assert_eq!(radio.frequency, Band::UsEurope.min());

        let divider = divider_for(Frequency::from_khz(88_100), InjectionSide::High);
        let step = search.tick(&mut tuner, &mut radio, &snapshot(true, false, divider));
        assert_eq!(step, SearchStep::Complete(Frequency::from_khz(88_100)));
        assert!(!search.is_active());

        let (bus, _) = tuner.release();
        let search_writes = bus.writes.iter().filter(|w| w[0] & 0x40 != 0).count();
        assert_eq!(search_writes, 2, "initial start plus one re-issue");
    }

    #[test]
    fn wrap_re_issues_search_from_opposite_edge() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(87_500);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Down).unwrap();

        search.tick(&mut tuner, &mut radio, &snapshot(true, true, 0));
        assert_eq!(radio.frequency, Band::UsEurope.max());

        let (bus, _) = tuner.release();
        // start, trial high, trial low, commit, re-issued start
        assert_eq!(bus.writes.len(), 5);
        let expected = codec::encode_search(
            &radio.config,
            SearchDirection::Down,
            codec::divider_from_lo_hz(108_000_000 - 98_304 + 225_000),
        );
        assert_eq!(bus.writes[4], expected);
    }

    #[test]
    fn wrap_restarts_from_status_read_after_retune() {
        let mut bus = FakeBus::new();
        // two injection trials during the retune to 87.5, then the status read
        bus.push_read(status_frame(false, false, 0, 0));
        bus.push_read(status_frame(false, false, 0, 0));
        let locked = divider_for(Frequency::from_khz(87_600), InjectionSide::Low);
        bus.push_read(status_frame(true, false, locked, 4));
        let mut tuner = Tuner::new(bus, NoDelay);
        let mut radio = radio_at(108_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();

        assert_eq!(
            search.tick(&mut tuner, &mut radio, &snapshot(true, true, 0x3FFF)),
            SearchStep::Wrapped
        );

        let (bus, _) = tuner.release();
        let expected = codec::encode_search(
            &radio.config,
            SearchDirection::Up,
            codec::divider_from_lo_hz(87_600_000 + 98_304 + 225_000),
        );
        assert_eq!(bus.writes.last(), Some(&expected));
    }

    #[test]
    fn repeated_wraps_end_exhausted() {
        let mut tuner = Tuner::new(FakeBus::new(), NoDelay);
        let mut radio = radio_at(98_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();

        let edge = snapshot(true, true, 0x3FFF);
        for _ in 0..MAX_WRAPS {
            assert_eq!(search.tick(&mut tuner, &mut radio, &edge), SearchStep::Wrapped);
        }
        assert_eq!(search.tick(&mut tuner, &mut radio, &edge), SearchStep::Exhausted);
        assert_eq!(search.state(), SearchState::Idle);
    }

    #[test]
    fn failed_wrap_keeps_seeking() {
        let mut bus = FakeBus::new();
        // write 0 is the search start, write 1 the first trial of the wrap
        bus.fail_write_at(1);
        let mut tuner = Tuner::new(bus, NoDelay);
        let mut radio = radio_at(108_000);
        let mut search = SearchController::new();
        search.start(&mut tuner, &mut radio, SearchDirection::Up).unwrap();

        let step = search.tick(&mut tuner, &mut radio, &snapshot(true, true, 0));
        assert!(matches!(step, SearchStep::Failed(TunerError::Write(_))));
        assert!(search.is_active());
        assert_eq!(radio.frequency, Frequency::from_khz(108_000));
    }
}
