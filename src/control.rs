//! The control loop.
//!
//! A single thread owns the radio context, the tuner and the store. Each
//! iteration waits up to [`POLL_INTERVAL_MS`] for an inbound message and
//! then either dispatches it or, on timeout, polls the chip status,
//! broadcasts it and advances an active search.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::codec::{Frequency, StatusSnapshot};
use crate::comm::{self, Inbox, Outbox};
use crate::dispatch::handle_command;
use crate::protocol::{CommandError, DeviceMessage};
use crate::search::{SearchController, SearchStep};
use crate::storage::{PresetList, Settings, Store};
use crate::tuner::{RadioState, Tuner, TunerError};

/// Status refresh cadence, and the longest a command waits to be handled
pub const POLL_INTERVAL_MS: u32 = 1000;

/// All mutable radio state, owned by the control loop.
#[derive(Debug)]
pub struct RadioContext {
    pub radio: RadioState,
    pub search: SearchController,
    pub presets: PresetList,
    pub settings: Settings,
}

impl RadioContext {
    pub fn new(radio: RadioState) -> Self {
        Self {
            radio,
            search: SearchController::new(),
            presets: PresetList::new(),
            settings: Settings::new(),
        }
    }

    /// Load presets and settings from the store; missing keys keep defaults.
    pub fn restore<S: Store>(radio: RadioState, store: &S) -> Self {
        Self {
            presets: PresetList::load(store),
            settings: Settings::load(store),
            ..Self::new(radio)
        }
    }

    /// Frequency to tune at power-up: the last-tuned one, else the band minimum.
    pub fn startup_frequency(&self) -> Frequency {
        Frequency::from_tenths(self.settings.last_tuned).unwrap_or(self.radio.config.band.min())
    }
}

/// What a single loop iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// No message within the interval; status polled
    Polled {
        /// `None` if the status read failed
        status: Option<StatusSnapshot>,
        search: SearchStep,
    },
    /// A command was dispatched
    Handled(&'static str),
    /// Inbound message discarded
    Discarded(CommandError),
}

pub struct Controller<I2C, D, S> {
    ctx: RadioContext,
    tuner: Tuner<I2C, D>,
    store: S,
}

impl<I2C: I2c, D: DelayNs, S: Store> Controller<I2C, D, S> {
    /// Build a controller with state restored from `store`.
    pub fn new(tuner: Tuner<I2C, D>, store: S, radio: RadioState) -> Self {
        let ctx = RadioContext::restore(radio, &store);
        log::info!(
            "restored {} presets, last tuned {}, color {}",
            ctx.presets.len(),
            ctx.settings.last_tuned,
            ctx.settings.color
        );
        Self { ctx, tuner, store }
    }

    /// Tune to the start-up frequency.
    pub fn power_up(&mut self) -> Result<(), TunerError> {
        let target = self.ctx.startup_frequency();
        log::info!("power-up tuning to {} MHz", target);
        self.tuner.set_frequency(&mut self.ctx.radio, target)
    }

    pub fn context(&self) -> &RadioContext {
        &self.ctx
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (Tuner<I2C, D>, S) {
        (self.tuner, self.store)
    }

    /// Read status, broadcast it and tick an active search.
    pub fn poll<O: Outbox + ?Sized>(&mut self, outbox: &mut O) -> Iteration {
        let ctx = &mut self.ctx;
        let Ok(status) = self.tuner.read_status(&mut ctx.radio) else {
            return Iteration::Polled {
                status: None,
                search: SearchStep::Idle,
            };
        };

        comm::send(
            outbox,
            &DeviceMessage::Status {
                frequency: status.frequency(ctx.radio.injection),
                stereo: status.stereo,
                level: status.level,
            },
        );

        let search = ctx.search.tick(&mut self.tuner, &mut ctx.radio, &status);
        if let SearchStep::Failed(e) = search {
            log::warn!("search step failed: {}", e);
        }
        Iteration::Polled {
            status: Some(status),
            search,
        }
    }

    /// Wait for one message or one poll interval, whichever comes first.
    pub fn run_once<IN, O>(&mut self, inbox: &mut IN, outbox: &mut O) -> Iteration
    where
        IN: Inbox + ?Sized,
        O: Outbox + ?Sized,
    {
        let Some(frame) = inbox.recv_timeout(POLL_INTERVAL_MS) else {
            return self.poll(outbox);
        };

        match comm::parse_command(&frame) {
            Ok(cmd) => {
                let id = cmd.id();
                handle_command(cmd, &mut self.ctx, &mut self.tuner, &mut self.store, outbox);
                Iteration::Handled(id)
            }
            Err(e) => {
                log::warn!(
                    "discarding inbound message ({} bytes): {}",
                    frame.len(),
                    e
                );
                Iteration::Discarded(e)
            }
        }
    }

    /// Run the loop forever.
    pub fn run<IN, O>(&mut self, inbox: &mut IN, outbox: &mut O) -> !
    where
        IN: Inbox + ?Sized,
        O: Outbox + ?Sized,
    {
        log::info!("control loop running, poll interval {} ms", POLL_INTERVAL_MS);
        loop {
            self.run_once(inbox, outbox);
        }
    }
}
