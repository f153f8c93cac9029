//! Persisted settings and the preset list.
//!
//! The backing store is a key-value store with fixed-size integers and byte
//! blobs (NVS on the device). Writes commit before returning. Failures are
//! logged here and never surfaced to remote peers.

use core::fmt;

use heapless::Vec;

use crate::codec::Frequency;

/// NVS namespace holding every key below
pub const NAMESPACE: &str = "storage";

/// Last-tuned frequency in tenths of MHz (i16)
pub const KEY_PRESET_FREQ: &str = "preset_freq";
/// Stored presets in tenths of MHz (blob of little-endian i16)
pub const KEY_PRESET_LIST: &str = "preset_list";
/// Display color index 1-6 (i16)
pub const KEY_SEGMENT_COLOR: &str = "segment_color";

/// Slots in the preset blob
pub const PRESET_SLOTS: usize = 10;

/// Appends stop one short of [`PRESET_SLOTS`]
pub const PRESET_CAPACITY: usize = PRESET_SLOTS - 1;

/// Largest preset blob in bytes
pub const PRESET_BLOB_LEN: usize = PRESET_SLOTS * 2;

pub const DEFAULT_COLOR: i16 = 2;
pub const COLOR_MAX: i16 = 6;

/// Fixed-size key-value persistence.
///
/// Mirrors the NVS handle API: `get_*` return `Ok(None)` for a key that was
/// never written, `set_*` commit synchronously.
pub trait Store {
    type Error: fmt::Debug;

    fn get_i16(&self, key: &str) -> Result<Option<i16>, Self::Error>;
    fn set_i16(&mut self, key: &str, value: i16) -> Result<(), Self::Error>;
    fn get_blob<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, Self::Error>;
    fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<(), Self::Error>;
}

/// Read an i16 key, logging anything other than a hit.
pub fn read_i16<S: Store>(store: &S, key: &str) -> Option<i16> {
    match store.get_i16(key) {
        Ok(Some(value)) => {
            log::info!("loaded {} = {}", key, value);
            Some(value)
        }
        Ok(None) => {
            log::warn!("{} is not initialized yet", key);
            None
        }
        Err(e) => {
            log::error!("reading {} failed: {:?}", key, e);
            None
        }
    }
}

/// Write and commit an i16 key. Returns false (after logging) on failure.
pub fn write_i16<S: Store>(store: &mut S, key: &str, value: i16) -> bool {
    match store.set_i16(key, value) {
        Ok(()) => {
            log::info!("saved {} = {}", key, value);
            true
        }
        Err(e) => {
            log::error!("saving {} failed: {:?}", key, e);
            false
        }
    }
}

/// Stored station presets, tenths of MHz, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetList {
    entries: Vec<i16, PRESET_SLOTS>,
}

impl PresetList {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.entries.len() < PRESET_CAPACITY
    }

    pub fn iter(&self) -> impl Iterator<Item = i16> + '_ {
        self.entries.iter().copied()
    }

    /// Append a preset. Returns false and leaves the list unchanged once
    /// [`PRESET_CAPACITY`] entries are stored.
    pub fn try_push(&mut self, freq: Frequency) -> bool {
        if !self.has_room() {
            return false;
        }
        self.entries.push(freq.tenths()).is_ok()
    }

    /// Serialize into `buf`, returning the used prefix.
    pub fn to_blob<'a>(&self, buf: &'a mut [u8; PRESET_BLOB_LEN]) -> &'a [u8] {
        for (chunk, value) in buf.chunks_exact_mut(2).zip(self.entries.iter()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        &buf[..self.entries.len() * 2]
    }

    /// Parse a stored blob. A trailing odd byte and entries past
    /// [`PRESET_SLOTS`] are ignored.
    pub fn from_blob(data: &[u8]) -> Self {
        let mut entries = Vec::new();
        for chunk in data.chunks_exact(2) {
            if entries.push(i16::from_le_bytes([chunk[0], chunk[1]])).is_err() {
                break;
            }
        }
        Self { entries }
    }

    pub fn load<S: Store>(store: &S) -> Self {
        let mut buf = [0u8; PRESET_BLOB_LEN];
        match store.get_blob(KEY_PRESET_LIST, &mut buf) {
            Ok(Some(data)) => {
                let list = Self::from_blob(data);
                log::info!("loaded {} presets", list.len());
                list
            }
            Ok(None) => {
                log::warn!("{} is not initialized yet", KEY_PRESET_LIST);
                Self::new()
            }
            Err(e) => {
                log::error!("reading {} failed: {:?}", KEY_PRESET_LIST, e);
                Self::new()
            }
        }
    }

    pub fn save<S: Store>(&self, store: &mut S) -> bool {
        let mut buf = [0u8; PRESET_BLOB_LEN];
        match store.set_blob(KEY_PRESET_LIST, self.to_blob(&mut buf)) {
            Ok(()) => {
                log::info!("saved {} presets", self.len());
                true
            }
            Err(e) => {
                log::error!("saving {} failed: {:?}", KEY_PRESET_LIST, e);
                false
            }
        }
    }
}

/// Persisted scalar settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Last-tuned frequency in tenths of MHz, 0 when never saved
    pub last_tuned: i16,
    /// Display color index, 1-6
    pub color: i16,
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            last_tuned: 0,
            color: DEFAULT_COLOR,
        }
    }

    pub fn load<S: Store>(store: &S) -> Self {
        let mut settings = Self::new();
        if let Some(tenths) = read_i16(store, KEY_PRESET_FREQ) {
            settings.last_tuned = tenths;
        }
        if let Some(color) = read_i16(store, KEY_SEGMENT_COLOR) {
            settings.color = color;
        }
        settings
    }

    /// Advance the color index, wrapping back to 1 after [`COLOR_MAX`].
    pub fn cycle_color(&mut self) -> i16 {
        self.color = if (1..COLOR_MAX).contains(&self.color) {
            self.color + 1
        } else {
            1
        };
        self.color
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
