//! Host-side fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::codec::FRAME_LEN;
use crate::comm::{Inbox, Outbox};
use crate::protocol::InboundFrame;
use crate::storage::Store;

// ── I2C bus ─────────────────────────────────────────────────────────

/// Scripted I2C bus. Reads pop queued frames (all zeros once the queue is
/// empty); successful writes are recorded in order.
#[derive(Debug, Default)]
pub struct FakeBus {
    pub writes: Vec<[u8; FRAME_LEN]>,
    reads: VecDeque<Result<[u8; FRAME_LEN], ErrorKind>>,
    write_attempts: usize,
    fail_writes: Vec<usize>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_read(&mut self, frame: [u8; FRAME_LEN]) {
        self.reads.push_back(Ok(frame));
    }

    pub fn fail_next_read(&mut self) {
        self.reads.push_back(Err(ErrorKind::Other));
    }

    /// Fail the `attempt`-th write (0-based). Failed writes are not recorded.
    pub fn fail_write_at(&mut self, attempt: usize) {
        self.fail_writes.push(attempt);
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    let attempt = self.write_attempts;
                    self.write_attempts += 1;
                    if self.fail_writes.contains(&attempt) {
                        return Err(ErrorKind::Other);
                    }
                    let mut frame = [0u8; FRAME_LEN];
                    let n = bytes.len().min(FRAME_LEN);
                    frame[..n].copy_from_slice(&bytes[..n]);
                    self.writes.push(frame);
                }
                Operation::Read(buf) => {
                    let frame = self.reads.pop_front().unwrap_or(Ok([0; FRAME_LEN]))?;
                    let n = buf.len().min(FRAME_LEN);
                    buf[..n].copy_from_slice(&frame[..n]);
                }
            }
        }
        Ok(())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Build a read frame with the given flags, divider and ADC level.
pub fn status_frame(ready: bool, band_limit: bool, divider: u16, level: u8) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = (divider >> 8) as u8 & 0x3F;
    if ready {
        frame[0] |= 0x80;
    }
    if band_limit {
        frame[0] |= 0x40;
    }
    frame[1] = divider as u8;
    frame[3] = (level & 0x0F) << 4;
    frame
}

// ── Store ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFault;

/// In-memory key-value store. `fail_writes` makes every `set_*` fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ints: HashMap<String, i16>,
    blobs: HashMap<String, Vec<u8>>,
    pub fail_writes: bool,
    pub write_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob(&self, key: &str) -> Option<&[u8]> {
        self.blobs.get(key).map(Vec::as_slice)
    }
}

impl Store for MemoryStore {
    type Error = StoreFault;

    fn get_i16(&self, key: &str) -> Result<Option<i16>, Self::Error> {
        Ok(self.ints.get(key).copied())
    }

    fn set_i16(&mut self, key: &str, value: i16) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(StoreFault);
        }
        self.write_count += 1;
        self.ints.insert(key.to_string(), value);
        Ok(())
    }

    fn get_blob<'a>(&self, key: &str, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, Self::Error> {
        match self.blobs.get(key) {
            Some(data) if data.len() > buf.len() => Err(StoreFault),
            Some(data) => {
                buf[..data.len()].copy_from_slice(data);
                Ok(Some(&buf[..data.len()]))
            }
            None => Ok(None),
        }
    }

    fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(StoreFault);
        }
        self.write_count += 1;
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// Collects every broadcast.
#[derive(Debug, Default)]
pub struct RecordingOutbox {
    pub sent: Vec<String>,
}

impl Outbox for RecordingOutbox {
    fn broadcast(&mut self, msg: &str) {
        self.sent.push(msg.to_string());
    }
}

/// Replays queued inbound messages; `None` entries (and an empty script)
/// behave as a poll timeout.
#[derive(Debug, Default)]
pub struct ScriptedInbox {
    script: VecDeque<Option<InboundFrame>>,
    pub waits: Vec<u32>,
}

impl ScriptedInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        let frame = InboundFrame::from_slice(text.as_bytes()).unwrap();
        self.script.push_back(Some(frame));
    }

    pub fn push_timeout(&mut self) {
        self.script.push_back(None);
    }
}

impl Inbox for ScriptedInbox {
    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<InboundFrame> {
        self.waits.push(timeout_ms);
        self.script.pop_front().flatten()
    }
}
