//! Bounded inbound command channel (std only).
//!
//! The transport's receive callback is the only producer; the control loop
//! is the only consumer. Producers never block: a full queue or an
//! oversized message drops the new frame and counts it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::comm::Inbox;
use crate::protocol::InboundFrame;

/// Inbound messages buffered between the transport and the control loop
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Create a channel holding at most `depth` pending frames.
pub fn command_queue(depth: usize) -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::sync_channel(depth);
    let dropped = Arc::new(AtomicU32::new(0));
    (
        CommandSender {
            tx,
            dropped: dropped.clone(),
        },
        CommandQueue { rx, dropped },
    )
}

/// Producer half. Cheap to clone; safe to call from any thread.
#[derive(Clone)]
pub struct CommandSender {
    tx: SyncSender<InboundFrame>,
    dropped: Arc<AtomicU32>,
}

impl CommandSender {
    /// Queue a raw message without blocking. Returns false if it was dropped.
    pub fn offer(&self, data: &[u8]) -> bool {
        let Ok(frame) = InboundFrame::from_slice(data) else {
            self.record_drop("oversized", data.len());
            return false;
        };
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                self.record_drop("queue full", frame.len());
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("command queue closed, message discarded");
                false
            }
        }
    }

    /// Frames dropped since the channel was created
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_drop(&self, reason: &str, len: usize) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        log::warn!("inbound message dropped ({}, {} bytes), {} dropped so far", reason, len, total);
    }
}

/// Consumer half, owned by the control loop.
pub struct CommandQueue {
    rx: Receiver<InboundFrame>,
    dropped: Arc<AtomicU32>,
}

impl CommandQueue {
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Inbox for CommandQueue {
    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<InboundFrame> {
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Keep the poll cadence with no producers left
                thread::sleep(timeout);
                None
            }
        }
    }
}
