//! Capture session state and statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Radio configuration progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaptureState {
    Idle,
    Configured,
    Capturing,
}

/// Per-device session owned by `RadioDevice`
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub channel: u8,
    pub device_id: u16,
    pub state: CaptureState,
}

impl CaptureSession {
    pub fn new(device_id: u16) -> Self {
        Self {
            channel: 0,
            device_id,
            state: CaptureState::Idle,
        }
    }

    /// Advance to `next`; backwards moves are ignored.
    pub fn advance(&mut self, next: CaptureState) {
        if next > self.state {
            self.state = next;
        }
    }
}

/// Counters shared between the capture thread and the supervisor
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub status_frames: AtomicU64,
    pub malformed_transfers: AtomicU64,
    pub datagrams_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub reconnects: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_frame(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_frame(&self) {
        self.status_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_frames(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    pub fn get_status_frames(&self) -> u64 {
        self.status_frames.load(Ordering::Relaxed)
    }

    pub fn get_malformed(&self) -> u64 {
        self.malformed_transfers.load(Ordering::Relaxed)
    }

    pub fn get_sent(&self) -> u64 {
        self.datagrams_sent.load(Ordering::Relaxed)
    }

    pub fn get_send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn get_reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frames: {} | Status frames: {} | Malformed: {} | Sent: {} | Send errors: {} | Reconnects: {}",
            self.get_frames(),
            self.get_status_frames(),
            self.get_malformed(),
            self.get_sent(),
            self.get_send_failures(),
            self.get_reconnects()
        )
    }
}
