//! Real-time frame pacing.
//!
//! A file demuxes far faster than real time, so frames are held back to a
//! fixed cadence before they go on the wire. Deadlines are computed from
//! the stream start instant, not from the previous frame, so per-frame
//! jitter never accumulates:
//!
//! ```text
//! deadline(k) = start + k * interval
//! ```
//!
//! A frame arriving after its deadline is forwarded immediately and the
//! schedule stays anchored, so one slow frame does not shift every later
//! deadline.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

pub struct FramePacer {
    interval: Duration,
    start: Option<Instant>,
    count: u64,
    enabled: bool,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            start: None,
            count: 0,
            enabled: true,
        }
    }

    /// Pacer for a fixed video frame rate.
    pub fn for_fps(fps: u32) -> Self {
        Self::new(Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1))))
    }

    /// Pacer that never waits. Used when the producer is already real time
    /// (a live encoder) and adding delay would only grow latency.
    pub fn passthrough() -> Self {
        let mut pacer = Self::new(Duration::ZERO);
        pacer.enabled = false;
        pacer
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Frames released so far.
    pub fn frames(&self) -> u64 {
        self.count
    }

    /// Wait until the current frame's deadline, then account for it.
    ///
    /// The first call establishes the stream start and returns immediately.
    /// Cancellation-safe: if the caller drops the future mid-sleep the
    /// frame is not counted and the next call waits for the same deadline.
    pub async fn wait(&mut self) {
        if self.enabled {
            let start = *self.start.get_or_insert_with(Instant::now);
            let deadline = start + self.interval * u32::try_from(self.count).unwrap_or(u32::MAX);
            if deadline > Instant::now() {
                sleep_until(deadline).await;
            }
        }
        self.count += 1;
    }
}
