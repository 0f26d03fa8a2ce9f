//! Rolling min/max/average of per-node execution time.

use std::time::Duration;

/// Number of samples after which a [`Timing`] window restarts.
pub const TIMING_WINDOW: u32 = 100;

/// Min, max and running average over a window of [`TIMING_WINDOW`] samples.
///
/// When the window is full, the next sample starts a fresh window so the
/// stats follow recent behavior rather than the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timing {
    min: Duration,
    max: Duration,
    avg: Duration,
    count: u32,
}

impl Timing {
    /// Records one sample.
    pub fn record(&mut self, sample: Duration) {
        if self.count % TIMING_WINDOW == 0 {
            self.min = sample;
            self.max = sample;
            self.avg = sample;
            self.count = 0;
        } else {
            self.min = self.min.min(sample);
            self.max = self.max.max(sample);
            let total = self.avg.as_secs_f64() * f64::from(self.count) + sample.as_secs_f64();
            self.avg = Duration::from_secs_f64(total / f64::from(self.count + 1));
        }
        self.count = (self.count + 1).min(TIMING_WINDOW);
    }

    /// Smallest sample in the current window.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Largest sample in the current window.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Average of the current window.
    pub fn avg(&self) -> Duration {
        self.avg
    }

    /// Samples in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl core::fmt::Display for Timing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "min {:.6}s, max {:.6}s, avg {:.6}s",
            self.min.as_secs_f64(),
            self.max.as_secs_f64(),
            self.avg.as_secs_f64()
        )
    }
}
