use std::time::{Duration, Instant};

/// Tracks how much of the input has been decoded and throttles percentage
/// reports to one per interval.
#[derive(Debug, Clone)]
pub struct Progress {
    pub duration_ms: u64,
    pub total_samples: u64,
    samples_read: u64,
    interval: Duration,
    last_report: Instant,
}

impl Progress {
    pub fn new(duration_ms: u64, total_samples: u64, interval: Duration) -> Self {
        Self::started_at(duration_ms, total_samples, interval, Instant::now())
    }

    pub fn started_at(
        duration_ms: u64,
        total_samples: u64,
        interval: Duration,
        start: Instant,
    ) -> Self {
        Self {
            duration_ms,
            total_samples,
            samples_read: 0,
            interval,
            last_report: start,
        }
    }

    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    pub fn advance(&mut self, samples: usize) {
        self.samples_read = self.samples_read.saturating_add(samples as u64);
    }

    /// Whole percent decoded so far, if a report is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        if self.total_samples == 0 {
            return None;
        }
        if now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }
        self.last_report = now;
        Some(self.percent())
    }

    /// Decoders may deliver a few samples past the advertised duration, so
    /// the value is capped at 100.
    pub fn percent(&self) -> u64 {
        if self.total_samples == 0 {
            return 0;
        }
        let percent = u128::from(self.samples_read) * 100 / u128::from(self.total_samples);
        percent.min(100) as u64
    }
}
