//! Collection of per-column peak reports and their persistence as JSON.
//!
//! Peak stages never write files themselves. They send [`PeakEvent`]s through
//! a [`PeakReporter`], which may be called from any thread. [`CaptureSink`] is
//! the reporter used by the pipeline: it keeps one accumulator per tier behind
//! a single mutex and rewrites the tier's dataset according to its
//! [`FlushPolicy`].

mod dataset;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};

use crate::config::{FlushPolicy, WaveformConfig};
use crate::error::{Result, WaveformError};

pub use dataset::{dataset_path, read_dataset, write_dataset, WaveformDataset};

/// One of the two waveform resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Full resolution, persisted with marker `m`.
    Large,
    /// Thumbnail resolution, persisted with marker `s`.
    Small,
}

impl Tier {
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Large => "m",
            Self::Small => "s",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Large => "large",
            Self::Small => "small",
        }
    }
}

/// Message sent by a peak stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakEvent {
    /// Peak value of one column, columns numbered left to right from 0.
    Column { tier: Tier, column: usize, value: u32 },
    /// The stage will not report further columns for this tier.
    TierComplete { tier: Tier },
}

/// Receiver of peak reports. Implementations must tolerate concurrent calls.
pub trait PeakReporter: Send + Sync {
    fn report(&self, event: PeakEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Capturing,
    Complete,
}

#[derive(Debug)]
struct TierCapture {
    tier: Tier,
    width: u32,
    height: u32,
    path: PathBuf,
    samples: Vec<u32>,
    flushed: Option<usize>,
    phase: Phase,
}

impl TierCapture {
    fn new(tier: Tier, width: u32, height: u32, path: PathBuf) -> Self {
        Self {
            tier,
            width,
            height,
            path,
            samples: Vec::with_capacity(width as usize),
            flushed: None,
            phase: Phase::Capturing,
        }
    }

    fn dataset(&self) -> WaveformDataset {
        WaveformDataset {
            width: self.width,
            height: self.height,
            samples: self.samples.clone(),
        }
    }

    fn has_unflushed(&self) -> bool {
        self.flushed != Some(self.samples.len())
    }

    fn flush(&mut self) -> Result<()> {
        write_dataset(&self.path, &self.dataset())?;
        self.flushed = Some(self.samples.len());
        debug!(
            "wrote {} column(s) of the {} tier to {}",
            self.samples.len(),
            self.tier.name(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug)]
struct CaptureState {
    small: TierCapture,
    large: TierCapture,
    policy: FlushPolicy,
    failure: Option<WaveformError>,
}

impl CaptureState {
    fn tier_mut(&mut self, tier: Tier) -> &mut TierCapture {
        match tier {
            Tier::Large => &mut self.large,
            Tier::Small => &mut self.small,
        }
    }

    fn capture(&mut self, tier: Tier, column: usize, value: u32) {
        let policy = self.policy;
        let capture = self.tier_mut(tier);
        if capture.phase == Phase::Complete {
            warn!(
                "dropping column {} reported after the {} tier completed",
                column,
                tier.name()
            );
            return;
        }

        if column != capture.samples.len() {
            warn!(
                "{} tier column {} arrived at position {}",
                tier.name(),
                column,
                capture.samples.len()
            );
        }
        capture.samples.push(value);

        if policy.should_flush(capture.samples.len()) {
            let result = capture.flush();
            self.record(result);
        }
    }

    fn complete(&mut self, tier: Tier) {
        let capture = self.tier_mut(tier);
        if capture.phase == Phase::Complete {
            warn!("{} tier reported completion twice", tier.name());
            return;
        }

        capture.phase = Phase::Complete;
        info!(
            "{} tier complete with {} of {} column(s)",
            tier.name(),
            capture.samples.len(),
            capture.width
        );
        let result = capture.flush();
        self.record(result);
    }

    fn record(&mut self, result: Result<()>) {
        if let Err(err) = result {
            error!("{}", err);
            if self.failure.is_none() {
                self.failure = Some(err);
            }
        }
    }
}

/// Thread-safe accumulator for both tiers' peak columns.
#[derive(Debug)]
pub struct CaptureSink {
    state: Mutex<CaptureState>,
}

impl CaptureSink {
    /// Create a sink writing the datasets for `input` into `config.json_dir`.
    pub fn new(input: &Path, config: &WaveformConfig) -> Self {
        let capture = |tier: Tier, width: u32| {
            TierCapture::new(
                tier,
                width,
                config.height,
                dataset_path(&config.json_dir, input, tier),
            )
        };

        Self {
            state: Mutex::new(CaptureState {
                small: capture(Tier::Small, config.small_width),
                large: capture(Tier::Large, config.large_width),
                policy: config.flush_policy,
                failure: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the JSON file for `tier`.
    pub fn path(&self, tier: Tier) -> PathBuf {
        self.lock().tier_mut(tier).path.clone()
    }

    /// Current in-memory contents of `tier`.
    pub fn snapshot(&self, tier: Tier) -> WaveformDataset {
        self.lock().tier_mut(tier).dataset()
    }

    pub fn is_complete(&self, tier: Tier) -> bool {
        self.lock().tier_mut(tier).phase == Phase::Complete
    }

    /// Write every tier holding columns that are not on disk yet, small tier
    /// first, and return the first write failure seen during the run.
    pub fn flush_pending(&self) -> Result<()> {
        let mut state = self.lock();
        for tier in [Tier::Small, Tier::Large] {
            let capture = state.tier_mut(tier);
            if capture.samples.is_empty() || !capture.has_unflushed() {
                continue;
            }
            let result = capture.flush();
            state.record(result);
        }

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl PeakReporter for CaptureSink {
    fn report(&self, event: PeakEvent) {
        let mut state = self.lock();
        match event {
            PeakEvent::Column {
                tier,
                column,
                value,
            } => state.capture(tier, column, value),
            PeakEvent::TierComplete { tier } => state.complete(tier),
        }
    }
}
