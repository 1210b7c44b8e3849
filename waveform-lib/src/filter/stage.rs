use std::sync::Arc;

use crate::capture::{PeakEvent, PeakReporter, Tier};
use crate::media::AudioFrame;

use super::StageSpec;

/// Peak-extraction stage.
///
/// Every run of `samples_per_column` sample frames becomes one column whose
/// value is the largest absolute amplitude across all channels, scaled into
/// `0..=height`. Frames are observed, never modified.
pub(crate) struct WaveformStage {
    tier: Tier,
    spec: StageSpec,
    reporter: Arc<dyn PeakReporter>,
    current_peak: f32,
    count: u64,
    column: usize,
    completed: bool,
    held: bool,
    completion_pending: bool,
}

impl WaveformStage {
    pub(crate) fn new(tier: Tier, spec: StageSpec, reporter: Arc<dyn PeakReporter>) -> Self {
        Self {
            tier,
            spec,
            reporter,
            current_peak: 0.0,
            count: 0,
            column: 0,
            completed: false,
            held: false,
            completion_pending: false,
        }
    }

    /// Keep `TierComplete` back until [`WaveformStage::release_completion`].
    pub(crate) fn hold_completion(mut self) -> Self {
        self.held = true;
        self
    }

    /// Report a withheld completion, if the stage has finished.
    pub(crate) fn release_completion(&mut self) {
        self.held = false;
        if self.completion_pending {
            self.completion_pending = false;
            self.reporter.report(PeakEvent::TierComplete { tier: self.tier });
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completed
    }

    pub(crate) fn process(&mut self, frame: &AudioFrame) {
        if self.completed {
            return;
        }

        for i in 0..frame.frames() {
            let amplitude = frame
                .planes
                .iter()
                .map(|plane| plane[i].abs())
                .fold(0.0_f32, f32::max);
            self.push(amplitude);
            if self.completed {
                break;
            }
        }
    }

    /// Emit the pending partial column, then report completion.
    pub(crate) fn flush(&mut self) {
        if self.completed {
            return;
        }
        if self.count > 0 {
            self.emit();
        }
        self.complete();
    }

    fn push(&mut self, amplitude: f32) {
        self.current_peak = self.current_peak.max(amplitude);
        self.count += 1;

        if self.count == self.spec.samples_per_column {
            self.emit();
            if self.column == self.spec.width as usize {
                self.complete();
            }
        }
    }

    fn emit(&mut self) {
        self.reporter.report(PeakEvent::Column {
            tier: self.tier,
            column: self.column,
            value: scale(self.current_peak, self.spec.height),
        });
        self.column += 1;
        self.current_peak = 0.0;
        self.count = 0;
    }

    fn complete(&mut self) {
        self.completed = true;
        if self.held {
            self.completion_pending = true;
        } else {
            self.reporter.report(PeakEvent::TierComplete { tier: self.tier });
        }
    }
}

fn scale(peak: f32, height: u32) -> u32 {
    let scaled = (peak.min(1.0) * height as f32).round();
    (scaled.max(0.0) as u32).min(height)
}
