//! Dual-resolution peak filter chain.
//!
//! `buffer source -> small stage -> large stage -> buffer sink`. The stages
//! measure every frame on its way through and report columns to a
//! [`PeakReporter`]; the sink regroups frames for the encoder. The large
//! tier never reports completion before the small tier.

mod buffer;
mod description;
mod stage;

use std::sync::Arc;

use log::{debug, info};

use crate::capture::{PeakReporter, Tier};
use crate::config::WaveformConfig;
use crate::error::{Result, WaveformError};
use crate::media::AudioFrame;

pub use buffer::{InputFormat, OutputFormat};
pub use description::{ChainDescription, StageSpec};

use buffer::{BufferSink, BufferSource};
use stage::WaveformStage;

/// Stage sizing for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLayout {
    pub total_samples: u64,
    pub small: StageSpec,
    pub large: StageSpec,
}

impl TierLayout {
    pub fn new(total_samples: u64, config: &WaveformConfig) -> Self {
        Self {
            total_samples,
            small: StageSpec::covering(total_samples, config.small_width, config.height),
            large: StageSpec::covering(total_samples, config.large_width, config.height),
        }
    }

    pub fn description(&self) -> ChainDescription {
        ChainDescription {
            stages: vec![self.small, self.large],
        }
    }
}

pub struct FilterChain {
    source: BufferSource,
    small: WaveformStage,
    large: WaveformStage,
    sink: BufferSink,
}

impl FilterChain {
    /// Build a chain from its textual description. The first stage feeds the
    /// small tier, the second the large tier.
    pub fn configure(
        description: &str,
        input: InputFormat,
        output: OutputFormat,
        reporter: Arc<dyn PeakReporter>,
    ) -> Result<Self> {
        let parsed: ChainDescription = description.parse()?;
        let [small, large] = <[StageSpec; 2]>::try_from(parsed.stages).map_err(|stages| {
            WaveformError::FilterGraphError(format!(
                "expected 2 waveform stages, found {}",
                stages.len()
            ))
        })?;

        if input.sample_rate != output.sample_rate {
            return Err(WaveformError::FilterGraphError(format!(
                "cannot convert {} Hz to {} Hz",
                input.sample_rate, output.sample_rate
            )));
        }
        if output.channels != 2 {
            return Err(WaveformError::FilterGraphError(format!(
                "sink must be stereo, got {} channel(s)",
                output.channels
            )));
        }

        let source = BufferSource::new(input)?;
        let sink = BufferSink::new(output)?;

        info!("configured filter chain '{}'", description);
        Ok(Self {
            source,
            small: WaveformStage::new(Tier::Small, small, reporter.clone()),
            large: WaveformStage::new(Tier::Large, large, reporter).hold_completion(),
            sink,
        })
    }

    pub fn dual_resolution(
        layout: &TierLayout,
        input: InputFormat,
        output: OutputFormat,
        reporter: Arc<dyn PeakReporter>,
    ) -> Result<Self> {
        Self::configure(
            &layout.description().to_string(),
            input,
            output,
            reporter,
        )
    }

    /// Feed one decoded frame through both stages into the sink.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<()> {
        self.source.accept(frame)?;
        self.small.process(frame);
        self.large.process(frame);
        if self.small.is_complete() {
            self.large.release_completion();
        }
        self.sink.push(frame);
        Ok(())
    }

    /// Next frame ready for the encoder, if any.
    pub fn pull(&mut self) -> Option<AudioFrame> {
        self.sink.pull()
    }

    /// Signal end of input: stages close out their tiers, small first, and
    /// the sink releases its last short frame.
    pub fn flush(&mut self) {
        self.small.flush();
        self.large.flush();
        self.large.release_completion();
        self.sink.flush();
    }
}

impl Drop for FilterChain {
    fn drop(&mut self) {
        debug!("freed filter graph");
    }
}
