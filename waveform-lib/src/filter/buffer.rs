//! Endpoints of the filter chain.

use std::collections::VecDeque;

use dasp_ring_buffer::Bounded;
use symphonia::core::units::TimeBase;

use crate::error::{Result, WaveformError};
use crate::media::AudioFrame;

/// Format of the frames entering the chain. Timestamps must count sample
/// frames, so `time_base` is `1 / sample_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub sample_rate: u32,
    pub channels: usize,
    pub time_base: TimeBase,
}

/// Constraints on the frames leaving the chain, taken from the encoder.
/// Frames stay planar `f32`; quantizing to the encoder's sample format is
/// the encoder's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub channels: usize,
    pub sample_rate: u32,
    pub frame_size: usize,
}

/// Entry point of the chain; checks frames against the configured format.
pub(crate) struct BufferSource {
    format: InputFormat,
}

impl BufferSource {
    pub(crate) fn new(format: InputFormat) -> Result<Self> {
        if format.sample_rate == 0 || format.channels == 0 {
            return Err(WaveformError::FilterGraphError(format!(
                "invalid source format: {} Hz, {} channel(s)",
                format.sample_rate, format.channels
            )));
        }
        let expected = TimeBase::new(1, format.sample_rate);
        if format.time_base != expected {
            return Err(WaveformError::FilterGraphError(format!(
                "source time base {}/{} does not count samples at {} Hz",
                format.time_base.numer, format.time_base.denom, format.sample_rate
            )));
        }
        Ok(Self { format })
    }

    pub(crate) fn accept(&self, frame: &AudioFrame) -> Result<()> {
        if frame.sample_rate != self.format.sample_rate || frame.channels() != self.format.channels {
            return Err(WaveformError::FilterGraphError(format!(
                "error while feeding the filter chain: got {} Hz/{} channel(s), configured for {} Hz/{} channel(s)",
                frame.sample_rate,
                frame.channels(),
                self.format.sample_rate,
                self.format.channels
            )));
        }
        Ok(())
    }
}

/// Exit point of the chain.
///
/// Converts frames to the encoder's channel count and regroups them into
/// frames of exactly `frame_size` samples; only the final frame after a
/// flush may be shorter.
pub(crate) struct BufferSink {
    format: OutputFormat,
    rings: Vec<Bounded<Vec<f32>>>,
    ready: VecDeque<AudioFrame>,
    next_pts: Option<i64>,
}

impl BufferSink {
    pub(crate) fn new(format: OutputFormat) -> Result<Self> {
        if format.frame_size == 0 {
            return Err(WaveformError::FilterGraphError(
                "sink frame size must be greater than zero".to_string(),
            ));
        }
        if format.channels == 0 || format.channels > 2 {
            return Err(WaveformError::FilterGraphError(format!(
                "unsupported sink channel count {}",
                format.channels
            )));
        }

        let rings = (0..format.channels)
            .map(|_| Bounded::from(vec![0.0_f32; format.frame_size]))
            .collect();
        Ok(Self {
            format,
            rings,
            ready: VecDeque::new(),
            next_pts: None,
        })
    }

    pub(crate) fn push(&mut self, frame: &AudioFrame) {
        if self.next_pts.is_none() {
            self.next_pts = Some(frame.pts);
        }

        for i in 0..frame.frames() {
            for channel in 0..self.format.channels {
                let sample = remap(frame, channel, self.format.channels, i);
                let _ = self.rings[channel].push(sample);
            }

            if self.rings[0].len() == self.rings[0].max_len() {
                self.emit();
            }
        }
    }

    /// Release whatever is buffered as a final short frame.
    pub(crate) fn flush(&mut self) {
        if !self.rings[0].is_empty() {
            self.emit();
        }
    }

    pub(crate) fn pull(&mut self) -> Option<AudioFrame> {
        self.ready.pop_front()
    }

    fn emit(&mut self) {
        let planes: Vec<Vec<f32>> = self
            .rings
            .iter_mut()
            .map(|ring| {
                let mut plane = Vec::with_capacity(ring.len());
                while let Some(sample) = ring.pop() {
                    plane.push(sample);
                }
                plane
            })
            .collect();

        let pts = self.next_pts.unwrap_or(0);
        let frames = planes.first().map_or(0, Vec::len) as i64;
        self.next_pts = Some(pts + frames);
        self.ready
            .push_back(AudioFrame::new(planes, self.format.sample_rate, pts));
    }
}

/// Sample for output `channel` of a `target`-channel layout. Mono is
/// duplicated to both sides; wider layouts keep front-left and front-right.
fn remap(frame: &AudioFrame, channel: usize, target: usize, index: usize) -> f32 {
    match (frame.channels(), target) {
        (1, _) => frame.planes[0][index],
        (_, 1) => (frame.planes[0][index] + frame.planes[1][index]) * 0.5,
        (source, _) => frame.planes[channel.min(source - 1)][index],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_sink(frame_size: usize) -> BufferSink {
        BufferSink::new(OutputFormat {
            channels: 2,
            sample_rate: 8_000,
            frame_size,
        })
        .unwrap()
    }

    #[test]
    fn regroups_into_fixed_size_frames() {
        let mut sink = stereo_sink(3);
        sink.push(&AudioFrame::new(vec![vec![0.1; 5], vec![0.2; 5]], 8_000, 100));
        sink.push(&AudioFrame::new(vec![vec![0.3; 2], vec![0.4; 2]], 8_000, 105));

        let first = sink.pull().unwrap();
        let second = sink.pull().unwrap();
        assert!(sink.pull().is_none());
        assert_eq!(first.frames(), 3);
        assert_eq!(first.pts, 100);
        assert_eq!(second.pts, 103);
        assert_eq!(second.planes[0], vec![0.1, 0.1, 0.3]);
        assert_eq!(second.planes[1], vec![0.2, 0.2, 0.4]);

        sink.push(&AudioFrame::new(vec![vec![0.5], vec![0.6]], 8_000, 107));
        sink.flush();
        let last = sink.pull().unwrap();
        assert_eq!(last.frames(), 2);
        assert_eq!(last.pts, 106);
    }

    #[test]
    fn duplicates_mono_into_stereo() {
        let mut sink = stereo_sink(2);
        sink.push(&AudioFrame::new(vec![vec![0.25, -0.25]], 8_000, 0));

        let frame = sink.pull().unwrap();
        assert_eq!(frame.planes, vec![vec![0.25, -0.25], vec![0.25, -0.25]]);
    }

    #[test]
    fn keeps_front_pair_of_wide_layouts() {
        let mut sink = stereo_sink(1);
        sink.push(&AudioFrame::new(vec![vec![0.1], vec![0.2], vec![0.9]], 8_000, 0));

        let frame = sink.pull().unwrap();
        assert_eq!(frame.planes, vec![vec![0.1], vec![0.2]]);
    }

    #[test]
    fn flush_without_pending_samples_emits_nothing() {
        let mut sink = stereo_sink(4);
        sink.flush();
        assert!(sink.pull().is_none());
    }

    #[test]
    fn source_requires_sample_time_base() {
        let coarse = BufferSource::new(InputFormat {
            sample_rate: 8_000,
            channels: 1,
            time_base: TimeBase::new(1, 1_000),
        });
        assert!(matches!(coarse, Err(WaveformError::FilterGraphError(_))));
    }

    #[test]
    fn source_rejects_foreign_frames() {
        let source = BufferSource::new(InputFormat {
            sample_rate: 8_000,
            channels: 1,
            time_base: TimeBase::new(1, 8_000),
        })
        .unwrap();
        assert!(source
            .accept(&AudioFrame::new(vec![vec![0.0]], 8_000, 0))
            .is_ok());
        assert!(matches!(
            source.accept(&AudioFrame::new(vec![vec![0.0]], 44_100, 0)),
            Err(WaveformError::FilterGraphError(_))
        ));
        assert!(source
            .accept(&AudioFrame::new(vec![vec![0.0], vec![0.0]], 8_000, 0))
            .is_err());
    }
}
