//! Output side of the pipeline: PCM encoding and WAV muxing.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{WavSpec, WavWriter};
use log::{debug, warn};
use symphonia::core::units::TimeBase;

use super::{rescale_ts, AudioFrame};
use crate::error::{Result, WaveformError};

/// Sample formats an encoder can be negotiated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16,
    F32,
}

impl SampleFormat {
    fn wav_spec(&self, channels: u16, sample_rate: u32) -> WavSpec {
        match self {
            Self::S16 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
            Self::F32 => WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
        }
    }
}

/// Interleaved samples of an encoded packet.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketData {
    S16(Vec<i16>),
    F32(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    pub data: PacketData,
    /// Presentation time in the encoder time base.
    pub pts: i64,
    /// Sample frames carried by the packet.
    pub duration: u64,
}

/// Interleaving PCM encoder.
///
/// Frames go in through [`PcmEncoder::send_frame`], packets come out of
/// [`PcmEncoder::receive_packet`]. PCM carries no codec delay, so draining
/// after [`PcmEncoder::send_eof`] only returns what is already queued.
#[derive(Debug)]
pub struct PcmEncoder {
    format: SampleFormat,
    sample_rate: u32,
    channels: usize,
    frame_size: usize,
    time_base: TimeBase,
    queued: VecDeque<EncodedPacket>,
    draining: bool,
}

impl PcmEncoder {
    /// Formats in order of preference.
    pub const SUPPORTED_FORMATS: &'static [SampleFormat] = &[SampleFormat::S16, SampleFormat::F32];

    pub fn open(
        format: SampleFormat,
        sample_rate: u32,
        channels: usize,
        frame_size: usize,
    ) -> Result<Self> {
        if !Self::SUPPORTED_FORMATS.contains(&format) {
            return Err(WaveformError::EncoderOpenFailed(format!(
                "sample format {:?} is not supported",
                format
            )));
        }
        if sample_rate == 0 {
            return Err(WaveformError::EncoderOpenFailed(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        if channels == 0 || channels > usize::from(u16::MAX) {
            return Err(WaveformError::EncoderOpenFailed(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if frame_size == 0 {
            return Err(WaveformError::EncoderOpenFailed(
                "frame size must be greater than zero".to_string(),
            ));
        }

        debug!(
            "opened pcm encoder: {:?} {} Hz, {} channel(s), frame size {}",
            format, sample_rate, channels, frame_size
        );

        Ok(Self {
            format,
            sample_rate,
            channels,
            frame_size,
            time_base: TimeBase::new(1, sample_rate),
            queued: VecDeque::new(),
            draining: false,
        })
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn send_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if self.draining {
            return Err(WaveformError::EncodeFailed(
                "frame submitted after end of stream".to_string(),
            ));
        }
        if frame.channels() != self.channels {
            return Err(WaveformError::EncodeFailed(format!(
                "expected {} channel(s), got {}",
                self.channels,
                frame.channels()
            )));
        }
        if frame.sample_rate != self.sample_rate {
            return Err(WaveformError::EncodeFailed(format!(
                "expected {} Hz, got {} Hz",
                self.sample_rate, frame.sample_rate
            )));
        }
        if frame.frames() > self.frame_size {
            return Err(WaveformError::EncodeFailed(format!(
                "frame of {} samples exceeds the encoder frame size {}",
                frame.frames(),
                self.frame_size
            )));
        }
        if frame.frames() == 0 {
            return Ok(());
        }

        let interleaved = (0..frame.frames()).flat_map(|i| frame.planes.iter().map(move |plane| plane[i]));
        let data = match self.format {
            SampleFormat::S16 => PacketData::S16(interleaved.map(f32_to_s16).collect()),
            SampleFormat::F32 => PacketData::F32(interleaved.collect()),
        };

        self.queued.push_back(EncodedPacket {
            data,
            pts: frame.pts,
            duration: frame.frames() as u64,
        });
        Ok(())
    }

    /// Signal end of stream; remaining packets can still be received.
    pub fn send_eof(&mut self) {
        self.draining = true;
    }

    pub fn receive_packet(&mut self) -> Option<EncodedPacket> {
        self.queued.pop_front()
    }
}

impl Drop for PcmEncoder {
    fn drop(&mut self) {
        if !self.queued.is_empty() {
            warn!("encoder closed with {} unwritten packet(s)", self.queued.len());
        }
        debug!("closed encoder");
    }
}

fn f32_to_s16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

/// Output container, guessed from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputContainer {
    Wav,
}

impl OutputContainer {
    pub fn guess(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("wav") | Some("wave") => Ok(Self::Wav),
            _ => Err(WaveformError::OutputContextFailed(format!(
                "unable to find a suitable output format for '{}'",
                path.display()
            ))),
        }
    }
}

/// Where a [`MediaSink`] writes before its trailer: `<output>.part`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// An opened output container with a single audio stream.
///
/// The header is written on creation into a staging file next to the
/// output. [`MediaSink::write_trailer`] finalizes the container and moves it
/// into place; a sink dropped before that removes the staging file, so an
/// aborted run leaves no output behind.
pub struct MediaSink {
    path: PathBuf,
    staging: PathBuf,
    container: OutputContainer,
    io: Option<WavWriter<BufWriter<File>>>,
    stream_time_base: TimeBase,
    last_pts: Option<i64>,
    packets_written: u64,
}

impl MediaSink {
    pub fn create(path: &Path, container: OutputContainer, encoder: &PcmEncoder) -> Result<Self> {
        let channels = u16::try_from(encoder.channels()).map_err(|_| {
            WaveformError::OutputContextFailed("too many output channels".to_string())
        })?;
        let spec = encoder.format().wav_spec(channels, encoder.sample_rate());
        let staging = staging_path(path);
        let io = match container {
            OutputContainer::Wav => WavWriter::create(&staging, spec).map_err(|err| {
                WaveformError::OutputContextFailed(format!(
                    "could not open output file '{}': {}",
                    staging.display(),
                    err
                ))
            })?,
        };

        debug!(
            "opened output '{}' as {:?} (staging '{}')",
            path.display(),
            container,
            staging.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            staging,
            container,
            io: Some(io),
            stream_time_base: TimeBase::new(1, encoder.sample_rate()),
            last_pts: None,
            packets_written: 0,
        })
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    /// Mux one packet, rescaling its timestamp from `encoder_time_base`.
    pub fn write_packet(&mut self, packet: &EncodedPacket, encoder_time_base: TimeBase) -> Result<()> {
        let pts = rescale_ts(packet.pts, encoder_time_base, self.stream_time_base);
        if let Some(last) = self.last_pts {
            if pts < last {
                return Err(WaveformError::MuxWriteFailed(format!(
                    "non-monotonic timestamp {} after {}",
                    pts, last
                )));
            }
        }

        let io = self.io.as_mut().ok_or_else(|| {
            WaveformError::MuxWriteFailed("output already finalized".to_string())
        })?;
        let written = match &packet.data {
            PacketData::S16(samples) => samples.iter().try_for_each(|&s| io.write_sample(s)),
            PacketData::F32(samples) => samples.iter().try_for_each(|&s| io.write_sample(s)),
        };
        written.map_err(|err| WaveformError::MuxWriteFailed(err.to_string()))?;

        self.last_pts = Some(pts);
        self.packets_written += 1;
        Ok(())
    }

    pub fn write_trailer(&mut self) -> Result<()> {
        let io = self.io.take().ok_or_else(|| {
            WaveformError::TrailerWriteFailed("output already finalized".to_string())
        })?;
        io.finalize()
            .map_err(|err| WaveformError::TrailerWriteFailed(err.to_string()))?;
        fs::rename(&self.staging, &self.path).map_err(|err| {
            WaveformError::TrailerWriteFailed(format!(
                "could not move '{}' to '{}': {}",
                self.staging.display(),
                self.path.display(),
                err
            ))
        })?;
        debug!(
            "finalized '{}' after {} packet(s)",
            self.path.display(),
            self.packets_written
        );
        Ok(())
    }
}

impl Drop for MediaSink {
    fn drop(&mut self) {
        if let Some(io) = self.io.take() {
            warn!(
                "closing '{}' without a trailer, discarding it",
                self.path.display()
            );
            drop(io);
            if let Err(err) = fs::remove_file(&self.staging) {
                warn!("could not remove '{}': {}", self.staging.display(), err);
            }
        }
        debug!("closed output I/O handle");
        debug!("freed {:?} output context", self.container);
    }
}
