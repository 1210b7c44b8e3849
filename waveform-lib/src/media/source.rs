//! Input side of the pipeline: container probing, stream discovery, decoding.

use std::fs::File;
use std::io;
use std::path::Path;

use log::{debug, info};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use super::{rescale_ts, AudioFrame};
use crate::error::{Result, WaveformError};

/// An opened input container with its selected audio stream.
pub struct MediaSource {
    reader: Box<dyn FormatReader>,
    codec_params: CodecParameters,
    pub track_id: u32,
    pub sample_rate: u32,
    pub channels: usize,
    pub time_base: TimeBase,
    pub duration_ms: u64,
    /// `duration_ms * sample_rate / 1000`, never zero.
    pub total_samples: u64,
}

impl MediaSource {
    /// Open and probe `path`, selecting the first decodable audio track.
    pub fn open(path: &Path) -> Result<Self> {
        let src = File::open(path).map_err(|err| {
            WaveformError::InputOpenFailed(format!("{}: {}", path.display(), err))
        })?;
        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|err| {
                WaveformError::InputOpenFailed(format!("{}: {}", path.display(), err))
            })?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| WaveformError::StreamProbeFailed("no audio stream found".to_string()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.filter(|&rate| rate > 0).ok_or_else(|| {
            WaveformError::StreamProbeFailed("audio stream has no sample rate".to_string())
        })?;
        let channels = codec_params
            .channels
            .map(|channels| channels.count())
            .filter(|&count| count > 0)
            .ok_or_else(|| {
                WaveformError::StreamProbeFailed("audio stream has no channel layout".to_string())
            })?;
        let time_base = codec_params
            .time_base
            .unwrap_or_else(|| TimeBase::new(1, sample_rate));
        let n_frames = codec_params.n_frames.ok_or_else(|| {
            WaveformError::StreamProbeFailed("audio stream duration is unknown".to_string())
        })?;

        let duration_ms = duration_ms(n_frames, time_base);
        let total_samples = total_samples(duration_ms, sample_rate);
        if total_samples == 0 {
            return Err(WaveformError::StreamProbeFailed(format!(
                "audio stream holds no samples (duration {} ms)",
                duration_ms
            )));
        }

        info!(
            "input '{}': track {} codec={:?} sample_rate={} channels={} duration={}ms",
            path.display(),
            track_id,
            codec_params.codec,
            sample_rate,
            channels,
            duration_ms
        );

        Ok(Self {
            reader,
            codec_params,
            track_id,
            sample_rate,
            channels,
            time_base,
            duration_ms,
            total_samples,
        })
    }

    /// Open a decoder for the selected track.
    pub fn open_decoder(&self) -> Result<AudioDecoder> {
        let dec_opts: DecoderOptions = Default::default();
        let inner = symphonia::default::get_codecs()
            .make(&self.codec_params, &dec_opts)
            .map_err(|err| {
                WaveformError::DecoderOpenFailed(format!("stream #{}: {}", self.track_id, err))
            })?;

        Ok(AudioDecoder {
            inner,
            sample_rate: self.sample_rate,
            stream_time_base: self.time_base,
            time_base: TimeBase::new(1, self.sample_rate),
            next_pts: 0,
        })
    }

    /// Read the next packet of any track. `None` marks the end of the stream.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        match self.reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(Error::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(WaveformError::DecodeFailed(format!("read error: {}", err))),
        }
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        debug!("closed input context");
    }
}

/// Stream duration in milliseconds, truncated.
pub(crate) fn duration_ms(n_frames: u64, time_base: TimeBase) -> u64 {
    let ms = u128::from(n_frames) * u128::from(time_base.numer) * 1000
        / u128::from(time_base.denom.max(1));
    u64::try_from(ms).unwrap_or(u64::MAX)
}

pub(crate) fn total_samples(duration_ms: u64, sample_rate: u32) -> u64 {
    let samples = u128::from(duration_ms) * u128::from(sample_rate) / 1000;
    u64::try_from(samples).unwrap_or(u64::MAX)
}

/// Decoder for the selected audio stream.
pub struct AudioDecoder {
    inner: Box<dyn Decoder>,
    sample_rate: u32,
    stream_time_base: TimeBase,
    time_base: TimeBase,
    next_pts: i64,
}

impl AudioDecoder {
    /// Time base of decoded frames: one tick per sample frame.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Decode one packet. `Ok(None)` means the decoder produced no samples yet.
    pub fn decode(&mut self, packet: &Packet) -> Result<Option<AudioFrame>> {
        let packet_pts = i64::try_from(packet.ts()).unwrap_or(i64::MAX);
        let packet_pts = rescale_ts(packet_pts, self.stream_time_base, self.time_base);

        let decoded = self
            .inner
            .decode(packet)
            .map_err(|err| WaveformError::DecodeFailed(err.to_string()))?;
        if decoded.frames() == 0 {
            return Ok(None);
        }

        // Best effort: keep timestamps monotonic when the container repeats
        // or omits them.
        let pts = packet_pts.max(self.next_pts);
        let frame = AudioFrame::from_decoded(decoded, self.sample_rate, pts)?;
        self.next_pts = pts.saturating_add(frame.frames() as i64);
        Ok(Some(frame))
    }
}

impl Drop for AudioDecoder {
    fn drop(&mut self) {
        debug!("closed decoder");
    }
}
