//! Decoded audio frames in planar `f32` form.

use std::borrow::Cow;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::sample::Sample;

use crate::error::{Result, WaveformError};

fn convert_signed_24bit_to_f32(sample: i32) -> f32 {
    // 24-bit payload in the low bits; shift to sign-extend.
    let shifted_sample = sample << 8 >> 8;
    shifted_sample as f32 / 2f32.powi(23)
}

fn convert_unsigned_24bit_to_f32(sample: u32) -> f32 {
    let shifted_sample = sample as i32 - 2i32.pow(23);
    shifted_sample as f32 / 2f32.powi(23)
}

fn convert_signed_16bit_to_f32(sample: i16) -> f32 {
    sample as f32 / 2f32.powi(15)
}

fn convert_unsigned_16bit_to_f32(sample: u16) -> f32 {
    let shifted_sample = i32::from(sample) - 2i32.pow(15);
    shifted_sample as f32 / 2f32.powi(15)
}

fn convert_signed_8bit_to_f32(sample: i8) -> f32 {
    sample as f32 / 2f32.powi(7)
}

fn convert_unsigned_8bit_to_f32(sample: u8) -> f32 {
    let shifted_sample = i16::from(sample) - 2i16.pow(7);
    shifted_sample as f32 / 2f32.powi(7)
}

fn convert_signed_32bit_to_f32(sample: i32) -> f32 {
    (f64::from(sample) / 2f64.powi(31)) as f32
}

fn convert_unsigned_32bit_to_f32(sample: u32) -> f32 {
    let shifted_sample = i64::from(sample) - 2i64.pow(31);
    (shifted_sample as f64 / 2f64.powi(31)) as f32
}

/// A run of audio with one `Vec<f32>` per channel, all of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub planes: Vec<Vec<f32>>,
    pub sample_rate: u32,
    /// Presentation time in units of `1 / sample_rate`.
    pub pts: i64,
}

impl AudioFrame {
    pub fn new(planes: Vec<Vec<f32>>, sample_rate: u32, pts: i64) -> Self {
        Self {
            planes,
            sample_rate,
            pts,
        }
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Copy a decoder output buffer into a planar `f32` frame.
    pub fn from_decoded(decoded: AudioBufferRef<'_>, sample_rate: u32, pts: i64) -> Result<Self> {
        let planes = match decoded {
            AudioBufferRef::U8(buf) => planes_from(&buf, convert_unsigned_8bit_to_f32)?,
            AudioBufferRef::S8(buf) => planes_from(&buf, convert_signed_8bit_to_f32)?,
            AudioBufferRef::U16(buf) => planes_from(&buf, convert_unsigned_16bit_to_f32)?,
            AudioBufferRef::S16(buf) => planes_from(&buf, convert_signed_16bit_to_f32)?,
            AudioBufferRef::U24(buf) => planes_from(&buf, |s| convert_unsigned_24bit_to_f32(s.0))?,
            AudioBufferRef::S24(buf) => planes_from(&buf, |s| convert_signed_24bit_to_f32(s.0))?,
            AudioBufferRef::U32(buf) => planes_from(&buf, convert_unsigned_32bit_to_f32)?,
            AudioBufferRef::S32(buf) => planes_from(&buf, convert_signed_32bit_to_f32)?,
            AudioBufferRef::F32(buf) => planes_from(&buf, |s| s)?,
            AudioBufferRef::F64(buf) => planes_from(&buf, |s| s as f32)?,
        };

        Ok(Self::new(planes, sample_rate, pts))
    }
}

fn planes_from<S, F>(buf: &Cow<'_, AudioBuffer<S>>, convert: F) -> Result<Vec<Vec<f32>>>
where
    S: Sample,
    F: Fn(S) -> f32,
{
    let channels = buf.spec().channels.count();
    let mut planes = Vec::new();
    planes
        .try_reserve_exact(channels)
        .map_err(|err| WaveformError::FrameAllocationFailed(err.to_string()))?;

    for channel in 0..channels {
        let samples = buf.chan(channel);
        let mut plane = Vec::new();
        plane
            .try_reserve_exact(samples.len())
            .map_err(|err| WaveformError::FrameAllocationFailed(err.to_string()))?;
        plane.extend(samples.iter().map(|&sample| convert(sample)));
        planes.push(plane);
    }

    Ok(planes)
}
