//! Adapters around the media engine: symphonia for probing and decoding,
//! a PCM encoder and a hound-backed WAV muxer for the output side.

mod frame;
mod sink;
mod source;

use symphonia::core::units::TimeBase;

pub use frame::AudioFrame;
pub use sink::{
    staging_path, EncodedPacket, MediaSink, OutputContainer, PacketData, PcmEncoder, SampleFormat,
};
pub use source::{AudioDecoder, MediaSource};

/// Convert a timestamp between two time bases, rounding toward zero.
pub fn rescale_ts(ts: i64, from: TimeBase, to: TimeBase) -> i64 {
    let numer = i128::from(ts) * i128::from(from.numer) * i128::from(to.denom);
    let denom = i128::from(from.denom) * i128::from(to.numer);
    if denom == 0 {
        return ts;
    }
    (numer / denom).clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}
