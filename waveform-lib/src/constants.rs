//! Fixed rendering dimensions shared by both waveform tiers.

/// Column count of the full-resolution (scrubber) waveform.
pub const LARGE_WIDTH: u32 = 1800;

/// Column count of the reduced-resolution (overview thumbnail) waveform.
pub const SMALL_WIDTH: u32 = 300;

/// Height of both waveform images. Peak values are scaled into `0..=HEIGHT`.
pub const HEIGHT: u32 = 140;

/// Frame size requested from the encoder, in sample frames per channel.
pub const ENCODER_FRAME_SIZE: usize = 1024;

/// Default number of columns accumulated between two dataset rewrites.
pub const DEFAULT_FLUSH_COLUMNS: usize = 256;
