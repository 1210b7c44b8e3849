//! # Waveform Library
//!
//! Streams an audio file through a decoder, measures it with two peak
//! extraction stages of different resolution and writes each resolution as
//! a `{width, height, samples}` JSON dataset next to a re-encoded copy of
//! the audio.
//!
//! ```no_run
//! let code = waveform_lib::generate_image("song.flac", "song.wav");
//! std::process::exit(code);
//! ```

pub mod capture;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod media;
pub mod pipeline;
pub mod progress;

pub use capture::{CaptureSink, PeakEvent, PeakReporter, Tier, WaveformDataset};
pub use config::{FlushPolicy, WaveformConfig};
pub use error::{Result, WaveformError};
pub use pipeline::{generate_image, generate_image_to, generate_image_with_config, run, Summary};
