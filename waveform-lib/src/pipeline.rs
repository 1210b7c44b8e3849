//! Decode, measure and re-encode one input file.
//!
//! The input is decoded packet by packet, every frame runs through the
//! dual-resolution filter chain (which reports peak columns to a
//! [`CaptureSink`]) and the chain's output is encoded into the output file.
//! Progress percentages and finally the input duration in milliseconds are
//! written to the caller's stdout handle.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};

use crate::capture::{CaptureSink, PeakReporter, Tier};
use crate::config::WaveformConfig;
use crate::error::{Result, WaveformError};
use crate::filter::{FilterChain, InputFormat, OutputFormat, TierLayout};
use crate::media::{AudioDecoder, MediaSink, MediaSource, OutputContainer, PcmEncoder};
use crate::progress::Progress;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub duration_ms: u64,
    pub total_samples: u64,
    pub samples_read: u64,
    pub packets_written: u64,
    pub small_path: PathBuf,
    pub large_path: PathBuf,
}

/// Render the waveform datasets for `input` and re-encode it to `output`
/// with the default configuration. Returns the process exit code.
pub fn generate_image<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> i32 {
    generate_image_with_config(input.as_ref(), output.as_ref(), &WaveformConfig::default())
}

pub fn generate_image_with_config(input: &Path, output: &Path, config: &WaveformConfig) -> i32 {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    generate_image_to(input, output, config, &mut out)
}

/// Same as [`generate_image_with_config`], writing progress and duration
/// lines to `out`.
pub fn generate_image_to<W: Write>(
    input: &Path,
    output: &Path,
    config: &WaveformConfig,
    out: &mut W,
) -> i32 {
    match run(input, output, config, out) {
        Ok(summary) => {
            info!(
                "wrote {} packet(s) for {} of {} sample(s)",
                summary.packets_written, summary.samples_read, summary.total_samples
            );
            0
        }
        Err(err) => {
            error!("Error occurred: {}", err);
            1
        }
    }
}

/// Run the whole pipeline. The duration line is written to `out` whether
/// or not the run succeeds; it reads `0` when the input never opened.
pub fn run<W: Write>(
    input: &Path,
    output: &Path,
    config: &WaveformConfig,
    out: &mut W,
) -> Result<Summary> {
    info!(
        "generating waveform for '{}' into '{}'",
        input.display(),
        output.display()
    );

    let capture = Arc::new(CaptureSink::new(input, config));
    let mut session = Session::default();
    let transcoded = session.transcode(input, output, config, capture.clone(), out);
    let captured = capture.flush_pending();

    let duration_ms = session.duration_ms;
    let _ = writeln!(out, "{}", duration_ms);
    let _ = out.flush();
    drop(session);

    let transcoded = transcoded?;
    captured?;

    Ok(Summary {
        duration_ms,
        total_samples: transcoded.total_samples,
        samples_read: transcoded.samples_read,
        packets_written: transcoded.packets_written,
        small_path: capture.path(Tier::Small),
        large_path: capture.path(Tier::Large),
    })
}

struct Transcoded {
    total_samples: u64,
    samples_read: u64,
    packets_written: u64,
}

/// Every resource a run may hold. Released in a fixed order no matter how
/// far opening got.
#[derive(Default)]
struct Session {
    duration_ms: u64,
    decoder: Option<AudioDecoder>,
    filter: Option<FilterChain>,
    encoder: Option<PcmEncoder>,
    source: Option<MediaSource>,
    sink: Option<MediaSink>,
}

impl Session {
    fn open(
        &mut self,
        input: &Path,
        output: &Path,
        config: &WaveformConfig,
        reporter: Arc<dyn PeakReporter>,
    ) -> Result<Stages<'_>> {
        let source = self.source.insert(MediaSource::open(input)?);
        self.duration_ms = source.duration_ms;
        let decoder = self.decoder.insert(source.open_decoder()?);

        let container = OutputContainer::guess(output)?;
        let format = PcmEncoder::SUPPORTED_FORMATS.first().copied().ok_or_else(|| {
            WaveformError::EncoderOpenFailed("encoder advertises no sample format".to_string())
        })?;
        let encoder = self.encoder.insert(PcmEncoder::open(
            format,
            source.sample_rate,
            2,
            config.encoder_frame_size,
        )?);
        let sink = self
            .sink
            .insert(MediaSink::create(output, container, encoder)?);

        let layout = TierLayout::new(source.total_samples, config);
        let input_format = InputFormat {
            sample_rate: source.sample_rate,
            channels: source.channels,
            time_base: decoder.time_base(),
        };
        let output_format = OutputFormat {
            channels: encoder.channels(),
            sample_rate: encoder.sample_rate(),
            frame_size: encoder.frame_size(),
        };
        let filter = self.filter.insert(FilterChain::dual_resolution(
            &layout,
            input_format,
            output_format,
            reporter,
        )?);

        let progress = Progress::new(
            source.duration_ms,
            source.total_samples,
            config.progress_interval,
        );

        Ok(Stages {
            source,
            decoder,
            filter,
            encoder,
            sink,
            progress,
        })
    }

    fn transcode<W: Write>(
        &mut self,
        input: &Path,
        output: &Path,
        config: &WaveformConfig,
        reporter: Arc<dyn PeakReporter>,
        out: &mut W,
    ) -> Result<Transcoded> {
        let mut stages = self.open(input, output, config, reporter)?;

        let pumped = stages.pump(out);
        let drained = stages.drain();
        match (pumped, drained) {
            (Err(err), Err(flush_err)) => {
                warn!("flushing after failure also failed: {}", flush_err);
                return Err(err);
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => return Err(err),
            (Ok(()), Ok(())) => {}
        }

        stages.sink.write_trailer()?;
        Ok(Transcoded {
            total_samples: stages.progress.total_samples,
            samples_read: stages.progress.samples_read(),
            packets_written: stages.sink.packets_written(),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        drop(self.decoder.take());
        drop(self.filter.take());
        drop(self.encoder.take());
        drop(self.source.take());
        drop(self.sink.take());
    }
}

/// Borrowed view of a fully opened session.
struct Stages<'s> {
    source: &'s mut MediaSource,
    decoder: &'s mut AudioDecoder,
    filter: &'s mut FilterChain,
    encoder: &'s mut PcmEncoder,
    sink: &'s mut MediaSink,
    progress: Progress,
}

impl Stages<'_> {
    fn pump<W: Write>(&mut self, out: &mut W) -> Result<()> {
        loop {
            if let Some(percent) = self.progress.poll(Instant::now()) {
                let _ = writeln!(out, "{}", percent);
                let _ = out.flush();
            }

            let packet = match self.source.next_packet()? {
                Some(packet) => packet,
                None => break,
            };
            if packet.track_id() != self.source.track_id {
                continue;
            }

            if let Some(frame) = self.decoder.decode(&packet)? {
                self.progress.advance(frame.frames());
                self.filter.push(&frame)?;
                self.write_filtered()?;
            }
        }
        Ok(())
    }

    fn write_filtered(&mut self) -> Result<()> {
        while let Some(frame) = self.filter.pull() {
            self.encoder.send_frame(&frame)?;
            self.write_encoded()?;
        }
        Ok(())
    }

    fn write_encoded(&mut self) -> Result<()> {
        let time_base = self.encoder.time_base();
        while let Some(packet) = self.encoder.receive_packet() {
            self.sink.write_packet(&packet, time_base)?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        self.filter.flush();
        self.write_filtered()?;
        self.encoder.send_eof();
        self.write_encoded()
    }
}
