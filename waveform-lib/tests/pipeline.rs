use std::error::Error;
use std::path::Path;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;
use waveform_lib::capture::read_dataset;
use waveform_lib::{generate_image_to, run, Tier, WaveformConfig, WaveformError};

/// Write a 16-bit PCM WAV whose frames are produced by `sample(frame, channel)`.
fn write_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: u32,
    sample: impl Fn(u32, u16) -> i16,
) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for frame in 0..frames {
        for channel in 0..channels {
            writer.write_sample(sample(frame, channel))?;
        }
    }
    writer.finalize()?;
    Ok(())
}

fn small_config(json_dir: &Path) -> WaveformConfig {
    WaveformConfig::default()
        .with_json_dir(json_dir)
        .with_widths(100, 10)
}

fn stdout_lines(out: &[u8]) -> Vec<u64> {
    String::from_utf8_lossy(out)
        .lines()
        .map(|line| line.trim().parse::<u64>().expect("numeric stdout line"))
        .collect()
}

#[test]
fn silent_input_yields_flat_datasets() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("silence.wav");
    let output = dir.path().join("silence_out.wav");
    write_wav(&input, 8_000, 1, 1_000, |_, _| 0)?;

    let mut out = Vec::new();
    let summary = run(&input, &output, &small_config(dir.path()), &mut out)?;

    assert_eq!(summary.duration_ms, 125);
    assert_eq!(summary.total_samples, 1_000);
    assert_eq!(summary.samples_read, 1_000);
    assert_eq!(summary.large_path, dir.path().join("silence.wav_m.json"));
    assert_eq!(summary.small_path, dir.path().join("silence.wav_s.json"));

    let large = read_dataset(&summary.large_path)?;
    assert_eq!(large.width, 100);
    assert_eq!(large.height, 140);
    assert_eq!(large.samples, vec![0; 100]);

    let small = read_dataset(&summary.small_path)?;
    assert_eq!(small.width, 10);
    assert_eq!(small.samples, vec![0; 10]);

    assert_eq!(stdout_lines(&out).last(), Some(&125));
    Ok(())
}

#[test]
fn output_is_a_stereo_copy_of_the_input() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("mono.wav");
    let output = dir.path().join("stereo.wav");
    write_wav(&input, 8_000, 1, 1_000, |frame, _| (frame % 100) as i16 * 100)?;

    let mut out = Vec::new();
    run(&input, &output, &small_config(dir.path()), &mut out)?;

    let reader = hound::WavReader::open(&output)?;
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 8_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration(), 1_000);

    let samples = reader.into_samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    for pair in samples.chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    assert_eq!(samples[2 * 57], 5_700);
    Ok(())
}

#[test]
fn peaks_follow_the_loudest_channel() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("stereo.wav");
    let output = dir.path().join("stereo_out.wav");
    write_wav(&input, 8_000, 2, 1_000, |frame, channel| {
        match (channel, frame % 2) {
            (0, _) => 0,
            (_, 0) => 16_384,
            _ => -16_384,
        }
    })?;

    let summary = run(&input, &output, &small_config(dir.path()), &mut Vec::new())?;

    let large = read_dataset(&summary.large_path)?;
    assert_eq!(large.samples, vec![70; 100]);
    let small = read_dataset(&summary.small_path)?;
    assert_eq!(small.samples, vec![70; 10]);
    Ok(())
}

#[test]
fn default_dimensions_apply_to_noise() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("noise.wav");
    let output = dir.path().join("noise_out.wav");
    let mut rng = StdRng::seed_from_u64(7);
    let noise: Vec<i16> = (0..16_000).map(|_| rng.gen_range(i16::MIN..=i16::MAX)).collect();
    write_wav(&input, 16_000, 1, 16_000, |frame, _| noise[frame as usize])?;

    let config = WaveformConfig::default().with_json_dir(dir.path());
    let summary = run(&input, &output, &config, &mut Vec::new())?;
    assert_eq!(summary.duration_ms, 1_000);

    let large = read_dataset(&summary.large_path)?;
    assert_eq!(large.width, 1_800);
    assert_eq!(large.samples.len(), 1_800);
    assert!(large.samples.iter().all(|&value| value <= 140));
    assert!(large.samples.iter().any(|&value| value > 0));

    let small = read_dataset(&summary.small_path)?;
    assert_eq!(small.width, 300);
    assert_eq!(small.samples.len(), 300);
    assert!(small.samples.iter().all(|&value| value <= 140));
    Ok(())
}

#[test]
fn progress_lines_precede_duration() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("tone_out.wav");
    write_wav(&input, 8_000, 1, 8_000, |frame, _| {
        ((frame as f32 * 0.05).sin() * 8_000.0) as i16
    })?;

    let config = small_config(dir.path()).with_progress_interval(Duration::ZERO);
    let mut out = Vec::new();
    run(&input, &output, &config, &mut out)?;

    let lines = stdout_lines(&out);
    let (duration, progress) = lines.split_last().expect("duration line");
    assert_eq!(*duration, 1_000);
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(progress.iter().all(|&percent| percent <= 100));
    Ok(())
}

#[test]
fn sub_millisecond_input_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("blip.wav");
    let output = dir.path().join("blip_out.wav");
    write_wav(&input, 8_000, 1, 7, |_, _| 1_000)?;

    let mut out = Vec::new();
    let err = run(&input, &output, &small_config(dir.path()), &mut out)
        .expect_err("empty stream must fail");
    assert!(matches!(err, WaveformError::StreamProbeFailed(_)));
    assert_eq!(stdout_lines(&out), vec![0]);

    let code = generate_image_to(&input, &output, &small_config(dir.path()), &mut Vec::new());
    assert_eq!(code, 1);
    Ok(())
}

#[test]
fn missing_input_reports_zero_duration() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("absent.wav");
    let output = dir.path().join("absent_out.wav");

    let mut out = Vec::new();
    let err = run(&input, &output, &small_config(dir.path()), &mut out)
        .expect_err("missing input must fail");
    assert!(matches!(err, WaveformError::InputOpenFailed(_)));
    assert_eq!(stdout_lines(&out), vec![0]);
    assert!(!output.exists());
    Ok(())
}

#[test]
fn unknown_output_container_fails_before_decoding() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("tone.xyz");
    write_wav(&input, 8_000, 1, 1_000, |_, _| 0)?;

    let mut out = Vec::new();
    let config = small_config(dir.path());
    let code = generate_image_to(&input, &output, &config, &mut out);
    assert_eq!(code, 1);
    assert_eq!(stdout_lines(&out), vec![125]);
    assert!(!output.exists());

    let json = waveform_lib::capture::dataset_path(dir.path(), &input, Tier::Large);
    assert!(!json.exists());
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn write_failure_mid_stream_keeps_small_dataset_and_drops_output() -> Result<(), Box<dyn Error>> {
    use waveform_lib::media::staging_path;

    let full = Path::new("/dev/full");
    if !full.exists() {
        eprintln!("skipping: /dev/full is not available");
        return Ok(());
    }

    let dir = tempdir()?;
    let input = dir.path().join("long.wav");
    let output = dir.path().join("long_out.wav");
    write_wav(&input, 8_000, 1, 4_000, |_, _| 0)?;
    // Every write to the output fails once its 8 KiB buffer spills, which
    // happens on the second 1024-frame packet, after the small tier is done.
    std::os::unix::fs::symlink(full, staging_path(&output))?;

    let config = WaveformConfig::default()
        .with_json_dir(dir.path())
        .with_widths(3_000, 2_040);
    let mut out = Vec::new();
    let err = run(&input, &output, &config, &mut out).expect_err("writes must fail");
    assert!(matches!(err, WaveformError::MuxWriteFailed(_)), "{}", err);
    assert_eq!(stdout_lines(&out).last(), Some(&500));

    let small = read_dataset(&dir.path().join("long.wav_s.json"))?;
    assert_eq!(small.width, 2_040);
    assert_eq!(small.height, 140);
    assert_eq!(small.samples, vec![0; 2_040]);

    assert!(!output.exists());
    assert!(std::fs::symlink_metadata(staging_path(&output)).is_err());

    std::os::unix::fs::symlink(full, staging_path(&output))?;
    let code = generate_image_to(&input, &output, &config, &mut Vec::new());
    assert_eq!(code, 1);
    assert!(!output.exists());
    Ok(())
}
