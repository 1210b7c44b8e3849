//! Run configuration for a waveform extraction.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_FLUSH_COLUMNS, ENCODER_FRAME_SIZE, HEIGHT, LARGE_WIDTH, SMALL_WIDTH,
};

/// When the capture sink rewrites a tier's JSON file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Write once, when the tier reports completion.
    OnComplete,
    /// Rewrite after every `n` captured columns and on completion.
    EveryColumns(usize),
    /// Rewrite the whole dataset after every captured column.
    EverySample,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::EveryColumns(DEFAULT_FLUSH_COLUMNS)
    }
}

impl FlushPolicy {
    /// Whether a tier holding `captured` columns should be written now.
    pub fn should_flush(&self, captured: usize) -> bool {
        match *self {
            Self::OnComplete => false,
            Self::EveryColumns(n) => n > 0 && captured > 0 && captured % n == 0,
            Self::EverySample => true,
        }
    }
}

impl FromStr for FlushPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "complete" => Ok(Self::OnComplete),
            "sample" => Ok(Self::EverySample),
            other => {
                let count = other
                    .strip_prefix("columns:")
                    .ok_or_else(|| format!("unknown flush policy '{}'", other))?;
                let count = count
                    .parse::<usize>()
                    .map_err(|_| format!("invalid column count '{}'", count))?;
                if count == 0 {
                    return Err("column count must be greater than zero".to_string());
                }
                Ok(Self::EveryColumns(count))
            }
        }
    }
}

/// Dimensions, output placement and reporting cadence of one run.
#[derive(Debug, Clone)]
pub struct WaveformConfig {
    pub large_width: u32,
    pub small_width: u32,
    pub height: u32,
    pub encoder_frame_size: usize,
    pub flush_policy: FlushPolicy,
    /// Directory receiving the `<input>_<tier>.json` files.
    pub json_dir: PathBuf,
    pub progress_interval: Duration,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            large_width: LARGE_WIDTH,
            small_width: SMALL_WIDTH,
            height: HEIGHT,
            encoder_frame_size: ENCODER_FRAME_SIZE,
            flush_policy: FlushPolicy::default(),
            json_dir: PathBuf::from("."),
            progress_interval: Duration::from_secs(1),
        }
    }
}

impl WaveformConfig {
    pub fn with_json_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.json_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_widths(mut self, large_width: u32, small_width: u32) -> Self {
        self.large_width = large_width;
        self.small_width = small_width;
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flush_policies() {
        assert_eq!("complete".parse::<FlushPolicy>(), Ok(FlushPolicy::OnComplete));
        assert_eq!("sample".parse::<FlushPolicy>(), Ok(FlushPolicy::EverySample));
        assert_eq!(
            "columns:32".parse::<FlushPolicy>(),
            Ok(FlushPolicy::EveryColumns(32))
        );
        assert!("columns:0".parse::<FlushPolicy>().is_err());
        assert!("columns:x".parse::<FlushPolicy>().is_err());
        assert!("always".parse::<FlushPolicy>().is_err());
    }

    #[test]
    fn batched_policy_flushes_on_multiples() {
        let policy = FlushPolicy::EveryColumns(4);
        assert!(!policy.should_flush(0));
        assert!(!policy.should_flush(3));
        assert!(policy.should_flush(4));
        assert!(policy.should_flush(8));
        assert!(!FlushPolicy::OnComplete.should_flush(4));
        assert!(FlushPolicy::EverySample.should_flush(1));
    }
}
