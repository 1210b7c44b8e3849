//! Textual form of a waveform filter chain.
//!
//! A chain is a comma separated list of `wf` stages, each with the options
//! `n` (samples per column), `w` (width in columns) and `h` (height):
//!
//! ```text
//! wf=n=4410:w=300:h=140,wf=n=735:w=1800:h=140
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::WaveformError;

const STAGE_FILTER: &str = "wf";

/// Parameters of one peak-extraction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub samples_per_column: u64,
    pub width: u32,
    pub height: u32,
}

impl StageSpec {
    /// Size a stage so that `width` columns cover `total_samples`.
    /// The remainder of the integer division is not assigned to any column.
    pub fn covering(total_samples: u64, width: u32, height: u32) -> Self {
        let samples_per_column = if width == 0 {
            0
        } else {
            total_samples / u64::from(width)
        };
        Self {
            samples_per_column,
            width,
            height,
        }
    }
}

impl Display for StageSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}=n={}:w={}:h={}",
            STAGE_FILTER, self.samples_per_column, self.width, self.height
        )
    }
}

/// Ordered list of stages, first stage first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescription {
    pub stages: Vec<StageSpec>,
}

impl Display for ChainDescription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

impl FromStr for ChainDescription {
    type Err = WaveformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let stages = value
            .split(',')
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stages })
    }
}

fn parse_error(message: String) -> WaveformError {
    WaveformError::FilterGraphError(message)
}

fn parse_stage(text: &str) -> Result<StageSpec, WaveformError> {
    let text = text.trim();
    let (name, args) = text
        .split_once('=')
        .ok_or_else(|| parse_error(format!("stage '{}' has no options", text)))?;
    if name != STAGE_FILTER {
        return Err(parse_error(format!("no such filter: '{}'", name)));
    }

    let mut samples_per_column = None;
    let mut width = None;
    let mut height = None;

    for option in args.split(':') {
        let (key, raw) = option
            .split_once('=')
            .ok_or_else(|| parse_error(format!("malformed option '{}'", option)))?;
        let slot = match key {
            "n" => &mut samples_per_column,
            "w" => &mut width,
            "h" => &mut height,
            other => return Err(parse_error(format!("option '{}' not found", other))),
        };
        if slot.is_some() {
            return Err(parse_error(format!("option '{}' given twice", key)));
        }
        let parsed = raw
            .parse::<u64>()
            .map_err(|_| parse_error(format!("invalid value '{}' for option '{}'", raw, key)))?;
        if parsed == 0 {
            return Err(parse_error(format!("option '{}' must be greater than zero", key)));
        }
        *slot = Some(parsed);
    }

    let require = |value: Option<u64>, key: &str| {
        value.ok_or_else(|| parse_error(format!("missing option '{}' in '{}'", key, text)))
    };
    let narrow = |value: u64, key: &str| {
        u32::try_from(value).map_err(|_| parse_error(format!("option '{}' out of range", key)))
    };

    Ok(StageSpec {
        samples_per_column: require(samples_per_column, "n")?,
        width: narrow(require(width, "w")?, "w")?,
        height: narrow(require(height, "h")?, "h")?,
    })
}
