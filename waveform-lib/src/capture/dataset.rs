use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Tier;
use crate::error::{Result, WaveformError};

/// Waveform peaks for one tier, as persisted to `<input>_<marker>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformDataset {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u32>,
}

/// Location of a tier's dataset: `<json_dir>/<file name of input>_<marker>.json`.
pub fn dataset_path(json_dir: &Path, input: &Path, tier: Tier) -> PathBuf {
    let base = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "waveform".to_string());
    json_dir.join(format!("{}_{}.json", base, tier.marker()))
}

/// Replace the dataset at `path`.
///
/// The JSON is written next to the target and renamed over it, so readers
/// only ever see a complete document.
pub fn write_dataset(path: &Path, dataset: &WaveformDataset) -> Result<()> {
    let capture_error = |reason: String| WaveformError::Capture {
        path: path.display().to_string(),
        reason,
    };

    let json = serde_json::to_vec(dataset).map_err(|err| capture_error(err.to_string()))?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json).map_err(|err| capture_error(err.to_string()))?;
    fs::rename(&staging, path).map_err(|err| capture_error(err.to_string()))?;
    Ok(())
}

/// Load a dataset previously written by [`write_dataset`].
pub fn read_dataset(path: &Path) -> Result<WaveformDataset> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|err| WaveformError::Capture {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}
