use thiserror::Error;

/// Every way a waveform run can fail. All of them are fatal to the run.
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("cannot open input file: {0}")]
    InputOpenFailed(String),

    #[error("cannot find stream information: {0}")]
    StreamProbeFailed(String),

    #[error("failed to open decoder: {0}")]
    DecoderOpenFailed(String),

    #[error("could not create output context: {0}")]
    OutputContextFailed(String),

    #[error("cannot open encoder: {0}")]
    EncoderOpenFailed(String),

    #[error("filter graph error: {0}")]
    FilterGraphError(String),

    #[error("could not allocate frame: {0}")]
    FrameAllocationFailed(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("encode failed: {0}")]
    EncodeFailed(String),

    #[error("error while writing output packet: {0}")]
    MuxWriteFailed(String),

    #[error("error while writing output trailer: {0}")]
    TrailerWriteFailed(String),

    #[error("failed to write waveform dataset {path}: {reason}")]
    Capture { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WaveformError>;
