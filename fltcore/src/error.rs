use std::io;

/// Failures while choosing a canonical format.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("native stream reports no channels")]
    NoChannels,
    #[error("native stream reports no sample rate")]
    NoSampleRate,
    #[error("native stream reports a zero bit depth")]
    NoBitDepth,
    #[error("unsupported canonical bit depth: {0}")]
    UnsupportedBitDepth(u32),
    #[error("unsupported canonical channel count: {0}")]
    UnsupportedChannels(u32),
}

/// Failures reported by a native decoder while producing one unit.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The unit could not be decoded but the stream can continue.
    #[error("recoverable decode anomaly: {0}")]
    Recoverable(String),
    /// The stream cannot continue.
    #[error("decode failed: {0}")]
    Fatal(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Recoverable(_))
    }
}

/// Failures while setting up, feeding or finalising a native encoder.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("encoder initialisation failed: {0}")]
    Init(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error("encoder is not streaming")]
    NotStreaming,
    #[error(transparent)]
    Format(#[from] FormatError),
}
