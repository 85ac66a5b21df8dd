use std::io;

use fltcore::{DecodeError, EncodeError, FormatError};

#[derive(thiserror::Error, Debug)]
pub enum OpusError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Ogg container error: {0}")]
    Container(String),
    #[error("invalid Opus header: {0}")]
    Header(String),
    #[error("libopus error: {0}")]
    Codec(String),
    #[error("resampling error: {0}")]
    Resample(String),
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<opus::Error> for OpusError {
    fn from(err: opus::Error) -> Self {
        OpusError::Codec(err.to_string())
    }
}

impl From<OpusError> for DecodeError {
    fn from(err: OpusError) -> Self {
        match err {
            OpusError::Io(io) => DecodeError::Io(io),
            other => DecodeError::Fatal(other.to_string()),
        }
    }
}

impl From<OpusError> for EncodeError {
    fn from(err: OpusError) -> Self {
        match err {
            OpusError::Io(io) => EncodeError::Io(io),
            OpusError::Unsupported(msg) => EncodeError::Unsupported(msg),
            OpusError::Format(format) => EncodeError::Format(format),
            other => EncodeError::Encode(other.to_string()),
        }
    }
}
