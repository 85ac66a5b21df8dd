use std::io;

use fltcore::{DecodeError, EncodeError, FormatError};

#[derive(thiserror::Error, Debug)]
pub enum FlacError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("FLAC decode error: {0}")]
    Decode(String),
    #[error("FLAC encode error: {0}")]
    Encode(String),
    #[error("libFLAC initialization failed: {0}")]
    LibFlacInit(String),
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<claxon::Error> for FlacError {
    fn from(err: claxon::Error) -> Self {
        match err {
            claxon::Error::IoError(io) => FlacError::Io(io),
            other => FlacError::Decode(other.to_string()),
        }
    }
}

impl From<FlacError> for DecodeError {
    fn from(err: FlacError) -> Self {
        match err {
            FlacError::Io(io) => DecodeError::Io(io),
            other => DecodeError::Fatal(other.to_string()),
        }
    }
}

impl From<FlacError> for EncodeError {
    fn from(err: FlacError) -> Self {
        match err {
            FlacError::Io(io) => EncodeError::Io(io),
            FlacError::LibFlacInit(msg) => EncodeError::Init(msg),
            FlacError::Unsupported(msg) => EncodeError::Unsupported(msg),
            FlacError::Format(format) => EncodeError::Format(format),
            other => EncodeError::Encode(other.to_string()),
        }
    }
}
