use std::io;

use fltcore::{DecodeError, FormatError};

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("unrecognised container: {0}")]
    Unrecognized(String),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("codec error: {0}")]
    Codec(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<symphonia::core::errors::Error> for MediaError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match err {
            Error::IoError(io) => MediaError::Io(io),
            other => MediaError::Codec(other.to_string()),
        }
    }
}

impl From<MediaError> for DecodeError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Io(io) => DecodeError::Io(io),
            other => DecodeError::Fatal(other.to_string()),
        }
    }
}
