use std::io;

use fltcore::{DecodeError, FormatError};

#[derive(thiserror::Error, Debug)]
pub enum ModuleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("libopenmpt could not load the module")]
    Load,
    #[error("module has no playable length")]
    Empty,
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<ModuleError> for DecodeError {
    fn from(err: ModuleError) -> Self {
        match err {
            ModuleError::Io(io) => DecodeError::Io(io),
            other => DecodeError::Fatal(other.to_string()),
        }
    }
}
