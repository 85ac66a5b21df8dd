use fltcore::FormatError;
use fltflac::FlacError;
use fltmedia::MediaError;
use fltmpt::ModuleError;
use fltopus::OpusError;

use crate::codec::CodecKind;

/// Why a host could not get an input or output handle.
#[derive(thiserror::Error, Debug)]
pub enum OpenError {
    #[error(transparent)]
    Flac(#[from] FlacError),
    #[error(transparent)]
    Opus(#[from] OpusError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0} files cannot be saved")]
    CannotSave(CodecKind),
}
