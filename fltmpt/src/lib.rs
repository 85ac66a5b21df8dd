//! # fltmpt
//!
//! Tracker module support (MOD, XM, S3M, IT and the other formats libopenmpt
//! reads) for the flt filter. Load only.
//!
//! A module has no stored audio: libopenmpt renders it at the rate chosen in
//! [`ModuleOptions`], always as stereo float. Each decode unit is one rendered block.
//!
//! ```no_run
//! use fltcore::AudioInput;
//! use fltmpt::ModuleOptions;
//!
//! # fn main() -> Result<(), fltmpt::ModuleError> {
//! let options = ModuleOptions {
//!     sample_rate: 44_100,
//!     stereo_separation: 50,
//!     ..Default::default()
//! };
//! let mut input = fltmpt::open_file_with("song.xm", options)?;
//! let mut chunk = vec![0u8; 65536];
//! while input.read(&mut chunk) > 0 {}
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod error;
mod module;

pub use decoder::{
    DEFAULT_INTERPOLATION, DEFAULT_SAMPLE_RATE, DEFAULT_STEREO_SEPARATION,
    DEFAULT_VOLUME_RAMPING, INTERPOLATION_FILTERS, ModuleDecoder, ModuleOptions, ModuleSource,
    REPEAT_COUNT, SAMPLE_RATES, STEREO_SEPARATION, VOLUME_RAMPING, open_file, open_file_with,
    understands_file, version,
};
pub use error::ModuleError;
