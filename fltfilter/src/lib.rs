//! # fltfilter
//!
//! The surface a host audio editor drives: query a codec's capabilities, check and
//! open files for reading, enumerate their `INFO` tags, and open output files that
//! take tags before the first block of audio.
//!
//! Every call is synchronous and handles are owned by the caller. Closing a handle
//! is dropping it: an output filter finalises its file when dropped.
//!
//! ```no_run
//! use fltconfig::SettingsStore;
//! use fltfilter::{CodecKind, InputFilter, OutputFilter};
//!
//! # fn main() -> Result<(), fltfilter::OpenError> {
//! let settings = SettingsStore::locate().load();
//! let (mut input, opened) = InputFilter::open(CodecKind::Opus, "in.opus", &settings)?;
//! let mut output = OutputFilter::open(
//!     CodecKind::Flac,
//!     "out",
//!     opened.sample_rate,
//!     opened.bits_per_sample,
//!     opened.channels,
//!     input.file_size(),
//!     &settings,
//! )?;
//!
//! let mut entry = input.first_special_data();
//! while let Some(data) = entry {
//!     output.write_special_data(data.list_type, data.type_code, data.value.as_bytes());
//!     entry = input.next_special_data();
//! }
//!
//! let mut chunk = vec![0u8; opened.chunk_size];
//! loop {
//!     let n = input.read(&mut chunk);
//!     if n == 0 {
//!         break;
//!     }
//!     output.write(&chunk[..n]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod input;
pub mod output;

/// Preferred transfer size for reads and writes.
pub const CHUNK_SIZE: usize = 65536;

/// Longest description a host buffer takes, excluding the terminator.
pub const MAX_DESCRIPTION_BYTES: usize = 79;

pub use codec::{CodecInfo, CodecKind, understands_format};
pub use error::OpenError;
pub use input::{InputFilter, OpenedInput, SpecialData};
pub use output::{OutputFilter, output_file_name};
