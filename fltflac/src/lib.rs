//! # fltflac
//!
//! FLAC support for the flt filter.
//!
//! Decoding goes through `claxon`: each FLAC block becomes one decode unit of a
//! [`fltcore::StreamingDecoder`]. Encoding goes through libFLAC: a [`FlacSetup`]
//! holds the output target and options until the first write, at which point the
//! Vorbis comment, seek table and padding blocks are built from the collected tags
//! and the stream is initialised.
//!
//! ## Example: transcode FLAC to FLAC
//!
//! ```no_run
//! use fltcore::{AudioInput, AudioOutput, LazyEncoder};
//! use fltflac::{FlacEncoderOptions, FlacSetup};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut input = fltflac::open_file("in.flac")?;
//! let options = FlacEncoderOptions {
//!     total_samples: input.total_samples(),
//!     ..Default::default()
//! };
//! let mut output = LazyEncoder::new(FlacSetup::to_file("out.flac", options), input.format());
//! for (name, value) in input.tags().iter() {
//!     output.add_tag(name, value);
//! }
//!
//! let mut chunk = vec![0u8; 65536];
//! loop {
//!     let n = input.read(&mut chunk);
//!     if n == 0 {
//!         break;
//!     }
//!     output.write(&chunk[..n]);
//! }
//! output.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;

pub use decoder::{FlacDecoder, FlacSource, from_reader, open_file, understands_file};
pub use encoder::{FlacEncoderOptions, FlacSetup, FlacWriter, version};
pub use error::FlacError;
