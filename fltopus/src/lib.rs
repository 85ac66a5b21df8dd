//! # fltopus
//!
//! Ogg Opus support for the flt filter.
//!
//! Opus always runs at 48 kHz. Decoded streams are presented at that rate. Audio
//! written at any other rate is converted with libsoxr before it reaches the codec.
//! Surround files (channel mapping family 1) are decoded with the multistream
//! decoder and folded to stereo.
//! The Ogg layer is handled here rather than by a container library: a page reader
//! with CRC checking and packet reassembly for decoding, and a page writer for
//! encoding.
//!
//! ## Example: encode one second of silence
//!
//! ```no_run
//! use fltcore::{BitDepth, LazyEncoder, SampleFormat};
//! use fltopus::{OpusEncoderOptions, OpusSetup};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let format = SampleFormat::new(BitDepth::S16, 2, 44_100)?;
//! let mut encoder = LazyEncoder::new(
//!     OpusSetup::to_file("silence.opus", OpusEncoderOptions::default()),
//!     format,
//! );
//! encoder.add_tag("TITLE", "Silence");
//! encoder.write(&vec![0u8; 44_100 * 4]);
//! encoder.finish()?;
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;
pub mod ogg;
mod resample;

/// The only rate libopus decodes to here.
pub const OPUS_RATE: u32 = 48_000;

pub use decoder::{OggOpusDecoder, OpusSource, open_file, understands_file};
pub use encoder::{
    DEFAULT_BITRATE_KBPS, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS, OpusEncoderOptions, OpusSetup,
    OpusWriter, version,
};
pub use error::OpusError;
pub use header::{ChannelMapping, OpusHead, OpusTags};
