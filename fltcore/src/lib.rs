//! # fltcore
//!
//! Shared plumbing for the flt codec adapters.
//!
//! Every decoder adapter turns a native codec into a pull stream of canonical PCM
//! bytes, and every encoder adapter accepts canonical PCM bytes and converts them to
//! what its codec wants. This crate holds the parts that do not depend on any codec:
//!
//! - [`SampleFormat`] and [`select_format`]: the canonical format and how it is chosen
//!   from native stream parameters
//! - [`Converter`] and [`CanonicalSamples`]: sample conversion in both directions
//! - [`StreamingDecoder`]: the buffering state machine serving arbitrarily sized reads
//! - [`LazyEncoder`]: the two-phase encoder that defers codec setup to the first write
//! - [`TagMap`], [`TagList`] and [`TagCursor`]: tag storage and RIFF INFO enumeration
//!
//! ## Example: serving reads from a native decoder
//!
//! ```
//! use fltcore::{
//!     BitDepth, DecodeBuffer, DecodeError, NativeDecoder, SampleFormat, StreamDetails,
//!     StreamingDecoder, UnitOutcome,
//! };
//!
//! struct Silence(u32);
//!
//! impl NativeDecoder for Silence {
//!     fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
//!         if self.0 == 0 {
//!             return Ok(UnitOutcome::EndOfInput);
//!         }
//!         self.0 -= 1;
//!         out.push_bytes(&[0u8; 8]);
//!         Ok(UnitOutcome::Decoded)
//!     }
//! }
//!
//! let format = SampleFormat::new(BitDepth::S16, 2, 44_100).unwrap();
//! let details = StreamDetails::new(format, 6, "silence");
//! let mut stream = StreamingDecoder::new(Silence(3), details);
//!
//! let mut dest = [0u8; 64];
//! assert_eq!(stream.read(&mut dest), 24);
//! assert_eq!(stream.read(&mut dest), 0);
//! ```

pub mod buffer;
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod tags;

pub use buffer::DecodeBuffer;
pub use convert::{CanonicalSamples, ChannelMix, Converter, DOWNMIX_GAIN};
pub use decoder::{
    AudioInput, NativeDecoder, StreamDetails, StreamingDecoder, UnitOutcome, channel_label,
};
pub use encoder::{
    ActiveEncoder, AudioOutput, EncoderPhase, EncoderSetup, LazyEncoder, NativeWriter,
    PendingEncoder,
};
pub use error::{DecodeError, EncodeError, FormatError};
pub use format::{
    BitDepth, MAX_SIGNED_BYTES, NativeParams, SampleFormat, apply_size_ceiling, select_format,
};
pub use tags::{
    INFO_LIST, INFO_TAGS, TagCursor, TagEntry, TagList, TagMap, code_for_tag, tag_for_code,
};
