//! # fltmedia
//!
//! Catch-all decoder for the flt filter. Anything symphonia can demux and decode
//! (WAV, AIFF, MP3, AAC/M4A, Ogg Vorbis, FLAC, ...) is read one container packet at
//! a time through a [`fltcore::StreamingDecoder`]. Streams with more than two
//! channels are folded to stereo with the centre and surrounds at -3 dB and the LFE
//! dropped.
//!
//! ```no_run
//! use fltcore::AudioInput;
//!
//! # fn main() -> Result<(), fltmedia::MediaError> {
//! let mut input = fltmedia::open_file("song.mp3")?;
//! println!("{} ({})", input.description(), input.format());
//! let mut chunk = vec![0u8; 65536];
//! while input.read(&mut chunk) > 0 {}
//! # Ok(())
//! # }
//! ```

pub mod decoder;
pub mod error;

pub use decoder::{MediaDecoder, MediaSource, open_file, understands_file};
pub use error::MediaError;
