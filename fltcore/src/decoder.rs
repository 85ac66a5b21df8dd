//! Pull-based decoding with internal buffering.
//!
//! A native decoder produces audio one unit at a time (a FLAC block, an Ogg packet,
//! a container packet), with unit sizes it chooses. [`StreamingDecoder`] sits between
//! it and a host that asks for arbitrary byte counts, handing out whole canonical
//! frames in production order.

use tracing::{debug, trace, warn};

use crate::buffer::DecodeBuffer;
use crate::error::DecodeError;
use crate::format::SampleFormat;
use crate::tags::TagMap;

/// Result of asking a native decoder for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// A unit was decoded. It may have appended zero bytes.
    Decoded,
    /// The input is exhausted. Bytes appended by the same call are still served.
    EndOfInput,
}

/// A codec-specific source of canonical PCM.
pub trait NativeDecoder {
    /// Decodes the next unit and appends its canonical bytes to `out`.
    ///
    /// Only whole frames may be appended. A unit that fails with
    /// [`DecodeError::Recoverable`] must still be consumed from the input.
    fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError>;

    /// Emits whatever the codec still holds once the input is exhausted.
    fn flush(&mut self, _out: &mut DecodeBuffer) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Everything a host learns when it opens a stream.
#[derive(Debug, Clone)]
pub struct StreamDetails {
    pub format: SampleFormat,
    /// Length in frames, 0 when unknown.
    pub total_samples: u64,
    pub description: String,
    pub tags: TagMap,
}

impl StreamDetails {
    pub fn new(format: SampleFormat, total_samples: u64, description: impl Into<String>) -> Self {
        Self {
            format,
            total_samples,
            description: description.into(),
            tags: TagMap::new(),
        }
    }

    pub fn with_tags(mut self, tags: TagMap) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Draining,
    Finished,
}

/// Serves host reads from a [`NativeDecoder`].
pub struct StreamingDecoder<D> {
    native: D,
    details: StreamDetails,
    buffer: DecodeBuffer,
    phase: Phase,
    anomalies: u64,
}

impl<D: NativeDecoder> StreamingDecoder<D> {
    pub fn new(native: D, details: StreamDetails) -> Self {
        debug!(
            format = %details.format,
            total_samples = details.total_samples,
            "decoder stream opened"
        );
        Self {
            native,
            details,
            buffer: DecodeBuffer::new(),
            phase: Phase::Streaming,
            anomalies: 0,
        }
    }

    pub fn details(&self) -> &StreamDetails {
        &self.details
    }

    pub fn native(&self) -> &D {
        &self.native
    }

    /// Number of units skipped because of recoverable decode errors.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// True once the codec is drained and every byte has been read.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished && self.buffer.is_exhausted()
    }

    /// Fills `dest` with as many whole frames as are available and returns the
    /// number of bytes written.
    ///
    /// Returns less than requested only at end of stream; 0 means the stream is over.
    /// A destination smaller than one frame yields 0 without consuming anything.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let frame_bytes = self.details.format.frame_bytes();
        let requested = dest.len() / frame_bytes;
        let mut produced = 0;

        while produced < requested {
            if self.buffer.is_exhausted() {
                if !self.refill() {
                    break;
                }
                continue;
            }
            let offset = produced * frame_bytes;
            produced +=
                self.buffer
                    .drain_frames(&mut dest[offset..], frame_bytes, requested - produced);
        }

        trace!(requested, produced, "decoder read");
        produced * frame_bytes
    }

    /// Loads the next non-empty unit into the buffer. Returns false once nothing is left.
    fn refill(&mut self) -> bool {
        self.buffer.clear();
        while self.buffer.is_empty() {
            match self.phase {
                Phase::Streaming => match self.native.decode_unit(&mut self.buffer) {
                    Ok(UnitOutcome::Decoded) => {}
                    Ok(UnitOutcome::EndOfInput) => {
                        debug!("native input exhausted, draining codec");
                        self.phase = Phase::Draining;
                    }
                    Err(DecodeError::Recoverable(reason)) => {
                        self.anomalies += 1;
                        debug!(%reason, anomalies = self.anomalies, "skipping undecodable unit");
                    }
                    Err(err) => {
                        warn!(error = %err, "decoding stopped early");
                        self.buffer.clear();
                        self.phase = Phase::Finished;
                    }
                },
                Phase::Draining => {
                    if let Err(err) = self.native.flush(&mut self.buffer) {
                        warn!(error = %err, "codec flush failed");
                    }
                    self.phase = Phase::Finished;
                }
                Phase::Finished => return false,
            }
        }
        true
    }
}

/// Channel count as shown in stream descriptions: "1 channel", "6 channels".
pub fn channel_label(channels: u32) -> String {
    if channels == 1 {
        "1 channel".to_string()
    } else {
        format!("{channels} channels")
    }
}

/// The host-facing side of an open decoder.
pub trait AudioInput {
    fn format(&self) -> SampleFormat;
    fn total_samples(&self) -> u64;
    fn description(&self) -> &str;
    fn tags(&self) -> &TagMap;
    fn read(&mut self, dest: &mut [u8]) -> usize;

    /// Byte size of the whole stream, saturated at `u32::MAX`.
    fn output_size(&self) -> u32 {
        self.format().byte_size(self.total_samples())
    }
}

impl<D: NativeDecoder> AudioInput for StreamingDecoder<D> {
    fn format(&self) -> SampleFormat {
        self.details.format
    }

    fn total_samples(&self) -> u64 {
        self.details.total_samples
    }

    fn description(&self) -> &str {
        &self.details.description
    }

    fn tags(&self) -> &TagMap {
        &self.details.tags
    }

    fn read(&mut self, dest: &mut [u8]) -> usize {
        StreamingDecoder::read(self, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BitDepth;

    /// Emits units of increasing length, then optionally a flush tail.
    struct Scripted {
        units: Vec<Result<Vec<u8>, DecodeError>>,
        tail: Vec<u8>,
        flushes: u32,
        calls_after_end: u32,
        ended: bool,
    }

    impl Scripted {
        fn new(units: Vec<Result<Vec<u8>, DecodeError>>, tail: Vec<u8>) -> Self {
            Self {
                units,
                tail,
                flushes: 0,
                calls_after_end: 0,
                ended: false,
            }
        }
    }

    impl NativeDecoder for Scripted {
        fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
            if self.ended {
                self.calls_after_end += 1;
            }
            if self.units.is_empty() {
                self.ended = true;
                return Ok(UnitOutcome::EndOfInput);
            }
            let bytes = self.units.remove(0)?;
            out.push_bytes(&bytes);
            Ok(UnitOutcome::Decoded)
        }

        fn flush(&mut self, out: &mut DecodeBuffer) -> Result<(), DecodeError> {
            self.flushes += 1;
            out.push_bytes(&self.tail);
            Ok(())
        }
    }

    fn stereo16() -> SampleFormat {
        SampleFormat::new(BitDepth::S16, 2, 44_100).unwrap()
    }

    fn numbered(start: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| start.wrapping_add(i as u8)).collect()
    }

    fn units() -> Vec<Result<Vec<u8>, DecodeError>> {
        vec![
            Ok(numbered(0, 12)),
            Ok(Vec::new()),
            Ok(numbered(12, 40)),
            Ok(numbered(52, 4)),
        ]
    }

    fn read_all(stream: &mut StreamingDecoder<Scripted>, chunk: usize) -> Vec<u8> {
        let mut all = Vec::new();
        let mut dest = vec![0u8; chunk];
        loop {
            let n = stream.read(&mut dest);
            if n == 0 {
                break;
            }
            assert_eq!(n % 4, 0);
            all.extend_from_slice(&dest[..n]);
        }
        all
    }

    #[test]
    fn chunk_size_does_not_change_output() {
        let expected: Vec<u8> = numbered(0, 56).into_iter().chain(numbered(200, 8)).collect();
        for chunk in [4, 8, 12, 28, 64, 4096] {
            let native = Scripted::new(units(), numbered(200, 8));
            let mut stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 16, ""));
            assert_eq!(read_all(&mut stream, chunk), expected, "chunk {chunk}");
            assert!(stream.is_finished());
            assert_eq!(stream.native().flushes, 1);
        }
    }

    #[test]
    fn reads_only_whole_frames() {
        let native = Scripted::new(units(), Vec::new());
        let mut stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 14, ""));
        let mut dest = [0u8; 10];
        assert_eq!(stream.read(&mut dest), 8);
        let mut tiny = [0u8; 3];
        assert_eq!(stream.read(&mut tiny), 0);
        assert_eq!(stream.read(&mut dest), 8);
        assert_eq!(&dest[..8], &numbered(8, 8)[..]);
    }

    #[test]
    fn end_of_stream_is_sticky() {
        let native = Scripted::new(units(), Vec::new());
        let mut stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 14, ""));
        let mut dest = [0u8; 1024];
        assert_eq!(stream.read(&mut dest), 56);
        assert_eq!(stream.read(&mut dest), 0);
        assert_eq!(stream.read(&mut dest), 0);
        assert_eq!(stream.native().flushes, 1);
        assert_eq!(stream.native().calls_after_end, 0);
    }

    #[test]
    fn recoverable_errors_skip_the_unit() {
        let native = Scripted::new(
            vec![
                Ok(numbered(0, 4)),
                Err(DecodeError::Recoverable("bad crc".into())),
                Ok(numbered(4, 4)),
            ],
            Vec::new(),
        );
        let mut stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 2, ""));
        assert_eq!(read_all(&mut stream, 64), numbered(0, 8));
        assert_eq!(stream.anomalies(), 1);
    }

    #[test]
    fn fatal_errors_end_the_stream_without_flush() {
        let native = Scripted::new(
            vec![
                Ok(numbered(0, 4)),
                Err(DecodeError::Fatal("lost sync".into())),
                Ok(numbered(4, 4)),
            ],
            numbered(100, 4),
        );
        let mut stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 2, ""));
        assert_eq!(read_all(&mut stream, 64), numbered(0, 4));
        assert_eq!(stream.native().flushes, 0);
    }

    #[test]
    fn channel_labels() {
        assert_eq!(channel_label(1), "1 channel");
        assert_eq!(channel_label(2), "2 channels");
    }

    #[test]
    fn output_size_matches_format() {
        let native = Scripted::new(Vec::new(), Vec::new());
        let stream = StreamingDecoder::new(native, StreamDetails::new(stereo16(), 1000, "x"));
        assert_eq!(stream.output_size(), 4000);
        assert_eq!(stream.description(), "x");
    }
}
