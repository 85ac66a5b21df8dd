//! Two-phase encoders.
//!
//! A host creates an encoder, may add tags, and then writes audio. Codecs that store
//! tags in their stream header cannot start until every tag is known, so codec setup
//! is deferred to the first write. [`PendingEncoder`] and [`ActiveEncoder`] model the
//! two phases as separate types; [`LazyEncoder`] wraps them for hosts that drive an
//! encoder through a single handle.

use std::mem;

use tracing::{debug, warn};

use crate::convert::CanonicalSamples;
use crate::error::EncodeError;
use crate::format::SampleFormat;
use crate::tags::TagMap;

/// Codec configuration that has not produced any output yet.
pub trait EncoderSetup {
    type Writer: NativeWriter;

    /// Writes the stream header, including `tags`, and returns the open writer.
    fn start(self, format: SampleFormat, tags: &TagMap) -> Result<Self::Writer, EncodeError>;
}

/// An initialised codec accepting canonical samples.
pub trait NativeWriter {
    /// Encodes whole frames.
    fn write_samples(&mut self, samples: &CanonicalSamples<'_>) -> Result<(), EncodeError>;

    /// Flushes buffered audio and completes the stream. Called at most once.
    fn finish(&mut self) -> Result<(), EncodeError>;
}

/// First phase: tags may still be added.
pub struct PendingEncoder<S> {
    setup: S,
    format: SampleFormat,
    tags: TagMap,
}

impl<S: EncoderSetup> PendingEncoder<S> {
    pub fn new(setup: S, format: SampleFormat) -> Self {
        Self {
            setup,
            format,
            tags: TagMap::new(),
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Records a tag. Returns false if a tag with the same name is already set.
    pub fn add_tag(&mut self, name: &str, value: &str) -> bool {
        self.tags.insert(name, value)
    }

    /// Creates the codec and writes the stream header.
    pub fn start(self) -> Result<ActiveEncoder<S::Writer>, EncodeError> {
        debug!(format = %self.format, tags = self.tags.len(), "starting encoder");
        let writer = self.setup.start(self.format, &self.tags)?;
        Ok(ActiveEncoder::new(writer, self.format))
    }
}

/// Second phase: audio is flowing and the tag set is frozen.
///
/// A host write may end in the middle of a frame. The fragment is held back and
/// prefixed to the next write. A fragment still held at finish is dropped.
pub struct ActiveEncoder<W: NativeWriter> {
    writer: W,
    format: SampleFormat,
    carry: Vec<u8>,
    frames_written: u64,
    finished: bool,
}

impl<W: NativeWriter> ActiveEncoder<W> {
    pub fn new(writer: W, format: SampleFormat) -> Self {
        Self {
            writer,
            format,
            carry: Vec::new(),
            frames_written: 0,
            finished: false,
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Encodes every whole frame in `carry + bytes` and returns `bytes.len()`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, EncodeError> {
        if self.finished {
            return Err(EncodeError::NotStreaming);
        }
        let frame_bytes = self.format.frame_bytes();

        let result = if self.carry.is_empty() {
            let whole = bytes.len() / frame_bytes * frame_bytes;
            let result = self.encode(&bytes[..whole]);
            self.carry.extend_from_slice(&bytes[whole..]);
            result
        } else {
            self.carry.extend_from_slice(bytes);
            let whole = self.carry.len() / frame_bytes * frame_bytes;
            let samples = CanonicalSamples::new(self.format, &self.carry[..whole]);
            let result = if samples.is_empty() {
                Ok(())
            } else {
                self.writer.write_samples(&samples)
            };
            self.frames_written += (whole / frame_bytes) as u64;
            self.carry.drain(..whole);
            result
        };

        result.map(|()| bytes.len())
    }

    fn encode(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let samples = CanonicalSamples::new(self.format, bytes);
        self.frames_written += samples.frames() as u64;
        self.writer.write_samples(&samples)
    }

    /// Flushes the codec and completes the output.
    pub fn finish(mut self) -> Result<(), EncodeError> {
        self.finish_in_place()
    }

    fn finish_in_place(&mut self) -> Result<(), EncodeError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if !self.carry.is_empty() {
            debug!(bytes = self.carry.len(), "dropping incomplete trailing frame");
            self.carry.clear();
        }
        debug!(frames = self.frames_written, "finishing encoder");
        self.writer.finish()
    }
}

impl<W: NativeWriter> Drop for ActiveEncoder<W> {
    fn drop(&mut self) {
        if let Err(err) = self.finish_in_place() {
            warn!(error = %err, "encoder finalisation failed during drop");
        }
    }
}

/// Lifecycle phase of a [`LazyEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderPhase {
    Uninitialized,
    Streaming,
    Failed,
    Finalized,
}

enum State<S: EncoderSetup> {
    Uninitialized(PendingEncoder<S>),
    Streaming(ActiveEncoder<S::Writer>),
    Failed,
    Finalized,
}

/// Single-handle encoder that starts its codec on the first write.
///
/// A failed start is permanent: every later write reports 0 bytes.
pub struct LazyEncoder<S: EncoderSetup> {
    state: State<S>,
    format: SampleFormat,
}

impl<S: EncoderSetup> LazyEncoder<S> {
    pub fn new(setup: S, format: SampleFormat) -> Self {
        Self {
            state: State::Uninitialized(PendingEncoder::new(setup, format)),
            format,
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn phase(&self) -> EncoderPhase {
        match self.state {
            State::Uninitialized(_) => EncoderPhase::Uninitialized,
            State::Streaming(_) => EncoderPhase::Streaming,
            State::Failed => EncoderPhase::Failed,
            State::Finalized => EncoderPhase::Finalized,
        }
    }

    /// Records a tag while the encoder is still uninitialised.
    ///
    /// Returns false for a name that is already set, and once streaming has started
    /// since the header is already written.
    pub fn add_tag(&mut self, name: &str, value: &str) -> bool {
        match &mut self.state {
            State::Uninitialized(pending) => pending.add_tag(name, value),
            _ => {
                warn!(tag = name, "tag ignored, encoder already started");
                false
            }
        }
    }

    /// Encodes `bytes` and returns how many were accepted: all of them on success,
    /// 0 on failure.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if matches!(self.state, State::Uninitialized(_)) {
            self.state = match mem::replace(&mut self.state, State::Failed) {
                State::Uninitialized(pending) => match pending.start() {
                    Ok(active) => State::Streaming(active),
                    Err(err) => {
                        warn!(error = %err, "encoder initialisation failed");
                        State::Failed
                    }
                },
                other => other,
            };
        }

        match &mut self.state {
            State::Streaming(active) => match active.write(bytes) {
                Ok(written) => written,
                Err(err) => {
                    warn!(error = %err, "encoder write failed");
                    0
                }
            },
            _ => 0,
        }
    }

    /// Completes the output. An encoder that never received audio writes nothing.
    pub fn finish(&mut self) -> Result<(), EncodeError> {
        match mem::replace(&mut self.state, State::Finalized) {
            State::Streaming(active) => active.finish(),
            State::Failed => {
                self.state = State::Failed;
                Err(EncodeError::NotStreaming)
            }
            State::Uninitialized(_) | State::Finalized => Ok(()),
        }
    }
}

/// The host-facing side of an open encoder.
pub trait AudioOutput {
    fn format(&self) -> SampleFormat;
    fn add_tag(&mut self, name: &str, value: &str) -> bool;
    fn write(&mut self, bytes: &[u8]) -> usize;
    fn finish(&mut self) -> Result<(), EncodeError>;
}

impl<S: EncoderSetup> AudioOutput for LazyEncoder<S> {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn add_tag(&mut self, name: &str, value: &str) -> bool {
        LazyEncoder::add_tag(self, name, value)
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        LazyEncoder::write(self, bytes)
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        LazyEncoder::finish(self)
    }
}
