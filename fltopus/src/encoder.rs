use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use fltcore::{CanonicalSamples, EncodeError, EncoderSetup, NativeWriter, SampleFormat, TagMap};
use opus::{Application, Bitrate, Channels, Encoder as OpusEncoder};
use tracing::debug;

use crate::{
    OPUS_RATE,
    error::OpusError,
    header::{OpusHead, OpusTags},
    ogg::OggPageWriter,
    resample::Resampler,
};

/// 20 ms at 48 kHz.
const FRAME_SAMPLES: usize = 960;
/// Largest packet libopus is asked to produce.
const MAX_PACKET_BYTES: usize = 4000;
/// Granule distance after which the current page is closed.
const PAGE_SPAN: u64 = OPUS_RATE as u64;

pub const MIN_BITRATE_KBPS: u32 = 8;
pub const MAX_BITRATE_KBPS: u32 = 256;
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

/// Version string of the linked libopus.
pub fn version() -> String {
    opus::version().to_string()
}

#[derive(Debug, Clone)]
pub struct OpusEncoderOptions {
    /// Target bitrate, clamped to 8..=256 kbps.
    pub bitrate_kbps: u32,
}

impl Default for OpusEncoderOptions {
    fn default() -> Self {
        Self {
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

enum Target {
    Path(PathBuf),
    Sink(Box<dyn Write>),
}

/// Output target and options for an Ogg Opus stream that has not started yet.
pub struct OpusSetup {
    target: Target,
    options: OpusEncoderOptions,
}

impl OpusSetup {
    /// Writes to `path`. The file is created when the stream starts.
    pub fn to_file(path: impl Into<PathBuf>, options: OpusEncoderOptions) -> Self {
        Self {
            target: Target::Path(path.into()),
            options,
        }
    }

    pub fn to_sink<W: Write + 'static>(sink: W, options: OpusEncoderOptions) -> Self {
        Self {
            target: Target::Sink(Box::new(sink)),
            options,
        }
    }
}

impl EncoderSetup for OpusSetup {
    type Writer = OpusWriter;

    fn start(self, format: SampleFormat, tags: &TagMap) -> Result<OpusWriter, EncodeError> {
        let sink: Box<dyn Write> = match self.target {
            Target::Path(path) => {
                debug!(path = %path.display(), "creating Ogg Opus output");
                Box::new(BufWriter::new(File::create(&path)?))
            }
            Target::Sink(sink) => sink,
        };
        OpusWriter::init(sink, format, &self.options, tags).map_err(EncodeError::from)
    }
}

/// An Ogg Opus stream being written.
pub struct OpusWriter {
    encoder: OpusEncoder,
    pages: OggPageWriter<Box<dyn Write>>,
    resampler: Option<Resampler>,
    channels: usize,
    source_rate: u32,
    pre_skip: u64,
    /// Interleaved 48 kHz samples not yet encoded.
    pending: Vec<f32>,
    resampled: Vec<f32>,
    packet: Vec<u8>,
    source_frames: u64,
    granule: u64,
    page_start: u64,
}

impl OpusWriter {
    fn init(
        sink: Box<dyn Write>,
        format: SampleFormat,
        options: &OpusEncoderOptions,
        tags: &TagMap,
    ) -> Result<Self, OpusError> {
        let channels = usize::from(format.channels());
        let channels_enum = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(OpusError::Unsupported(format!(
                    "unsupported channel count: {other}"
                )));
            }
        };

        let bitrate = options
            .bitrate_kbps
            .clamp(MIN_BITRATE_KBPS, MAX_BITRATE_KBPS);
        let mut encoder = OpusEncoder::new(OPUS_RATE, channels_enum, Application::Audio)?;
        encoder.set_bitrate(Bitrate::Bits(1000 * bitrate as i32))?;
        let pre_skip = encoder.get_lookahead()?.max(0) as u16;

        let resampler = if format.sample_rate() == OPUS_RATE {
            None
        } else {
            Some(Resampler::new(format.sample_rate(), OPUS_RATE, channels)?)
        };

        let head = OpusHead {
            version: 1,
            channels: channels as u8,
            pre_skip,
            input_sample_rate: format.sample_rate(),
            output_gain: 0,
            mapping_family: 0,
            mapping: None,
        };
        let comments = OpusTags::new(version(), tags);

        let mut pages = OggPageWriter::new(sink, stream_serial());
        pages.write_packet(&head.to_bytes(), 0)?;
        pages.flush_page()?;
        pages.write_packet(&comments.to_bytes(), 0)?;
        pages.flush_page()?;

        debug!(
            channels,
            source_rate = format.sample_rate(),
            bitrate_kbps = bitrate,
            pre_skip,
            tags = tags.len(),
            "Opus encoder initialised"
        );

        Ok(Self {
            encoder,
            pages,
            resampler,
            channels,
            source_rate: format.sample_rate(),
            pre_skip: u64::from(pre_skip),
            pending: Vec::new(),
            resampled: Vec::new(),
            packet: vec![0; MAX_PACKET_BYTES],
            source_frames: 0,
            granule: 0,
            page_start: 0,
        })
    }

    /// Encodes every whole 20 ms frame held in `pending`.
    fn drain_frames(&mut self) -> Result<(), OpusError> {
        let frame_len = FRAME_SAMPLES * self.channels;
        let mut consumed = 0;
        while self.pending.len() - consumed >= frame_len {
            let len = self
                .encoder
                .encode_float(&self.pending[consumed..consumed + frame_len], &mut self.packet)?;
            consumed += frame_len;
            self.granule += FRAME_SAMPLES as u64;
            self.pages.write_packet(&self.packet[..len], self.granule)?;
            if self.granule - self.page_start >= PAGE_SPAN {
                self.pages.flush_page()?;
                self.page_start = self.granule;
            }
        }
        self.pending.drain(..consumed);
        Ok(())
    }

    fn push(&mut self, samples: &[f32]) -> Result<(), OpusError> {
        match self.resampler.as_mut() {
            Some(resampler) => {
                self.resampled.clear();
                resampler.process(samples, &mut self.resampled)?;
                self.pending.extend_from_slice(&self.resampled);
            }
            None => self.pending.extend_from_slice(samples),
        }
        self.drain_frames()
    }

    fn finish_stream(&mut self) -> Result<(), OpusError> {
        if let Some(resampler) = self.resampler.as_mut() {
            self.resampled.clear();
            resampler.flush(&mut self.resampled)?;
            self.pending.extend_from_slice(&self.resampled);
        }

        let output_frames = (self.source_frames as u128 * u128::from(OPUS_RATE)
            / u128::from(self.source_rate)) as u64;
        let end = self.pre_skip + output_frames;

        let frame_len = FRAME_SAMPLES * self.channels;
        while self.granule < end {
            let available = self.pending.len().min(frame_len);
            let mut frame = self.pending[..available].to_vec();
            frame.resize(frame_len, 0.0);
            self.pending.drain(..available);

            let len = self.encoder.encode_float(&frame, &mut self.packet)?;
            self.granule += FRAME_SAMPLES as u64;
            self.pages
                .write_packet(&self.packet[..len], self.granule.min(end))?;
        }
        self.pages.finish()?;
        debug!(frames = output_frames, end_granule = end, "Opus stream finished");
        Ok(())
    }
}

impl NativeWriter for OpusWriter {
    fn write_samples(&mut self, samples: &CanonicalSamples<'_>) -> Result<(), EncodeError> {
        self.source_frames += samples.frames() as u64;
        let unit = samples.to_unit_f32();
        self.push(&unit).map_err(EncodeError::from)
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        self.finish_stream().map_err(EncodeError::from)
    }
}

fn stream_serial() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0x464c_5430)
}
