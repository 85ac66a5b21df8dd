use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use fltcore::{
    BitDepth, ChannelMix, Converter, DecodeBuffer, DecodeError, NativeDecoder, NativeParams,
    StreamDetails, StreamingDecoder, UnitOutcome, channel_label, select_format,
};
use opus::{Channels, Decoder as OpusDecoder, MSDecoder};
use tracing::{debug, trace};

use crate::{
    OPUS_RATE,
    error::OpusError,
    header::{OpusHead, OpusTags},
    ogg::{OggPacketReader, last_granule},
};

/// Maximum frames in one Opus packet at 48 kHz (120 ms).
const MAX_FRAME_SAMPLES: usize = 5760;

pub type OggOpusDecoder<R = BufReader<File>> = StreamingDecoder<OpusSource<R>>;

/// Mapping family 0 streams use the plain decoder, family 1 the multistream one.
enum Engine {
    Single(OpusDecoder),
    Multi(MSDecoder),
}

impl Engine {
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize, opus::Error> {
        match self {
            Engine::Single(decoder) => decoder.decode(packet, pcm, false),
            Engine::Multi(decoder) => decoder.decode(packet, pcm, false),
        }
    }

    fn decode_float(&mut self, packet: &[u8], pcm: &mut [f32]) -> Result<usize, opus::Error> {
        match self {
            Engine::Single(decoder) => decoder.decode_float(packet, pcm, false),
            Engine::Multi(decoder) => decoder.decode_float(packet, pcm, false),
        }
    }

    fn set_gain(&mut self, gain: i32) -> Result<(), opus::Error> {
        match self {
            Engine::Single(decoder) => decoder.set_gain(gain),
            Engine::Multi(decoder) => decoder.set_gain(gain),
        }
    }
}

/// Decodes one Ogg packet per unit.
///
/// Streams with more than two channels are decoded at their native width and
/// folded to stereo in Vorbis channel order.
pub struct OpusSource<R> {
    packets: OggPacketReader<R>,
    decoder: Engine,
    converter: Converter,
    channels: usize,
    float_output: bool,
    pre_skip: usize,
    /// Frames still to emit, `None` when the stream length is unknown.
    remaining: Option<u64>,
    pcm_float: Vec<f32>,
    pcm_int: Vec<i16>,
}

impl<R: Read> OpusSource<R> {
    fn decode_packet(&mut self, packet: &[u8]) -> Result<usize, opus::Error> {
        if self.float_output {
            self.decoder.decode_float(packet, &mut self.pcm_float)
        } else {
            self.decoder.decode(packet, &mut self.pcm_int)
        }
    }
}

impl<R: Read> NativeDecoder for OpusSource<R> {
    fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
        if self.remaining == Some(0) {
            return Ok(UnitOutcome::EndOfInput);
        }
        let packet = match self.packets.next_packet()? {
            Some(packet) => packet,
            None => return Ok(UnitOutcome::EndOfInput),
        };

        let decoded = self
            .decode_packet(&packet)
            .map_err(|err| DecodeError::Recoverable(err.to_string()))?;

        let skip = self.pre_skip.min(decoded);
        self.pre_skip -= skip;
        let mut end = decoded;
        if let Some(remaining) = self.remaining.as_mut() {
            let available = (decoded - skip) as u64;
            let keep = available.min(*remaining);
            *remaining -= keep;
            end = skip + keep as usize;
        }
        trace!(decoded, skip, end, "Opus packet decoded");

        let range = skip * self.channels..end * self.channels;
        if self.float_output {
            self.converter.push_float(&self.pcm_float[range], out);
        } else {
            self.converter.push_i16(&self.pcm_int[range], out);
        }
        Ok(UnitOutcome::Decoded)
    }
}

/// Opens an Ogg Opus file for decoding.
pub fn open_file(path: impl AsRef<Path>) -> Result<OggOpusDecoder, OpusError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "opening Ogg Opus file");

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let end_granule = last_granule(&mut file)?;
    let file = File::open(path)?;

    let mut packets = OggPacketReader::new(BufReader::new(file));
    let head_packet = packets
        .next_packet()?
        .ok_or_else(|| OpusError::Header("missing OpusHead packet".into()))?;
    let head = OpusHead::parse(&head_packet)?;
    let tags_packet = packets
        .next_packet()?
        .ok_or_else(|| OpusError::Header("missing OpusTags packet".into()))?;
    let tags = OpusTags::parse(&tags_packet)?;

    let total_samples = end_granule
        .map(|granule| granule.saturating_sub(u64::from(head.pre_skip)))
        .unwrap_or(0);
    let bitrate = if total_samples > 0 {
        (file_len as f64 * 8.0 * f64::from(OPUS_RATE) / total_samples as f64) as u64
    } else {
        0
    };

    let source = build_source(packets, &head, total_samples)?;
    let format = source.converter.format();

    let mut description = if tags.vendor.is_empty() {
        "Opus".to_string()
    } else {
        tags.vendor.clone()
    };
    description.push('\n');
    if bitrate > 0 {
        description.push_str(&format!("{} kbps, ", bitrate / 1000));
    }
    description.push_str(&channel_label(u32::from(format.channels())));

    debug!(
        channels = head.channels,
        pre_skip = head.pre_skip,
        total_samples,
        bitrate,
        canonical = %format,
        "Ogg Opus stream opened"
    );

    let details =
        StreamDetails::new(format, total_samples, description).with_tags(tags.tag_map());
    Ok(StreamingDecoder::new(source, details))
}

fn build_source<R: Read>(
    packets: OggPacketReader<R>,
    head: &OpusHead,
    total_samples: u64,
) -> Result<OpusSource<R>, OpusError> {
    let (mut decoder, mix) = match (head.mapping_family, &head.mapping, head.channels) {
        (0, _, 1) => (
            Engine::Single(OpusDecoder::new(OPUS_RATE, Channels::Mono)?),
            ChannelMix::identity(1),
        ),
        (0, _, 2) => (
            Engine::Single(OpusDecoder::new(OPUS_RATE, Channels::Stereo)?),
            ChannelMix::identity(2),
        ),
        (1, Some(mapping), channels @ 1..=8) => {
            let decoder = MSDecoder::new(
                OPUS_RATE,
                mapping.stream_count,
                mapping.coupled_count,
                &mapping.table,
            )?;
            debug!(
                streams = mapping.stream_count,
                coupled = mapping.coupled_count,
                channels,
                "multistream Opus, folding to stereo"
            );
            (
                Engine::Multi(decoder),
                ChannelMix::vorbis_stereo(usize::from(channels)),
            )
        }
        (family, _, channels) => {
            return Err(OpusError::Unsupported(format!(
                "channel mapping family {family} with {channels} channels is not supported"
            )));
        }
    };

    let params = NativeParams {
        channels: u32::from(head.channels),
        sample_rate: OPUS_RATE,
        bits_per_sample: None,
        bits_per_coded_sample: None,
        total_samples,
    };
    let format = select_format(&params)?;

    if head.output_gain != 0 {
        decoder.set_gain(i32::from(head.output_gain))?;
    }

    let channels = usize::from(head.channels);
    let float_output = format.bit_depth() == BitDepth::F32;
    let buffer_len = MAX_FRAME_SAMPLES * channels;
    Ok(OpusSource {
        packets,
        decoder,
        converter: Converter::new(format, mix),
        channels,
        float_output,
        pre_skip: usize::from(head.pre_skip),
        remaining: (total_samples > 0).then_some(total_samples),
        pcm_float: if float_output { vec![0.0; buffer_len] } else { Vec::new() },
        pcm_int: if float_output { Vec::new() } else { vec![0; buffer_len] },
    })
}

/// True if `path` begins with an Ogg page carrying an OpusHead packet.
pub fn understands_file(path: impl AsRef<Path>) -> bool {
    let Ok(file) = File::open(path.as_ref()) else {
        return false;
    };
    let mut packets = OggPacketReader::new(BufReader::new(file));
    matches!(
        packets.next_packet(),
        Ok(Some(packet)) if OpusHead::parse(&packet).is_ok()
    )
}
