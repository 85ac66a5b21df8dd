use std::{fs::File, io::ErrorKind, path::Path};

use fltcore::{
    ChannelMix, Converter, DOWNMIX_GAIN, DecodeBuffer, DecodeError, NativeDecoder, NativeParams,
    StreamDetails, StreamingDecoder, TagMap, UnitOutcome, channel_label, select_format,
};
use symphonia::core::{
    audio::{Channels, SampleBuffer},
    codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::MediaSourceStream,
    meta::{MetadataOptions, MetadataRevision, StandardTagKey, Value},
    probe::Hint,
};
use tracing::{debug, warn};

use crate::error::MediaError;

/// Any stream symphonia can demux and decode.
pub type MediaDecoder = StreamingDecoder<MediaSource>;

/// Decodes one container packet of the selected track per unit.
pub struct MediaSource {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    converter: Converter,
    samples: Option<SampleBuffer<f32>>,
}

impl MediaSource {
    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

impl NativeDecoder for MediaSource {
    fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
        let packet = loop {
            match self.reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => break packet,
                Ok(_) => continue,
                Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(UnitOutcome::EndOfInput);
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("container requested a decoder reset, ending stream");
                    return Ok(UnitOutcome::EndOfInput);
                }
                Err(err) => return Err(DecodeError::Fatal(err.to_string())),
            }
        };

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                return Err(DecodeError::Recoverable(reason.to_string()));
            }
            Err(SymphoniaError::IoError(err)) => {
                return Err(DecodeError::Recoverable(err.to_string()));
            }
            Err(err) => return Err(DecodeError::Fatal(err.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels != self.converter.mix().source_channels() {
            return Err(DecodeError::Fatal(format!(
                "channel count changed mid-stream to {channels}"
            )));
        }

        let needed = decoded.capacity() * channels;
        if self.samples.as_ref().is_some_and(|b| b.capacity() < needed) {
            self.samples = None;
        }
        let buffer = self
            .samples
            .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        buffer.copy_interleaved_ref(decoded);
        self.converter.push_float(buffer.samples(), out);
        Ok(UnitOutcome::Decoded)
    }

    fn flush(&mut self, _out: &mut DecodeBuffer) -> Result<(), DecodeError> {
        let result = self.decoder.finalize();
        if result.verify_ok == Some(false) {
            warn!(track = self.track_id, "decoded stream failed verification");
        }
        Ok(())
    }
}

/// Opens `path` with any demuxer and codec compiled into symphonia.
pub fn open_file(path: impl AsRef<Path>) -> Result<MediaDecoder, MediaError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "opening media file");

    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| MediaError::Unrecognized(err.to_string()))?;

    let mut tags = TagMap::new();
    if let Some(metadata) = detected.metadata.get() {
        if let Some(revision) = metadata.current() {
            collect_tags(revision, &mut tags);
        }
    }
    let mut reader = detected.format;
    if let Some(revision) = reader.metadata().current() {
        collect_tags(revision, &mut tags);
    }

    let track = reader
        .default_track()
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .or_else(|| {
            reader
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        })
        .ok_or(MediaError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let layout = codec_params.channels;
    let source_channels = layout.map(|c| c.count()).unwrap_or(0);
    let sample_rate = codec_params.sample_rate.unwrap_or(0);
    let total_samples = total_frames(&codec_params);
    let params = NativeParams {
        channels: source_channels as u32,
        sample_rate,
        bits_per_sample: codec_params.bits_per_sample,
        bits_per_coded_sample: codec_params.bits_per_coded_sample,
        total_samples,
    };
    let format = select_format(&params)?;

    let registry = symphonia::default::get_codecs();
    let decoder = registry
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|err| MediaError::Codec(err.to_string()))?;

    let codec_name = registry
        .get_codec(codec_params.codec)
        .map(|descriptor| descriptor.long_name)
        .unwrap_or("Symphonia");
    let mut description = format!("{codec_name}\n");
    if let Some(kbps) = estimated_kbps(file_len, total_samples, sample_rate) {
        description.push_str(&format!("{kbps} kbps, "));
    }
    description.push_str(&channel_label(source_channels as u32));

    let mix = match layout {
        Some(layout) if source_channels > 2 => downmix(layout),
        _ => ChannelMix::truncate(source_channels, usize::from(format.channels())),
    };

    debug!(
        codec = codec_name,
        sample_rate,
        channels = source_channels,
        bits_per_sample = ?codec_params.bits_per_sample,
        total_samples,
        canonical = %format,
        "media stream opened"
    );

    let source = MediaSource {
        reader,
        decoder,
        track_id,
        converter: Converter::new(format, mix),
        samples: None,
    };
    let details = StreamDetails::new(format, total_samples, description).with_tags(tags);
    Ok(StreamingDecoder::new(source, details))
}

/// True if symphonia finds a decodable audio track in `path`.
pub fn understands_file(path: impl AsRef<Path>) -> bool {
    open_file(path).is_ok()
}

fn total_frames(params: &CodecParameters) -> u64 {
    let (Some(n_frames), Some(rate)) = (params.n_frames, params.sample_rate) else {
        return 0;
    };
    match params.time_base {
        Some(time_base) if time_base.denom != rate || time_base.numer != 1 => {
            let time = time_base.calc_time(n_frames);
            ((time.seconds as f64 + time.frac) * f64::from(rate)).round() as u64
        }
        _ => n_frames,
    }
}

fn estimated_kbps(file_len: u64, total_samples: u64, sample_rate: u32) -> Option<u64> {
    if file_len == 0 || total_samples == 0 || sample_rate == 0 {
        return None;
    }
    let seconds = total_samples as f64 / f64::from(sample_rate);
    Some((file_len as f64 * 8.0 / seconds / 1000.0).round() as u64)
}

/// Stereo weights for every channel of `layout`, in interleaving order.
fn downmix(layout: Channels) -> ChannelMix {
    let weights = layout.iter().map(stereo_weights).collect();
    ChannelMix::stereo(weights)
}

fn stereo_weights(channel: Channels) -> [f32; 2] {
    if channel == Channels::FRONT_LEFT {
        [1.0, 0.0]
    } else if channel == Channels::FRONT_RIGHT {
        [0.0, 1.0]
    } else if channel == Channels::LFE1 || channel == Channels::LFE2 {
        [0.0, 0.0]
    } else if channel.intersects(
        Channels::REAR_LEFT
            | Channels::SIDE_LEFT
            | Channels::FRONT_LEFT_CENTRE
            | Channels::FRONT_LEFT_WIDE
            | Channels::FRONT_LEFT_HIGH
            | Channels::REAR_LEFT_CENTRE
            | Channels::TOP_FRONT_LEFT
            | Channels::TOP_REAR_LEFT,
    ) {
        [DOWNMIX_GAIN, 0.0]
    } else if channel.intersects(
        Channels::REAR_RIGHT
            | Channels::SIDE_RIGHT
            | Channels::FRONT_RIGHT_CENTRE
            | Channels::FRONT_RIGHT_WIDE
            | Channels::FRONT_RIGHT_HIGH
            | Channels::REAR_RIGHT_CENTRE
            | Channels::TOP_FRONT_RIGHT
            | Channels::TOP_REAR_RIGHT,
    ) {
        [0.0, DOWNMIX_GAIN]
    } else {
        [DOWNMIX_GAIN, DOWNMIX_GAIN]
    }
}

fn collect_tags(revision: &MetadataRevision, tags: &mut TagMap) {
    for tag in revision.tags() {
        let value = match &tag.value {
            Value::String(s) => s.clone(),
            Value::UnsignedInt(n) => n.to_string(),
            Value::SignedInt(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            _ => continue,
        };
        let name = tag.std_key.and_then(standard_name).unwrap_or(tag.key.as_str());
        tags.insert(name, &value);
    }
}

fn standard_name(key: StandardTagKey) -> Option<&'static str> {
    let name = match key {
        StandardTagKey::Artist => "ARTIST",
        StandardTagKey::Album => "ALBUM",
        StandardTagKey::Comment => "COMMENT",
        StandardTagKey::Copyright => "COPYRIGHT",
        StandardTagKey::Date | StandardTagKey::ReleaseDate => "DATE",
        StandardTagKey::Engineer => "ENGINEER",
        StandardTagKey::Genre => "GENRE",
        StandardTagKey::MediaFormat => "MEDIUM",
        StandardTagKey::Encoder | StandardTagKey::EncodedBy => "SOFTWARE",
        StandardTagKey::TrackTitle => "TITLE",
        StandardTagKey::TrackNumber => "TRACKNUMBER",
        _ => return None,
    };
    Some(name)
}
