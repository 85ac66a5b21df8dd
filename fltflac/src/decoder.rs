use std::{fs::File, io::Read, mem, path::Path};

use claxon::FlacReader;
use fltcore::{
    ChannelMix, Converter, DecodeBuffer, DecodeError, NativeDecoder, NativeParams, StreamDetails,
    StreamingDecoder, TagMap, UnitOutcome, channel_label, select_format,
};
use tracing::{debug, warn};

use crate::error::FlacError;

/// A FLAC stream decoded through the shared buffering state machine.
pub type FlacDecoder<R = File> = StreamingDecoder<FlacSource<R>>;

/// Decodes one FLAC block per unit.
pub struct FlacSource<R: Read> {
    reader: FlacReader<R>,
    converter: Converter,
    source_bits: u32,
    block_buffer: Vec<i32>,
    interleaved: Vec<i32>,
}

impl<R: Read> NativeDecoder for FlacSource<R> {
    fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
        let buffer = mem::take(&mut self.block_buffer);
        match self.reader.blocks().read_next_or_eof(buffer) {
            Ok(Some(block)) => {
                let frames = block.duration();
                let channels = block.channels();

                self.interleaved.clear();
                self.interleaved.reserve(frames as usize * channels as usize);
                for frame_idx in 0..frames {
                    for channel_idx in 0..channels {
                        self.interleaved.push(block.sample(channel_idx, frame_idx));
                    }
                }
                self.converter
                    .push_int(&self.interleaved, self.source_bits, out);

                self.block_buffer = block.into_buffer();
                Ok(UnitOutcome::Decoded)
            }
            Ok(None) => Ok(UnitOutcome::EndOfInput),
            Err(err) => {
                warn!(error = %err, "FLAC bitstream error");
                Err(DecodeError::Fatal(err.to_string()))
            }
        }
    }
}

/// Opens a FLAC file for decoding.
pub fn open_file(path: impl AsRef<Path>) -> Result<FlacDecoder<File>, FlacError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "opening FLAC file");
    from_reader(File::open(path)?)
}

/// True if `path` starts with a readable FLAC header.
pub fn understands_file(path: impl AsRef<Path>) -> bool {
    File::open(path.as_ref())
        .map_err(FlacError::from)
        .and_then(|file| FlacReader::new(file).map_err(FlacError::from))
        .is_ok()
}

/// Reads the FLAC headers from `reader` and prepares block-by-block decoding.
pub fn from_reader<R: Read>(reader: R) -> Result<FlacDecoder<R>, FlacError> {
    let reader = FlacReader::new(reader)?;
    let info = reader.streaminfo();

    // FLAC widths below 8 or between 8 and 16 widen to the next container.
    let container_bits = match info.bits_per_sample {
        0 => 0,
        1..=8 => 8,
        9..=16 => 16,
        bits => bits,
    };
    let params = NativeParams {
        channels: info.channels,
        sample_rate: info.sample_rate,
        bits_per_sample: Some(container_bits),
        bits_per_coded_sample: None,
        total_samples: info.samples.unwrap_or(0),
    };
    let format = select_format(&params)?;

    let mut tags = TagMap::new();
    for (name, value) in reader.tags() {
        tags.insert(name, value);
    }

    let description = format!(
        "{}\n{}",
        reader.vendor().unwrap_or("FLAC"),
        channel_label(info.channels)
    );

    debug!(
        sample_rate = info.sample_rate,
        channels = info.channels,
        bits_per_sample = info.bits_per_sample,
        total_samples = params.total_samples,
        canonical = %format,
        "FLAC stream opened"
    );

    let converter = Converter::new(
        format,
        ChannelMix::truncate(info.channels as usize, usize::from(format.channels())),
    );
    let source = FlacSource {
        reader,
        converter,
        source_bits: info.bits_per_sample,
        block_buffer: Vec::new(),
        interleaved: Vec::new(),
    };
    let details = StreamDetails::new(format, params.total_samples, description).with_tags(tags);
    Ok(StreamingDecoder::new(source, details))
}
