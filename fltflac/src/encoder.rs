use std::{
    ffi::{CStr, CString, c_void},
    fs::File,
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::PathBuf,
};

use fltcore::{
    BitDepth, CanonicalSamples, EncodeError, EncoderSetup, NativeWriter, SampleFormat, TagMap,
};
use tracing::{debug, warn};

use crate::error::FlacError;

const PADDING_BYTES: u32 = 1024;
const SEEK_POINT_SPACING_SECS: u32 = 10;
const MAX_COMPRESSION_LEVEL: u32 = 8;

/// Libflac identification string.
pub fn version() -> String {
    // SAFETY: FLAC__VERSION_STRING points to a static NUL-terminated string.
    let version = unsafe { CStr::from_ptr(libflac_sys::FLAC__VERSION_STRING) };
    format!("Free Lossless Audio Codec {}", version.to_string_lossy())
}

#[derive(Debug, Clone)]
pub struct FlacEncoderOptions {
    /// 0 (fastest) to 8 (smallest). Larger values are clamped.
    pub compression_level: u32,
    pub verify: bool,
    /// Expected length in frames, 0 when unknown. Sizes the seek table.
    pub total_samples: u64,
}

impl Default for FlacEncoderOptions {
    fn default() -> Self {
        Self {
            compression_level: 5,
            verify: true,
            total_samples: 0,
        }
    }
}

/// Anything libFLAC can write to and seek back into when finishing the stream.
pub trait FlacSink: Write + Seek {}

impl<T: Write + Seek> FlacSink for T {}

enum Target {
    Path(PathBuf),
    Sink(Box<dyn FlacSink>),
}

/// Output target and options for a FLAC stream that has not started yet.
pub struct FlacSetup {
    target: Target,
    options: FlacEncoderOptions,
}

impl FlacSetup {
    /// Writes to `path`. The file is created when the stream starts.
    pub fn to_file(path: impl Into<PathBuf>, options: FlacEncoderOptions) -> Self {
        Self {
            target: Target::Path(path.into()),
            options,
        }
    }

    pub fn to_sink<W: Write + Seek + 'static>(sink: W, options: FlacEncoderOptions) -> Self {
        Self {
            target: Target::Sink(Box::new(sink)),
            options,
        }
    }

    pub fn options(&self) -> &FlacEncoderOptions {
        &self.options
    }
}

fn native_bits(depth: BitDepth) -> u32 {
    match depth {
        BitDepth::U8 => 8,
        BitDepth::S16 => 16,
        BitDepth::F32 => 24,
    }
}

impl EncoderSetup for FlacSetup {
    type Writer = FlacWriter;

    fn start(self, format: SampleFormat, tags: &TagMap) -> Result<FlacWriter, EncodeError> {
        let sink: Box<dyn FlacSink> = match self.target {
            Target::Path(path) => {
                debug!(path = %path.display(), "creating FLAC output");
                Box::new(BufWriter::new(File::create(&path)?))
            }
            Target::Sink(sink) => sink,
        };
        FlacWriter::init(sink, format, &self.options, tags).map_err(EncodeError::from)
    }
}

/// An initialised libFLAC stream encoder.
pub struct FlacWriter {
    // Field order is drop order: the encoder may still call back into the sink and
    // read the metadata blocks while it is deleted.
    encoder: EncoderHandle,
    _metadata: Vec<MetadataBlock>,
    client: Box<SinkState>,
    bits: u32,
    channels: u32,
}

impl FlacWriter {
    fn init(
        sink: Box<dyn FlacSink>,
        format: SampleFormat,
        options: &FlacEncoderOptions,
        tags: &TagMap,
    ) -> Result<Self, FlacError> {
        use libflac_sys::*;

        let bits = native_bits(format.bit_depth());
        let channels = u32::from(format.channels());
        let level = options.compression_level.min(MAX_COMPRESSION_LEVEL);

        // Declared before the encoder so both outlive it on every early return.
        let mut client = Box::new(SinkState { sink, error: None });
        let mut metadata = Vec::new();

        unsafe {
            let ptr = FLAC__stream_encoder_new();
            if ptr.is_null() {
                return Err(FlacError::LibFlacInit(
                    "FLAC__stream_encoder_new returned null".into(),
                ));
            }
            let encoder = EncoderHandle { ptr };

            let ensure = |ok: FLAC__bool, msg: &str| {
                if ok == 0 {
                    Err(FlacError::LibFlacInit(msg.into()))
                } else {
                    Ok(())
                }
            };

            ensure(
                FLAC__stream_encoder_set_channels(ptr, channels),
                "set_channels failed",
            )?;
            ensure(
                FLAC__stream_encoder_set_bits_per_sample(ptr, bits),
                "set_bits_per_sample failed",
            )?;
            ensure(
                FLAC__stream_encoder_set_sample_rate(ptr, format.sample_rate()),
                "set_sample_rate failed",
            )?;
            ensure(
                FLAC__stream_encoder_set_compression_level(ptr, level),
                "set_compression_level failed",
            )?;
            ensure(
                FLAC__stream_encoder_set_verify(ptr, if options.verify { 1 } else { 0 }),
                "set_verify failed",
            )?;
            if options.total_samples > 0 {
                ensure(
                    FLAC__stream_encoder_set_total_samples_estimate(ptr, options.total_samples),
                    "set_total_samples_estimate failed",
                )?;
            }

            if options.total_samples > 0 {
                let table = MetadataBlock::new(FLAC__METADATA_TYPE_SEEKTABLE)?;
                let spacing = format.sample_rate().saturating_mul(SEEK_POINT_SPACING_SECS);
                ensure(
                    FLAC__metadata_object_seektable_template_append_spaced_points_by_samples(
                        table.ptr,
                        spacing,
                        options.total_samples,
                    ),
                    "seek table template failed",
                )?;
                ensure(
                    FLAC__metadata_object_seektable_template_sort(table.ptr, 0),
                    "seek table sort failed",
                )?;
                metadata.push(table);
            }

            if !tags.is_empty() {
                let comments = MetadataBlock::new(FLAC__METADATA_TYPE_VORBIS_COMMENT)?;
                for (name, value) in tags.iter() {
                    append_comment(comments.ptr, name, value)?;
                }
                metadata.push(comments);
            }

            let padding = MetadataBlock::new(FLAC__METADATA_TYPE_PADDING)?;
            (*padding.ptr).length = PADDING_BYTES;
            metadata.push(padding);

            let mut blocks: Vec<*mut FLAC__StreamMetadata> =
                metadata.iter().map(|block| block.ptr).collect();
            ensure(
                FLAC__stream_encoder_set_metadata(ptr, blocks.as_mut_ptr(), blocks.len() as u32),
                "set_metadata failed",
            )?;

            let init_status = FLAC__stream_encoder_init_stream(
                ptr,
                Some(write_callback),
                Some(seek_callback),
                Some(tell_callback),
                None,
                &mut *client as *mut SinkState as *mut c_void,
            );
            if init_status != FLAC__STREAM_ENCODER_INIT_STATUS_OK {
                if let Some(err) = client.error.take() {
                    return Err(FlacError::Io(err));
                }
                return Err(FlacError::LibFlacInit(format!(
                    "init_stream failed: status {init_status}"
                )));
            }

            debug!(
                bits,
                channels,
                sample_rate = format.sample_rate(),
                level,
                tags = tags.len(),
                "libFLAC encoder initialised"
            );

            Ok(Self {
                encoder,
                _metadata: metadata,
                client,
                bits,
                channels,
            })
        }
    }

    fn take_error(&mut self, fallback: &str) -> FlacError {
        match self.client.error.take() {
            Some(err) => FlacError::Io(err),
            None => FlacError::Encode(fallback.into()),
        }
    }
}

impl NativeWriter for FlacWriter {
    fn write_samples(&mut self, samples: &CanonicalSamples<'_>) -> Result<(), EncodeError> {
        let native = samples.to_i32(self.bits);
        let frames = (native.len() / self.channels as usize) as u32;
        if frames == 0 {
            return Ok(());
        }
        let ok = unsafe {
            libflac_sys::FLAC__stream_encoder_process_interleaved(
                self.encoder.ptr,
                native.as_ptr(),
                frames,
            )
        };
        if ok == 0 {
            return Err(self.take_error("libFLAC reported encode failure").into());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        let ok = unsafe { libflac_sys::FLAC__stream_encoder_finish(self.encoder.ptr) };
        if ok == 0 {
            return Err(self.take_error("libFLAC failed to finalize stream").into());
        }
        if let Some(err) = self.client.error.take() {
            return Err(EncodeError::Io(err));
        }
        self.client.sink.flush()?;
        Ok(())
    }
}

unsafe fn append_comment(
    block: *mut libflac_sys::FLAC__StreamMetadata,
    name: &str,
    value: &str,
) -> Result<(), FlacError> {
    use libflac_sys::*;

    let (Ok(c_name), Ok(c_value)) = (CString::new(name), CString::new(value)) else {
        warn!(tag = name, "tag contains a NUL byte, skipped");
        return Ok(());
    };

    unsafe {
        let mut entry: FLAC__StreamMetadata_VorbisComment_Entry = std::mem::zeroed();
        if FLAC__metadata_object_vorbiscomment_entry_from_name_value_pair(
            &mut entry,
            c_name.as_ptr(),
            c_value.as_ptr(),
        ) == 0
        {
            warn!(tag = name, "tag is not a valid Vorbis comment, skipped");
            return Ok(());
        }
        if FLAC__metadata_object_vorbiscomment_append_comment(block, entry, 0) == 0 {
            libc::free(entry.entry as *mut c_void);
            return Err(FlacError::LibFlacInit("append_comment failed".into()));
        }
    }
    Ok(())
}

struct SinkState {
    sink: Box<dyn FlacSink>,
    error: Option<io::Error>,
}

struct EncoderHandle {
    ptr: *mut libflac_sys::FLAC__StreamEncoder,
}

impl Drop for EncoderHandle {
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                libflac_sys::FLAC__stream_encoder_delete(self.ptr);
            }
        }
    }
}

struct MetadataBlock {
    ptr: *mut libflac_sys::FLAC__StreamMetadata,
}

impl MetadataBlock {
    fn new(kind: libflac_sys::FLAC__MetadataType) -> Result<Self, FlacError> {
        let ptr = unsafe { libflac_sys::FLAC__metadata_object_new(kind) };
        if ptr.is_null() {
            return Err(FlacError::LibFlacInit(
                "FLAC__metadata_object_new returned null".into(),
            ));
        }
        Ok(Self { ptr })
    }
}

impl Drop for MetadataBlock {
    fn drop(&mut self) {
        unsafe { libflac_sys::FLAC__metadata_object_delete(self.ptr) }
    }
}

unsafe extern "C" fn write_callback(
    _encoder: *const libflac_sys::FLAC__StreamEncoder,
    buffer: *const libflac_sys::FLAC__byte,
    bytes: usize,
    _samples: u32,
    _current_frame: u32,
    client_data: *mut c_void,
) -> libflac_sys::FLAC__StreamEncoderWriteStatus {
    let state = unsafe { &mut *(client_data as *mut SinkState) };
    let slice = unsafe { std::slice::from_raw_parts(buffer, bytes) };
    match state.sink.write_all(slice) {
        Ok(()) => libflac_sys::FLAC__STREAM_ENCODER_WRITE_STATUS_OK,
        Err(err) => {
            state.error = Some(err);
            libflac_sys::FLAC__STREAM_ENCODER_WRITE_STATUS_FATAL_ERROR
        }
    }
}

unsafe extern "C" fn seek_callback(
    _encoder: *const libflac_sys::FLAC__StreamEncoder,
    absolute_byte_offset: u64,
    client_data: *mut c_void,
) -> libflac_sys::FLAC__StreamEncoderSeekStatus {
    let state = unsafe { &mut *(client_data as *mut SinkState) };
    match state.sink.seek(SeekFrom::Start(absolute_byte_offset)) {
        Ok(_) => libflac_sys::FLAC__STREAM_ENCODER_SEEK_STATUS_OK,
        Err(err) => {
            state.error = Some(err);
            libflac_sys::FLAC__STREAM_ENCODER_SEEK_STATUS_ERROR
        }
    }
}

unsafe extern "C" fn tell_callback(
    _encoder: *const libflac_sys::FLAC__StreamEncoder,
    absolute_byte_offset: *mut u64,
    client_data: *mut c_void,
) -> libflac_sys::FLAC__StreamEncoderTellStatus {
    let state = unsafe { &mut *(client_data as *mut SinkState) };
    match state.sink.stream_position() {
        Ok(position) => {
            unsafe { *absolute_byte_offset = position };
            libflac_sys::FLAC__STREAM_ENCODER_TELL_STATUS_OK
        }
        Err(err) => {
            state.error = Some(err);
            libflac_sys::FLAC__STREAM_ENCODER_TELL_STATUS_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_input_is_encoded_at_twenty_four_bits() {
        assert_eq!(native_bits(BitDepth::U8), 8);
        assert_eq!(native_bits(BitDepth::S16), 16);
        assert_eq!(native_bits(BitDepth::F32), 24);
    }

    #[test]
    fn version_names_the_codec() {
        assert!(version().starts_with("Free Lossless Audio Codec "));
    }
}
