use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use encoding_rs::WINDOWS_1252;

use fltconfig::FilterSettings;
use fltcore::{AudioOutput, EncodeError, INFO_LIST, LazyEncoder, SampleFormat, tag_for_code};
use fltflac::{FlacEncoderOptions, FlacSetup};
use fltopus::{OpusEncoderOptions, OpusSetup};
use tracing::{debug, info};

use crate::{codec::CodecKind, error::OpenError};

/// An encoder waiting for, or receiving, audio from the host.
///
/// Nothing touches the disk until the first [`OutputFilter::write`]. Dropping the
/// filter finalises the file.
pub struct OutputFilter {
    kind: CodecKind,
    path: PathBuf,
    encoder: Box<dyn AudioOutput>,
}

impl OutputFilter {
    /// Prepares an encoder for `path`, which is renamed to carry exactly one codec
    /// extension. `size_bytes` is the host's estimate of the audio it will write.
    pub fn open(
        kind: CodecKind,
        path: impl AsRef<Path>,
        sample_rate: u32,
        bits_per_sample: u32,
        channels: u32,
        size_bytes: u32,
        settings: &FilterSettings,
    ) -> Result<OutputFilter, OpenError> {
        let path = output_file_name(kind, path.as_ref()).ok_or(OpenError::CannotSave(kind))?;
        let format = SampleFormat::from_host(bits_per_sample, channels, sample_rate)?;
        let total_samples = u64::from(size_bytes) / format.frame_bytes() as u64;
        let settings = settings.clamped();

        let encoder: Box<dyn AudioOutput> = match kind {
            CodecKind::Flac => {
                let options = FlacEncoderOptions {
                    compression_level: settings.flac_compression_level,
                    total_samples,
                    ..Default::default()
                };
                Box::new(LazyEncoder::new(FlacSetup::to_file(&path, options), format))
            }
            CodecKind::Opus => {
                let options = OpusEncoderOptions {
                    bitrate_kbps: settings.opus_bitrate,
                };
                Box::new(LazyEncoder::new(OpusSetup::to_file(&path, options), format))
            }
            CodecKind::Media | CodecKind::Module => return Err(OpenError::CannotSave(kind)),
        };

        info!(
            codec = %kind,
            path = %path.display(),
            format = %format,
            total_samples,
            "output opened"
        );
        Ok(OutputFilter {
            kind,
            path,
            encoder,
        })
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    /// The file that is, or will be, written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.encoder.write(bytes)
    }

    /// Accepts one tag from the host.
    ///
    /// Only `INFO` entries with a known type code are kept. Trailing NULs are removed
    /// and the value is read by [`host_text`]. Returns false for anything ignored,
    /// including duplicates and tags that arrive after audio.
    pub fn write_special_data(&mut self, list_type: &str, type_code: &str, data: &[u8]) -> bool {
        if list_type != INFO_LIST {
            debug!(list_type, "ignoring non-INFO special data");
            return false;
        }
        let Some(name) = tag_for_code(type_code) else {
            debug!(type_code, "ignoring unknown INFO code");
            return false;
        };

        let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        let value = host_text(&data[..end]);
        self.encoder.add_tag(name, &value)
    }

    /// Finalises the file and reports any error. Dropping does the same silently.
    pub fn finish(&mut self) -> Result<(), EncodeError> {
        self.encoder.finish()
    }
}

/// Reads text from the host: UTF-8 when the bytes are valid UTF-8, otherwise the
/// Windows-1252 ANSI code page.
pub fn host_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// Gives `path` exactly one extension for `kind`, dropping any repeats of it.
///
/// Returns `None` for a codec that cannot save.
pub fn output_file_name(kind: CodecKind, path: &Path) -> Option<PathBuf> {
    let extension = kind.output_extension()?;
    let upper = extension.to_ascii_uppercase();

    let mut base = path.to_path_buf();
    while base
        .extension()
        .is_some_and(|ext| ext == extension || ext == upper.as_str())
    {
        base.set_extension("");
    }

    let mut name = base.into_os_string();
    name.push(".");
    name.push(extension);
    Some(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_extensions_collapse() {
        let name = |p: &str| output_file_name(CodecKind::Flac, Path::new(p)).unwrap();
        assert_eq!(name("song"), PathBuf::from("song.flac"));
        assert_eq!(name("song.flac"), PathBuf::from("song.flac"));
        assert_eq!(name("song.FLAC.flac.FLAC"), PathBuf::from("song.flac"));
        assert_eq!(name("song.wav"), PathBuf::from("song.wav.flac"));
        assert_eq!(name("dir/take.2"), PathBuf::from("dir/take.2.flac"));
    }

    #[test]
    fn ansi_text_is_decoded_as_windows_1252() {
        assert_eq!(host_text(b"Caf\xe9 Band"), "Café Band");
        assert_eq!(host_text(b"\x93quoted\x94 \x80 5"), "\u{201C}quoted\u{201D} € 5");
        assert_eq!(host_text("Café".as_bytes()), "Café");
        assert!(matches!(host_text(b"plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn opus_gets_its_own_extension() {
        let name = output_file_name(CodecKind::Opus, Path::new("a.opus.OPUS")).unwrap();
        assert_eq!(name, PathBuf::from("a.opus"));
        assert_eq!(output_file_name(CodecKind::Media, Path::new("a.mp3")), None);
    }
}
