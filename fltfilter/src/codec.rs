use std::{fmt, path::Path};

use fltcore::BitDepth;

/// The codec adapters a host can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    Flac,
    Opus,
    /// Anything the general-purpose demuxer understands. Load only.
    Media,
    /// Tracker modules rendered by libopenmpt. Load only.
    Module,
}

impl CodecKind {
    pub const ALL: [CodecKind; 4] = [
        CodecKind::Flac,
        CodecKind::Opus,
        CodecKind::Media,
        CodecKind::Module,
    ];

    /// What the host is told when it queries the filter.
    pub fn info(self) -> CodecInfo {
        match self {
            CodecKind::Flac => CodecInfo {
                name: "FLAC",
                version: fltflac::version(),
                extensions: &["FLAC"],
                can_load: true,
                can_save: true,
                bit_depths: &[BitDepth::U8, BitDepth::S16, BitDepth::F32],
            },
            CodecKind::Opus => CodecInfo {
                name: "Opus",
                version: fltopus::version(),
                extensions: &["OPUS"],
                can_load: true,
                can_save: true,
                bit_depths: &[BitDepth::S16, BitDepth::F32],
            },
            CodecKind::Media => CodecInfo {
                name: "Symphonia",
                version: "Symphonia".to_string(),
                extensions: &["M4A", "MP3", "OGG", "WAV"],
                can_load: true,
                can_save: false,
                bit_depths: &[BitDepth::U8, BitDepth::S16, BitDepth::F32],
            },
            CodecKind::Module => CodecInfo {
                name: "libopenmpt",
                version: fltmpt::version(),
                extensions: &["MOD", "XM", "S3M", "IT"],
                can_load: true,
                can_save: false,
                bit_depths: &[BitDepth::F32],
            },
        }
    }

    /// Extension given to saved files, or `None` for a load-only codec.
    pub fn output_extension(self) -> Option<&'static str> {
        match self {
            CodecKind::Flac => Some("flac"),
            CodecKind::Opus => Some("opus"),
            CodecKind::Media | CodecKind::Module => None,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CodecKind::Flac => "flac",
            CodecKind::Opus => "opus",
            CodecKind::Media => "media",
            CodecKind::Module => "module",
        };
        f.write_str(name)
    }
}

/// Capabilities of one codec adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: &'static str,
    pub version: String,
    /// At most four upper-case extensions without the dot.
    pub extensions: &'static [&'static str],
    pub can_load: bool,
    pub can_save: bool,
    /// Depths accepted for both mono and stereo.
    pub bit_depths: &'static [BitDepth],
}

impl CodecInfo {
    pub fn supports(&self, depth: BitDepth) -> bool {
        self.bit_depths.contains(&depth)
    }
}

/// True if the adapter for `kind` can open `path`. Nothing is kept open.
pub fn understands_format(kind: CodecKind, path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match kind {
        CodecKind::Flac => fltflac::understands_file(path),
        CodecKind::Opus => fltopus::understands_file(path),
        CodecKind::Media => fltmedia::understands_file(path),
        CodecKind::Module => fltmpt::understands_file(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_slots_fit_the_host() {
        for kind in CodecKind::ALL {
            let info = kind.info();
            assert!(info.extensions.len() <= 4, "{kind}");
            assert!(info.extensions.iter().all(|ext| ext.len() <= 4));
            assert!(info.can_load);
            assert_eq!(info.can_save, kind.output_extension().is_some());
        }
    }

    #[test]
    fn opus_output_has_no_eight_bit() {
        let info = CodecKind::Opus.info();
        assert!(!info.supports(BitDepth::U8));
        assert!(info.supports(BitDepth::F32));
        assert!(CodecKind::Flac.info().supports(BitDepth::U8));
    }

    #[test]
    fn modules_render_as_float_only() {
        let info = CodecKind::Module.info();
        assert_eq!(info.extensions, ["MOD", "XM", "S3M", "IT"]);
        assert!(!info.can_save);
        assert_eq!(info.bit_depths, [BitDepth::F32]);
        assert!(info.version.starts_with("libopenmpt "));
    }
}
