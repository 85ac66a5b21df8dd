use std::{fs, ops::RangeInclusive, path::Path};

use fltcore::{
    ChannelMix, Converter, DecodeBuffer, DecodeError, NativeDecoder, NativeParams, StreamDetails,
    StreamingDecoder, TagMap, UnitOutcome, channel_label, select_format,
};
use tracing::{debug, warn};

use crate::{
    error::ModuleError,
    module::{Module, RenderParam, library_version},
};

pub const SAMPLE_RATES: [u32; 4] = [22_050, 44_100, 48_000, 96_000];
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

pub const STEREO_SEPARATION: RangeInclusive<i32> = 0..=200;
pub const DEFAULT_STEREO_SEPARATION: i32 = 100;

/// Interpolation filter lengths: 0 is the library default, 1 none, 2 linear,
/// 4 cubic, 8 windowed sinc.
pub const INTERPOLATION_FILTERS: [i32; 5] = [0, 1, 2, 4, 8];
pub const DEFAULT_INTERPOLATION: i32 = 1;

/// -1 is the library default, 0 disables ramping.
pub const VOLUME_RAMPING: RangeInclusive<i32> = -1..=10;
pub const DEFAULT_VOLUME_RAMPING: i32 = -1;

pub const REPEAT_COUNT: RangeInclusive<i32> = 0..=1;

/// Stereo frames rendered per decode unit.
const RENDER_FRAMES: usize = 4096;

/// Playback settings applied when a module is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleOptions {
    pub sample_rate: u32,
    pub stereo_separation: i32,
    pub interpolation: i32,
    pub volume_ramping: i32,
    /// 1 plays the song twice.
    pub repeat_count: i32,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            stereo_separation: DEFAULT_STEREO_SEPARATION,
            interpolation: DEFAULT_INTERPOLATION,
            volume_ramping: DEFAULT_VOLUME_RAMPING,
            repeat_count: 0,
        }
    }
}

impl ModuleOptions {
    /// Unlisted choices fall back to their defaults, ranges are clamped.
    pub fn validated(self) -> Self {
        Self {
            sample_rate: if SAMPLE_RATES.contains(&self.sample_rate) {
                self.sample_rate
            } else {
                DEFAULT_SAMPLE_RATE
            },
            stereo_separation: self
                .stereo_separation
                .clamp(*STEREO_SEPARATION.start(), *STEREO_SEPARATION.end()),
            interpolation: if INTERPOLATION_FILTERS.contains(&self.interpolation) {
                self.interpolation
            } else {
                DEFAULT_INTERPOLATION
            },
            volume_ramping: if VOLUME_RAMPING.contains(&self.volume_ramping) {
                self.volume_ramping
            } else {
                DEFAULT_VOLUME_RAMPING
            },
            repeat_count: self
                .repeat_count
                .clamp(*REPEAT_COUNT.start(), *REPEAT_COUNT.end()),
        }
    }
}

/// A tracker module rendered through the shared buffering state machine.
pub type ModuleDecoder = StreamingDecoder<ModuleSource>;

/// Renders one block of stereo frames per unit until the song ends.
pub struct ModuleSource {
    module: Module,
    converter: Converter,
    sample_rate: u32,
    render: Vec<f32>,
}

impl NativeDecoder for ModuleSource {
    fn decode_unit(&mut self, out: &mut DecodeBuffer) -> Result<UnitOutcome, DecodeError> {
        let frames = self.module.read_float_stereo(self.sample_rate, &mut self.render);
        if frames == 0 {
            return Ok(UnitOutcome::EndOfInput);
        }
        self.converter.push_float(&self.render[..frames * 2], out);
        Ok(UnitOutcome::Decoded)
    }
}

/// Opens a module with the default playback settings.
pub fn open_file(path: impl AsRef<Path>) -> Result<ModuleDecoder, ModuleError> {
    open_file_with(path, ModuleOptions::default())
}

/// Opens a module for rendering at `options.sample_rate`.
///
/// The reported length covers every repeat and is an upper bound: reading stops
/// where the song actually ends.
pub fn open_file_with(
    path: impl AsRef<Path>,
    options: ModuleOptions,
) -> Result<ModuleDecoder, ModuleError> {
    let path = path.as_ref();
    let options = options.validated();
    debug!(path = %path.display(), ?options, "opening tracker module");

    let mut module = Module::from_bytes(fs::read(path)?)?;
    for (param, value) in [
        (RenderParam::StereoSeparationPercent, options.stereo_separation),
        (RenderParam::InterpolationFilterLength, options.interpolation),
        (RenderParam::VolumeRampingStrength, options.volume_ramping),
    ] {
        if !module.set_render_param(param, value) {
            warn!(?param, value, "render parameter rejected");
        }
    }
    if !module.set_repeat_count(options.repeat_count) {
        warn!(repeat_count = options.repeat_count, "repeat count rejected");
    }

    let passes = f64::from(1 + options.repeat_count);
    let total_samples =
        (module.duration_seconds() * f64::from(options.sample_rate) * passes).round() as u64;
    if total_samples == 0 {
        return Err(ModuleError::Empty);
    }

    let params = NativeParams {
        channels: 2,
        sample_rate: options.sample_rate,
        bits_per_sample: None,
        bits_per_coded_sample: None,
        total_samples,
    };
    let format = select_format(&params)?;

    let mut description = module
        .metadata("type_long")
        .unwrap_or_else(|| "libopenmpt".to_string());
    let pattern_channels = module.num_channels();
    if pattern_channels > 0 {
        description.push('\n');
        description.push_str(&channel_label(pattern_channels));
    }

    let tags = collect_tags(&module);
    debug!(
        total_samples,
        pattern_channels,
        tags = tags.len(),
        canonical = %format,
        "tracker module opened"
    );

    let source = ModuleSource {
        module,
        converter: Converter::new(format, ChannelMix::identity(2)),
        sample_rate: options.sample_rate,
        render: vec![0.0; RENDER_FRAMES * 2],
    };
    let details = StreamDetails::new(format, total_samples, description).with_tags(tags);
    Ok(StreamingDecoder::new(source, details))
}

/// True if libopenmpt loads `path` and finds a playable song in it.
pub fn understands_file(path: impl AsRef<Path>) -> bool {
    open_file(path).is_ok()
}

/// Version of the linked libopenmpt, as `libopenmpt <major>.<minor>.<patch>`.
pub fn version() -> String {
    format_version(library_version())
}

fn format_version(packed: u32) -> String {
    format!(
        "libopenmpt {}.{}.{}",
        packed >> 24,
        (packed >> 16) & 0xff,
        packed & 0xff
    )
}

fn collect_tags(module: &Module) -> TagMap {
    let mut tags = TagMap::new();
    for (key, name) in [
        ("title", "TITLE"),
        ("artist", "ARTIST"),
        ("date", "DATE"),
        ("message", "COMMENT"),
        ("tracker", "SOFTWARE"),
    ] {
        if let Some(value) = module.metadata(key) {
            tags.insert(name, value.trim_end());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlisted_choices_fall_back_to_defaults() {
        let options = ModuleOptions {
            sample_rate: 32_000,
            stereo_separation: 250,
            interpolation: 3,
            volume_ramping: 11,
            repeat_count: 5,
        }
        .validated();
        assert_eq!(options.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(options.stereo_separation, 200);
        assert_eq!(options.interpolation, DEFAULT_INTERPOLATION);
        assert_eq!(options.volume_ramping, DEFAULT_VOLUME_RAMPING);
        assert_eq!(options.repeat_count, 1);
    }

    #[test]
    fn listed_choices_are_kept() {
        let options = ModuleOptions {
            sample_rate: 96_000,
            stereo_separation: -5,
            interpolation: 8,
            volume_ramping: 0,
            repeat_count: -1,
        }
        .validated();
        assert_eq!(options.sample_rate, 96_000);
        assert_eq!(options.stereo_separation, 0);
        assert_eq!(options.interpolation, 8);
        assert_eq!(options.volume_ramping, 0);
        assert_eq!(options.repeat_count, 0);
        assert_eq!(ModuleOptions::default().validated(), ModuleOptions::default());
    }

    #[test]
    fn version_unpacks_major_minor_patch() {
        assert_eq!(format_version(0x0007_0003), "libopenmpt 0.7.3");
        assert!(version().starts_with("libopenmpt "));
    }
}
