//! # fltconfig
//!
//! Options shared by every flt filter, kept in a small flat JSON object:
//!
//! ```json
//! {
//!   "flacCompressionLevel": 5,
//!   "opusBitrate": 128,
//!   "openmptSampleRate": 48000,
//!   "openmptStereoSeparation": 100,
//!   "openmptInterpolation": 1,
//!   "openmptVolumeRamping": -1,
//!   "openmptRepeatCount": 0
//! }
//! ```
//!
//! The file is looked up in this order:
//! 1. the path in the `FLT_CONFIG` environment variable
//! 2. `<user config dir>/fltfilter/options.json`
//! 3. `options.json` in the temporary directory
//!
//! Missing keys, non-integer values and unreadable files all fall back to the
//! defaults. Ranges are clamped and values missing from a fixed list of choices
//! revert to the default. Writing a setting keeps whatever other keys the file
//! already holds.
//!
//! ```no_run
//! use fltconfig::SettingsStore;
//!
//! let store = SettingsStore::locate();
//! let mut settings = store.load();
//! settings.opus_bitrate = 96;
//! store.save(&settings)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::{
    env, fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

const ENV_CONFIG_FILE: &str = "FLT_CONFIG";
const CONFIG_SUBDIR: &str = "fltfilter";
const CONFIG_FILE: &str = "options.json";

pub const FLAC_COMPRESSION_LEVEL_KEY: &str = "flacCompressionLevel";
pub const OPUS_BITRATE_KEY: &str = "opusBitrate";

pub const FLAC_COMPRESSION_LEVELS: RangeInclusive<u32> = 0..=8;
pub const DEFAULT_FLAC_COMPRESSION_LEVEL: u32 = 5;

/// Opus bitrate bounds in kbps.
pub const OPUS_BITRATES: RangeInclusive<u32> = 8..=256;
pub const DEFAULT_OPUS_BITRATE: u32 = 128;

pub const OPENMPT_SAMPLE_RATE_KEY: &str = "openmptSampleRate";
pub const OPENMPT_STEREO_SEPARATION_KEY: &str = "openmptStereoSeparation";
pub const OPENMPT_INTERPOLATION_KEY: &str = "openmptInterpolation";
pub const OPENMPT_VOLUME_RAMPING_KEY: &str = "openmptVolumeRamping";
pub const OPENMPT_REPEAT_COUNT_KEY: &str = "openmptRepeatCount";

pub const OPENMPT_SAMPLE_RATES: [u32; 4] = [22_050, 44_100, 48_000, 96_000];
pub const DEFAULT_OPENMPT_SAMPLE_RATE: u32 = 48_000;
/// Percent.
pub const OPENMPT_STEREO_SEPARATIONS: RangeInclusive<i32> = 0..=200;
pub const DEFAULT_OPENMPT_STEREO_SEPARATION: i32 = 100;
/// Filter lengths: default, none, linear, cubic, windowed sinc.
pub const OPENMPT_INTERPOLATIONS: [i32; 5] = [0, 1, 2, 4, 8];
pub const DEFAULT_OPENMPT_INTERPOLATION: i32 = 1;
/// -1 is the library default, 0 disabled, then strengths 1 to 10.
pub const OPENMPT_VOLUME_RAMPINGS: RangeInclusive<i32> = -1..=10;
pub const DEFAULT_OPENMPT_VOLUME_RAMPING: i32 = -1;
pub const OPENMPT_REPEAT_COUNTS: RangeInclusive<i32> = 0..=1;

/// Options read by the encoders when an output file is opened, and by the tracker
/// decoder when a module is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSettings {
    pub flac_compression_level: u32,
    /// Target bitrate in kbps.
    pub opus_bitrate: u32,
    #[serde(flatten)]
    pub module: ModuleSettings,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            flac_compression_level: DEFAULT_FLAC_COMPRESSION_LEVEL,
            opus_bitrate: DEFAULT_OPUS_BITRATE,
            module: ModuleSettings::default(),
        }
    }
}

impl FilterSettings {
    /// Returns a copy with every value inside its valid range.
    pub fn clamped(self) -> Self {
        Self {
            flac_compression_level: clamp_to(self.flac_compression_level, &FLAC_COMPRESSION_LEVELS),
            opus_bitrate: clamp_to(self.opus_bitrate, &OPUS_BITRATES),
            module: self.module.validated(),
        }
    }
}

/// Tracker module playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSettings {
    #[serde(rename = "openmptSampleRate")]
    pub sample_rate: u32,
    #[serde(rename = "openmptStereoSeparation")]
    pub stereo_separation: i32,
    #[serde(rename = "openmptInterpolation")]
    pub interpolation: i32,
    #[serde(rename = "openmptVolumeRamping")]
    pub volume_ramping: i32,
    #[serde(rename = "openmptRepeatCount")]
    pub repeat_count: i32,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_OPENMPT_SAMPLE_RATE,
            stereo_separation: DEFAULT_OPENMPT_STEREO_SEPARATION,
            interpolation: DEFAULT_OPENMPT_INTERPOLATION,
            volume_ramping: DEFAULT_OPENMPT_VOLUME_RAMPING,
            repeat_count: 0,
        }
    }
}

impl ModuleSettings {
    /// Unlisted sample rates, filters and ramping strengths revert to their
    /// defaults. Separation and repeat count are clamped.
    pub fn validated(self) -> Self {
        let volume_ramping = if OPENMPT_VOLUME_RAMPINGS.contains(&self.volume_ramping) {
            self.volume_ramping
        } else {
            DEFAULT_OPENMPT_VOLUME_RAMPING
        };
        Self {
            sample_rate: listed_or(
                self.sample_rate,
                &OPENMPT_SAMPLE_RATES,
                DEFAULT_OPENMPT_SAMPLE_RATE,
            ),
            stereo_separation: self.stereo_separation.clamp(
                *OPENMPT_STEREO_SEPARATIONS.start(),
                *OPENMPT_STEREO_SEPARATIONS.end(),
            ),
            interpolation: listed_or(
                self.interpolation,
                &OPENMPT_INTERPOLATIONS,
                DEFAULT_OPENMPT_INTERPOLATION,
            ),
            volume_ramping,
            repeat_count: self
                .repeat_count
                .clamp(*OPENMPT_REPEAT_COUNTS.start(), *OPENMPT_REPEAT_COUNTS.end()),
        }
    }

    fn from_document(document: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            sample_rate: integer_or(document, OPENMPT_SAMPLE_RATE_KEY, defaults.sample_rate),
            stereo_separation: integer_or(
                document,
                OPENMPT_STEREO_SEPARATION_KEY,
                defaults.stereo_separation,
            ),
            interpolation: integer_or(document, OPENMPT_INTERPOLATION_KEY, defaults.interpolation),
            volume_ramping: integer_or(
                document,
                OPENMPT_VOLUME_RAMPING_KEY,
                defaults.volume_ramping,
            ),
            repeat_count: integer_or(document, OPENMPT_REPEAT_COUNT_KEY, defaults.repeat_count),
        }
        .validated()
    }
}

fn listed_or<T: PartialEq + Copy>(value: T, allowed: &[T], default: T) -> T {
    if allowed.contains(&value) { value } else { default }
}

fn clamp_to(value: u32, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

fn clamp_setting(value: Option<i64>, range: &RangeInclusive<u32>, default: u32) -> u32 {
    match value {
        Some(v) => v.clamp(i64::from(*range.start()), i64::from(*range.end())) as u32,
        None => default,
    }
}

/// Location of the options file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Finds the options file the way every filter does.
    pub fn locate() -> Self {
        if let Ok(path) = env::var(ENV_CONFIG_FILE) {
            info!(env_var = ENV_CONFIG_FILE, path = %path, "using options file from env");
            return Self::at(path);
        }

        let path = match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_SUBDIR).join(CONFIG_FILE),
            None => env::temp_dir().join(CONFIG_FILE),
        };
        debug!(path = %path.display(), "using default options file");
        Self::at(path)
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every setting, falling back to defaults and clamping.
    pub fn load(&self) -> FilterSettings {
        let document = self.read_document();
        FilterSettings {
            flac_compression_level: clamp_setting(
                integer(&document, FLAC_COMPRESSION_LEVEL_KEY),
                &FLAC_COMPRESSION_LEVELS,
                DEFAULT_FLAC_COMPRESSION_LEVEL,
            ),
            opus_bitrate: clamp_setting(
                integer(&document, OPUS_BITRATE_KEY),
                &OPUS_BITRATES,
                DEFAULT_OPUS_BITRATE,
            ),
            module: ModuleSettings::from_document(&document),
        }
    }

    /// Reads one integer setting. Returns `None` when it is absent or not an integer.
    pub fn read_setting(&self, name: &str) -> Option<i64> {
        integer(&self.read_document(), name)
    }

    /// Stores one integer setting, keeping the other keys of the file.
    pub fn write_setting(&self, name: &str, value: i64) -> Result<()> {
        let mut document = self.read_document();
        document.insert(name.to_string(), Value::from(value));
        self.write_document(&document)
    }

    /// Stores every setting after clamping, keeping unrelated keys of the file.
    pub fn save(&self, settings: &FilterSettings) -> Result<()> {
        let mut document = self.read_document();
        match serde_json::to_value(settings.clamped())? {
            Value::Object(values) => document.extend(values),
            other => return Err(anyhow!("settings serialized to {other}, expected an object")),
        }
        self.write_document(&document)
    }

    fn read_document(&self) -> Map<String, Value> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(_) => {
                debug!(path = %self.path.display(), "options file not found, using defaults");
                return Map::new();
            }
        };
        match serde_json::from_slice::<Value>(&data) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "options file is not a JSON object, ignoring it");
                Map::new()
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(directory = %parent.display(), "created options directory");
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(document)?)?;
        debug!(path = %self.path.display(), "options saved");
        Ok(())
    }
}

fn integer(document: &Map<String, Value>, name: &str) -> Option<i64> {
    document.get(name).and_then(Value::as_i64)
}

/// An integer setting that fits `T`, else `default`.
fn integer_or<T: TryFrom<i64>>(document: &Map<String, Value>, name: &str, default: T) -> T {
    integer(document, name)
        .and_then(|value| T::try_from(value).ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::at(dir.path().join("nope.json"));
        assert_eq!(store.load(), FilterSettings::default());
        assert_eq!(store.read_setting(OPUS_BITRATE_KEY), None);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"flacCompressionLevel": 12, "opusBitrate": -4}"#).unwrap();

        let settings = SettingsStore::at(&path).load();
        assert_eq!(settings.flac_compression_level, 8);
        assert_eq!(settings.opus_bitrate, 8);
    }

    #[test]
    fn non_integer_values_fall_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"flacCompressionLevel": "high", "opusBitrate": 96.5}"#).unwrap();
        assert_eq!(SettingsStore::at(&path).load(), FilterSettings::default());

        fs::write(&path, "not json").unwrap();
        assert_eq!(SettingsStore::at(&path).load(), FilterSettings::default());
    }

    #[test]
    fn save_keeps_unrelated_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("options.json");
        let store = SettingsStore::at(&path);
        store.write_setting("somethingElse", 42).unwrap();

        let settings = FilterSettings {
            flac_compression_level: 2,
            opus_bitrate: 1000,
            ..Default::default()
        };
        store.save(&settings).unwrap();

        assert_eq!(store.read_setting("somethingElse"), Some(42));
        let loaded = store.load();
        assert_eq!(loaded.flac_compression_level, 2);
        assert_eq!(loaded.opus_bitrate, 256);
    }

    #[test]
    fn write_setting_overwrites_one_key() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::at(dir.path().join("options.json"));
        store.write_setting(OPUS_BITRATE_KEY, 64).unwrap();
        store.write_setting(OPUS_BITRATE_KEY, 160).unwrap();
        assert_eq!(store.read_setting(OPUS_BITRATE_KEY), Some(160));
        assert_eq!(store.load().flac_compression_level, DEFAULT_FLAC_COMPRESSION_LEVEL);
    }

    #[test]
    fn module_settings_follow_their_choices() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("options.json");
        fs::write(
            &path,
            r#"{"openmptSampleRate": 44100, "openmptStereoSeparation": 250,
                "openmptInterpolation": 3, "openmptVolumeRamping": 5,
                "openmptRepeatCount": 7}"#,
        )
        .unwrap();

        let module = SettingsStore::at(&path).load().module;
        assert_eq!(module.sample_rate, 44_100);
        assert_eq!(module.stereo_separation, 200);
        assert_eq!(module.interpolation, DEFAULT_OPENMPT_INTERPOLATION);
        assert_eq!(module.volume_ramping, 5);
        assert_eq!(module.repeat_count, 1);

        fs::write(
            &path,
            r#"{"openmptSampleRate": 32000, "openmptVolumeRamping": 11}"#,
        )
        .unwrap();
        let module = SettingsStore::at(&path).load().module;
        assert_eq!(module.sample_rate, DEFAULT_OPENMPT_SAMPLE_RATE);
        assert_eq!(module.volume_ramping, DEFAULT_OPENMPT_VOLUME_RAMPING);
        assert_eq!(module, ModuleSettings::default());
    }

    #[test]
    fn module_settings_are_saved_as_flat_keys() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::at(dir.path().join("options.json"));
        let mut settings = FilterSettings::default();
        settings.module.sample_rate = 96_000;
        settings.module.volume_ramping = 0;
        store.save(&settings).unwrap();

        assert_eq!(store.read_setting(OPENMPT_SAMPLE_RATE_KEY), Some(96_000));
        assert_eq!(store.read_setting(OPENMPT_VOLUME_RAMPING_KEY), Some(0));
        assert_eq!(store.read_setting(OPENMPT_REPEAT_COUNT_KEY), Some(0));
        assert_eq!(store.load(), settings);
    }
}
