use std::path::Path;

use fltconfig::{FilterSettings, ModuleSettings};
use fltcore::{AudioInput, TagCursor, TagList};
use fltmpt::ModuleOptions;
use tracing::{debug, info};

use crate::{CHUNK_SIZE, MAX_DESCRIPTION_BYTES, codec::CodecKind, error::OpenError};

/// What the host learns when an input opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedInput {
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub channels: u32,
    pub chunk_size: usize,
}

/// One tag handed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialData {
    pub list_type: &'static str,
    pub type_code: &'static str,
    pub value: String,
}

/// An open decoder plus the host's position in its tag list.
pub struct InputFilter {
    kind: CodecKind,
    decoder: Box<dyn AudioInput>,
    tags: TagList,
    cursor: TagCursor,
}

impl InputFilter {
    /// Opens `path` with the adapter for `kind`. Only tracker modules read
    /// `settings`, since their output rate and mix are chosen at render time.
    pub fn open(
        kind: CodecKind,
        path: impl AsRef<Path>,
        settings: &FilterSettings,
    ) -> Result<(InputFilter, OpenedInput), OpenError> {
        let path = path.as_ref();
        let decoder: Box<dyn AudioInput> = match kind {
            CodecKind::Flac => Box::new(fltflac::open_file(path)?),
            CodecKind::Opus => Box::new(fltopus::open_file(path)?),
            CodecKind::Media => Box::new(fltmedia::open_file(path)?),
            CodecKind::Module => Box::new(fltmpt::open_file_with(
                path,
                module_options(&settings.module),
            )?),
        };

        let format = decoder.format();
        let opened = OpenedInput {
            sample_rate: format.sample_rate(),
            bits_per_sample: format.bits(),
            channels: u32::from(format.channels()),
            chunk_size: CHUNK_SIZE,
        };
        let tags = TagList::from_tags(decoder.tags());
        info!(
            codec = %kind,
            path = %path.display(),
            format = %format,
            tags = tags.len(),
            "input opened"
        );

        let filter = InputFilter {
            kind,
            decoder,
            tags,
            cursor: TagCursor::new(),
        };
        Ok((filter, opened))
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    /// Expected decoded size in bytes, saturated to the host's 32-bit field.
    pub fn file_size(&self) -> u32 {
        self.decoder.output_size()
    }

    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        self.decoder.read(dest)
    }

    /// The stream description cut to fit the host buffer.
    pub fn options_string(&self) -> String {
        truncate_on_char_boundary(self.decoder.description(), MAX_DESCRIPTION_BYTES).to_string()
    }

    pub fn first_special_data(&mut self) -> Option<SpecialData> {
        let entry = self.tags.first(&mut self.cursor)?;
        Some(special_data(entry))
    }

    /// Next tag, or `None` once every tag has been handed out.
    pub fn next_special_data(&mut self) -> Option<SpecialData> {
        let entry = self.tags.next(&mut self.cursor)?;
        debug!(code = entry.code, index = self.cursor.index(), "tag enumerated");
        Some(special_data(entry))
    }
}

fn module_options(settings: &ModuleSettings) -> ModuleOptions {
    ModuleOptions {
        sample_rate: settings.sample_rate,
        stereo_separation: settings.stereo_separation,
        interpolation: settings.interpolation,
        volume_ramping: settings.volume_ramping,
        repeat_count: settings.repeat_count,
    }
}

fn special_data(entry: &fltcore::TagEntry) -> SpecialData {
    SpecialData {
        list_type: entry.list_type,
        type_code: entry.code,
        value: entry.value.clone(),
    }
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_module_settings_are_the_default_render_options() {
        assert_eq!(
            module_options(&ModuleSettings::default()),
            ModuleOptions::default()
        );
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_on_char_boundary("FLAC\n2 channels", 79), "FLAC\n2 channels");
    }

    #[test]
    fn truncation_never_splits_a_character() {
        let text = format!("{}é", "a".repeat(78));
        assert_eq!(text.len(), 80);
        let cut = truncate_on_char_boundary(&text, 79);
        assert_eq!(cut.len(), 78);
        assert!(cut.chars().all(|c| c == 'a'));
    }
}
