use std::path::Path;

use fltconfig::FilterSettings;
use fltfilter::{
    CHUNK_SIZE, CodecKind, InputFilter, MAX_DESCRIPTION_BYTES, OpenError, OutputFilter,
    understands_format,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stereo_ramp(frames: usize) -> Vec<u8> {
    (0..frames)
        .flat_map(|i| {
            let left = ((i * 37) % 20_000) as i16 - 10_000;
            let right = -left;
            [left.to_le_bytes(), right.to_le_bytes()].concat()
        })
        .collect()
}

fn read_all(input: &mut InputFilter, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = input.read(&mut buf);
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn flac_save_and_load_through_the_host_surface() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let pcm = stereo_ramp(44_100);

    let mut output = OutputFilter::open(
        CodecKind::Flac,
        dir.path().join("take.flac.FLAC"),
        44_100,
        16,
        2,
        pcm.len() as u32,
        &FilterSettings::default(),
    )
    .unwrap();
    assert_eq!(output.path(), dir.path().join("take.flac"));
    assert!(output.write_special_data("INFO", "INAM", b"Take One\0\0"));
    assert!(output.write_special_data("INFO", "IART", b"Caf\xe9 Band\0"));
    assert!(!output.write_special_data("INFO", "ZZZZ", b"nothing"));
    assert!(!output.write_special_data("adtl", "INAM", b"wrong list"));

    for chunk in pcm.chunks(CHUNK_SIZE) {
        assert_eq!(output.write(chunk), chunk.len());
    }
    assert!(!output.write_special_data("INFO", "ICMT", b"too late"));
    output.finish().unwrap();
    drop(output);

    let path = dir.path().join("take.flac");
    assert!(understands_format(CodecKind::Flac, &path));
    assert!(!understands_format(CodecKind::Opus, &path));

    let (mut input, opened) = InputFilter::open(CodecKind::Flac, &path, &FilterSettings::default()).unwrap();
    assert_eq!(opened.sample_rate, 44_100);
    assert_eq!(opened.bits_per_sample, 16);
    assert_eq!(opened.channels, 2);
    assert_eq!(opened.chunk_size, CHUNK_SIZE);
    assert_eq!(input.file_size(), pcm.len() as u32);

    let description = input.options_string();
    assert!(description.len() <= MAX_DESCRIPTION_BYTES);
    assert!(description.ends_with("2 channels"));

    let first = input.first_special_data().unwrap();
    assert_eq!((first.list_type, first.type_code), ("INFO", "IART"));
    assert_eq!(first.value, "Café Band");
    let second = input.next_special_data().unwrap();
    assert_eq!((second.type_code, second.value.as_str()), ("INAM", "Take One"));
    assert_eq!(input.next_special_data(), None);
    assert_eq!(input.next_special_data(), None);

    // The cursor rewinds.
    assert_eq!(input.first_special_data().unwrap().type_code, "IART");

    assert_eq!(read_all(&mut input, opened.chunk_size), pcm);
}

#[test]
fn opus_save_and_load_through_the_host_surface() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let pcm = stereo_ramp(48_000);
    let settings = FilterSettings {
        flac_compression_level: 5,
        opus_bitrate: 96,
        ..Default::default()
    };

    let mut output = OutputFilter::open(
        CodecKind::Opus,
        dir.path().join("voice"),
        48_000,
        16,
        2,
        pcm.len() as u32,
        &settings,
    )
    .unwrap();
    assert!(output.write_special_data("INFO", "IGNR", b"Speech"));
    assert_eq!(output.write(&pcm), pcm.len());
    drop(output);

    let path = dir.path().join("voice.opus");
    assert!(understands_format(CodecKind::Opus, &path));

    let (mut input, opened) = InputFilter::open(CodecKind::Opus, &path, &settings).unwrap();
    assert_eq!(opened.sample_rate, 48_000);
    assert_eq!(opened.bits_per_sample, 32);
    assert_eq!(opened.channels, 2);
    assert_eq!(input.file_size(), 48_000 * 2 * 4);
    assert!(input.options_string().contains("kbps, 2 channels"));

    let tag = input.first_special_data().unwrap();
    assert_eq!((tag.type_code, tag.value.as_str()), ("IGNR", "Speech"));
    assert_eq!(input.next_special_data(), None);

    assert_eq!(read_all(&mut input, opened.chunk_size).len(), 48_000 * 2 * 4);
}

#[test]
fn media_codec_is_load_only() {
    let dir = TempDir::new().unwrap();
    let result = OutputFilter::open(
        CodecKind::Media,
        dir.path().join("out.m4a"),
        44_100,
        16,
        2,
        0,
        &FilterSettings::default(),
    );
    assert!(matches!(result, Err(OpenError::CannotSave(CodecKind::Media))));
}

/// A one-pattern ProTracker module named "host tune": a looped square on channel 0
/// and a pattern break after eight rows.
fn write_mod(path: &Path) {
    let mut data = Vec::new();
    let mut title = [0u8; 20];
    title[..9].copy_from_slice(b"host tune");
    data.extend_from_slice(&title);
    let mut sample = [0u8; 30];
    sample[22..24].copy_from_slice(&32u16.to_be_bytes());
    sample[25] = 64;
    sample[28..30].copy_from_slice(&32u16.to_be_bytes());
    data.extend_from_slice(&sample);
    for _ in 1..31 {
        let mut unused = [0u8; 30];
        unused[29] = 1;
        data.extend_from_slice(&unused);
    }
    data.extend_from_slice(&[1, 127]);
    data.extend_from_slice(&[0u8; 128]);
    data.extend_from_slice(b"M.K.");
    let mut pattern = vec![0u8; 64 * 4 * 4];
    pattern[..4].copy_from_slice(&[0x01, 0xac, 0x10, 0x00]);
    let row_seven = 7 * 16 + 4;
    pattern[row_seven..row_seven + 4].copy_from_slice(&[0x00, 0x00, 0x0d, 0x00]);
    data.extend_from_slice(&pattern);
    data.extend((0..64).map(|i| if i < 32 { 100u8 } else { 156u8 }));
    std::fs::write(path, data).unwrap();
}

#[test]
fn modules_render_at_the_configured_rate() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tune.mod");
    write_mod(&path);
    assert!(understands_format(CodecKind::Module, &path));
    assert!(!understands_format(CodecKind::Flac, &path));

    let mut settings = FilterSettings::default();
    settings.module.sample_rate = 22_050;
    let (mut input, opened) = InputFilter::open(CodecKind::Module, &path, &settings).unwrap();
    assert_eq!(opened.sample_rate, 22_050);
    assert_eq!(opened.bits_per_sample, 32);
    assert_eq!(opened.channels, 2);
    assert!(input.options_string().ends_with("4 channels"));
    let mut tags = Vec::new();
    let mut entry = input.first_special_data();
    while let Some(data) = entry {
        tags.push((data.type_code, data.value));
        entry = input.next_special_data();
    }
    assert!(tags.contains(&("INAM", "host tune".to_string())), "{tags:?}");

    let bytes = read_all(&mut input, opened.chunk_size);
    assert!(!bytes.is_empty());
    assert!(bytes.len() as u64 <= u64::from(input.file_size()) + 1_024 * 8);
}

#[test]
fn module_codec_is_load_only() {
    let dir = TempDir::new().unwrap();
    let result = OutputFilter::open(
        CodecKind::Module,
        dir.path().join("out.mod"),
        44_100,
        16,
        2,
        0,
        &FilterSettings::default(),
    );
    assert!(matches!(result, Err(OpenError::CannotSave(CodecKind::Module))));
}

#[test]
fn media_codec_reads_what_the_flac_filter_wrote() {
    let dir = TempDir::new().unwrap();
    let pcm = stereo_ramp(4_410);
    let mut output = OutputFilter::open(
        CodecKind::Flac,
        dir.path().join("short"),
        44_100,
        16,
        2,
        pcm.len() as u32,
        &FilterSettings::default(),
    )
    .unwrap();
    assert!(output.write_special_data("INFO", "INAM", b"Short"));
    assert_eq!(output.write(&pcm), pcm.len());
    drop(output);

    let path = dir.path().join("short.flac");
    assert!(understands_format(CodecKind::Media, &path));
    let (mut input, opened) = InputFilter::open(CodecKind::Media, &path, &FilterSettings::default()).unwrap();
    assert_eq!(opened.bits_per_sample, 16);
    assert_eq!(input.first_special_data().unwrap().value, "Short");
    assert_eq!(read_all(&mut input, 1024), pcm);
}

#[test]
fn unusable_host_formats_are_rejected() {
    let dir = TempDir::new().unwrap();
    let open = |bits, channels, rate| {
        OutputFilter::open(
            CodecKind::Flac,
            dir.path().join("bad"),
            rate,
            bits,
            channels,
            1000,
            &FilterSettings::default(),
        )
    };
    assert!(matches!(open(12, 2, 44_100), Err(OpenError::Format(_))));
    assert!(matches!(open(16, 0, 44_100), Err(OpenError::Format(_))));
    assert!(matches!(open(16, 2, 0), Err(OpenError::Format(_))));
}

#[test]
fn an_output_that_never_receives_audio_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let mut output = OutputFilter::open(
        CodecKind::Opus,
        dir.path().join("empty"),
        44_100,
        16,
        1,
        0,
        &FilterSettings::default(),
    )
    .unwrap();
    assert!(output.write_special_data("INFO", "INAM", b"Nothing"));
    drop(output);
    assert!(!dir.path().join("empty.opus").exists());
}

#[test]
fn missing_input_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let settings = FilterSettings::default();
    for kind in CodecKind::ALL {
        assert!(InputFilter::open(kind, dir.path().join("missing"), &settings).is_err());
        assert!(!understands_format(kind, dir.path().join("missing")));
    }
}
