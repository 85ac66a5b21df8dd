//! Sample conversion between native codec samples and canonical PCM bytes.
//!
//! Decoders push native samples through a [`Converter`], which applies the channel
//! reduction chosen at open time and writes canonical bytes into a [`DecodeBuffer`].
//! Encoders wrap host bytes in [`CanonicalSamples`] and pull whatever representation
//! their codec accepts.

use crate::buffer::DecodeBuffer;
use crate::format::{BitDepth, SampleFormat};

/// Canonical float full scale.
pub const FLOAT_FULL_SCALE: f32 = 32768.0;

/// Gain of a centre or surround channel folded into one side of a stereo pair.
pub const DOWNMIX_GAIN: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// How native channels are folded into the canonical channel count.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMix {
    /// Keep the first `keep` of `source` interleaved channels.
    Truncate { source: usize, keep: usize },
    /// Mix every source channel into a stereo pair. `weights[c]` holds the left and
    /// right gains of source channel `c`.
    Stereo { weights: Vec<[f32; 2]> },
}

impl ChannelMix {
    /// Passes every channel through unchanged.
    pub fn identity(channels: usize) -> Self {
        ChannelMix::Truncate {
            source: channels,
            keep: channels,
        }
    }

    pub fn truncate(source: usize, keep: usize) -> Self {
        ChannelMix::Truncate {
            source,
            keep: keep.min(source),
        }
    }

    /// Builds a stereo downmix, scaling the weights so neither output can exceed full
    /// scale when every input is at full scale.
    pub fn stereo(mut weights: Vec<[f32; 2]>) -> Self {
        let left: f32 = weights.iter().map(|w| w[0].abs()).sum();
        let right: f32 = weights.iter().map(|w| w[1].abs()).sum();
        let norm = left.max(right);
        if norm > 1.0 {
            for w in &mut weights {
                w[0] /= norm;
                w[1] /= norm;
            }
        }
        ChannelMix::Stereo { weights }
    }

    /// Folds up to eight channels in Vorbis order to stereo. This is the order of
    /// Ogg Vorbis and of Opus channel mapping family 1. One or two channels pass
    /// through; beyond eight only the first two are kept.
    pub fn vorbis_stereo(channels: usize) -> Self {
        const L: [f32; 2] = [1.0, 0.0];
        const R: [f32; 2] = [0.0, 1.0];
        const C: [f32; 2] = [DOWNMIX_GAIN, DOWNMIX_GAIN];
        const SL: [f32; 2] = [DOWNMIX_GAIN, 0.0];
        const SR: [f32; 2] = [0.0, DOWNMIX_GAIN];
        const LFE: [f32; 2] = [0.0, 0.0];

        let weights: &[[f32; 2]] = match channels {
            0..=2 => return ChannelMix::identity(channels),
            3 => &[L, C, R],
            4 => &[L, R, SL, SR],
            5 => &[L, C, R, SL, SR],
            6 => &[L, C, R, SL, SR, LFE],
            7 => &[L, C, R, SL, SR, C, LFE],
            8 => &[L, C, R, SL, SR, SL, SR, LFE],
            _ => return ChannelMix::truncate(channels, 2),
        };
        ChannelMix::stereo(weights.to_vec())
    }

    pub fn source_channels(&self) -> usize {
        match self {
            ChannelMix::Truncate { source, .. } => *source,
            ChannelMix::Stereo { weights } => weights.len(),
        }
    }

    pub fn output_channels(&self) -> usize {
        match self {
            ChannelMix::Truncate { keep, .. } => *keep,
            ChannelMix::Stereo { .. } => 2,
        }
    }
}

/// Writes native samples as canonical bytes.
#[derive(Debug, Clone)]
pub struct Converter {
    format: SampleFormat,
    mix: ChannelMix,
}

impl Converter {
    pub fn new(format: SampleFormat, mix: ChannelMix) -> Self {
        debug_assert_eq!(mix.output_channels(), usize::from(format.channels()));
        Self { format, mix }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn mix(&self) -> &ChannelMix {
        &self.mix
    }

    /// Appends interleaved integer samples that are `source_bits` wide.
    ///
    /// Widening is a left shift, so 8 and 16 bit sources land exactly on canonical
    /// values of the same width. Trailing samples that do not form a full frame are
    /// ignored.
    pub fn push_int(&self, samples: &[i32], source_bits: u32, out: &mut DecodeBuffer) {
        let (source, keep) = match &self.mix {
            ChannelMix::Truncate { source, keep } => (*source, *keep),
            ChannelMix::Stereo { .. } => {
                let scale = 1.0 / int_full_scale(source_bits) as f32;
                let floats: Vec<f32> = samples.iter().map(|&s| s as f32 * scale).collect();
                self.push_float(&floats, out);
                return;
            }
        };
        if source == 0 {
            return;
        }

        let depth = self.format.bit_depth();
        out.reserve(samples.len() / source * keep * depth.bytes());
        for frame in samples.chunks_exact(source) {
            for &value in &frame[..keep] {
                push_int_sample(depth, value, source_bits, out);
            }
        }
    }

    /// Appends interleaved float samples where ±1.0 is full scale.
    pub fn push_float(&self, samples: &[f32], out: &mut DecodeBuffer) {
        let depth = self.format.bit_depth();
        match &self.mix {
            ChannelMix::Truncate { source, keep } => {
                if *source == 0 {
                    return;
                }
                out.reserve(samples.len() / source * keep * depth.bytes());
                for frame in samples.chunks_exact(*source) {
                    for &value in &frame[..*keep] {
                        push_unit_sample(depth, value, out);
                    }
                }
            }
            ChannelMix::Stereo { weights } => {
                if weights.is_empty() {
                    return;
                }
                out.reserve(samples.len() / weights.len() * 2 * depth.bytes());
                for frame in samples.chunks_exact(weights.len()) {
                    let (mut left, mut right) = (0.0f32, 0.0f32);
                    for (value, w) in frame.iter().zip(weights) {
                        left += value * w[0];
                        right += value * w[1];
                    }
                    push_unit_sample(depth, left, out);
                    push_unit_sample(depth, right, out);
                }
            }
        }
    }

    /// Appends interleaved 16-bit samples.
    pub fn push_i16(&self, samples: &[i16], out: &mut DecodeBuffer) {
        let widened: Vec<i32> = samples.iter().map(|&s| i32::from(s)).collect();
        self.push_int(&widened, 16, out);
    }
}

fn int_full_scale(bits: u32) -> i64 {
    1i64 << (bits.clamp(1, 32) - 1)
}

fn rescale_int(value: i32, from_bits: u32, to_bits: u32) -> i32 {
    if to_bits >= from_bits {
        value.wrapping_shl(to_bits - from_bits)
    } else {
        value >> (from_bits - to_bits)
    }
}

fn push_int_sample(depth: BitDepth, value: i32, source_bits: u32, out: &mut DecodeBuffer) {
    match depth {
        BitDepth::U8 => {
            let v = rescale_int(value, source_bits, 8).clamp(-128, 127);
            out.push((v + 128) as u8);
        }
        BitDepth::S16 => {
            let v = rescale_int(value, source_bits, 16).clamp(-32768, 32767) as i16;
            out.push_bytes(&v.to_le_bytes());
        }
        BitDepth::F32 => {
            let scale = f64::from(FLOAT_FULL_SCALE) / int_full_scale(source_bits) as f64;
            let v = (f64::from(value) * scale) as f32;
            out.push_bytes(&v.to_le_bytes());
        }
    }
}

fn push_unit_sample(depth: BitDepth, value: f32, out: &mut DecodeBuffer) {
    match depth {
        BitDepth::U8 => {
            let v = (value * 128.0).round().clamp(-128.0, 127.0) as i32;
            out.push((v + 128) as u8);
        }
        BitDepth::S16 => {
            let v = (value * FLOAT_FULL_SCALE).round().clamp(-32768.0, 32767.0) as i16;
            out.push_bytes(&v.to_le_bytes());
        }
        BitDepth::F32 => {
            out.push_bytes(&(value * FLOAT_FULL_SCALE).to_le_bytes());
        }
    }
}

/// A run of whole canonical frames handed to an encoder.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalSamples<'a> {
    format: SampleFormat,
    bytes: &'a [u8],
}

impl<'a> CanonicalSamples<'a> {
    pub fn new(format: SampleFormat, bytes: &'a [u8]) -> Self {
        debug_assert_eq!(bytes.len() % format.frame_bytes(), 0);
        Self { format, bytes }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn frames(&self) -> usize {
        self.bytes.len() / self.format.frame_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Converts to interleaved integers `native_bits` wide.
    ///
    /// Integer inputs are shifted. Float inputs are scaled, rounded and clamped to the
    /// target range.
    pub fn to_i32(&self, native_bits: u32) -> Vec<i32> {
        match self.format.bit_depth() {
            BitDepth::U8 => self
                .bytes
                .iter()
                .map(|&b| rescale_int(i32::from(b) - 128, 8, native_bits))
                .collect(),
            BitDepth::S16 => self
                .bytes
                .chunks_exact(2)
                .map(|c| rescale_int(i32::from(i16::from_le_bytes([c[0], c[1]])), 16, native_bits))
                .collect(),
            BitDepth::F32 => {
                let full = int_full_scale(native_bits);
                let scale = full as f64 / f64::from(FLOAT_FULL_SCALE);
                let (min, max) = (-full as f64, (full - 1) as f64);
                self.floats()
                    .map(|f| (f64::from(f) * scale).round().clamp(min, max) as i32)
                    .collect()
            }
        }
    }

    pub fn to_i16(&self) -> Vec<i16> {
        self.to_i32(16).into_iter().map(|v| v as i16).collect()
    }

    /// Converts to interleaved floats where ±1.0 is full scale.
    pub fn to_unit_f32(&self) -> Vec<f32> {
        match self.format.bit_depth() {
            BitDepth::U8 => self
                .bytes
                .iter()
                .map(|&b| (f32::from(b) - 128.0) / 128.0)
                .collect(),
            BitDepth::S16 => self
                .bytes
                .chunks_exact(2)
                .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / FLOAT_FULL_SCALE)
                .collect(),
            BitDepth::F32 => self.floats().map(|f| f / FLOAT_FULL_SCALE).collect(),
        }
    }

    fn floats(&self) -> impl Iterator<Item = f32> + 'a {
        self.bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(depth: BitDepth, channels: u16) -> SampleFormat {
        SampleFormat::new(depth, channels, 44_100).unwrap()
    }

    fn take(buffer: &mut DecodeBuffer) -> Vec<u8> {
        let mut dest = vec![0u8; buffer.remaining()];
        buffer.drain_frames(&mut dest, 1, usize::MAX);
        dest
    }

    #[test]
    fn sixteen_bit_passes_through_exactly() {
        let conv = Converter::new(format(BitDepth::S16, 2), ChannelMix::identity(2));
        let mut out = DecodeBuffer::new();
        conv.push_int(&[1, -1, 32767, -32768], 16, &mut out);
        let bytes = take(&mut out);
        assert_eq!(bytes, [1, 0, 0xff, 0xff, 0xff, 0x7f, 0x00, 0x80]);
    }

    #[test]
    fn eight_bit_is_offset_binary() {
        let conv = Converter::new(format(BitDepth::U8, 1), ChannelMix::identity(1));
        let mut out = DecodeBuffer::new();
        conv.push_int(&[0, -128, 127], 8, &mut out);
        assert_eq!(take(&mut out), [128, 0, 255]);
    }

    #[test]
    fn twenty_four_bit_becomes_scaled_float() {
        let conv = Converter::new(format(BitDepth::F32, 1), ChannelMix::identity(1));
        let mut out = DecodeBuffer::new();
        conv.push_int(&[8_388_607, -8_388_608, 256], 24, &mut out);
        let floats: Vec<f32> = take(&mut out)
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert!((floats[0] - 32767.996).abs() < 0.01);
        assert_eq!(floats[1], -32768.0);
        assert_eq!(floats[2], 1.0);
    }

    #[test]
    fn truncation_keeps_leading_channels() {
        let conv = Converter::new(format(BitDepth::S16, 2), ChannelMix::truncate(3, 2));
        let mut out = DecodeBuffer::new();
        conv.push_int(&[1, 2, 3, 4, 5, 6], 16, &mut out);
        let bytes = take(&mut out);
        assert_eq!(bytes, [1, 0, 2, 0, 4, 0, 5, 0]);
    }

    #[test]
    fn stereo_downmix_is_normalised() {
        let mix = ChannelMix::stereo(vec![[1.0, 0.0], [0.0, 1.0], [0.7071, 0.7071]]);
        let conv = Converter::new(format(BitDepth::F32, 2), mix);
        let mut out = DecodeBuffer::new();
        conv.push_float(&[1.0, 1.0, 1.0], &mut out);
        let floats: Vec<f32> = take(&mut out)
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert!((floats[0] - 32768.0).abs() < 0.5);
        assert!((floats[1] - 32768.0).abs() < 0.5);
    }

    #[test]
    fn vorbis_order_five_one_folds_to_stereo() {
        let mix = ChannelMix::vorbis_stereo(6);
        assert_eq!(mix.source_channels(), 6);
        let ChannelMix::Stereo { weights } = &mix else {
            panic!("expected a stereo mix");
        };
        assert_eq!(weights[5], [0.0, 0.0]);
        assert_eq!(weights[1][0], weights[1][1]);
        assert_eq!(weights[3][1], 0.0);
        assert_eq!(weights[4][0], 0.0);

        // front left alone never reaches the right side
        let conv = Converter::new(format(BitDepth::F32, 2), mix);
        let mut out = DecodeBuffer::new();
        conv.push_float(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0], &mut out);
        let floats: Vec<f32> = take(&mut out)
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert!((floats[0] - 32768.0 / (1.0 + 2.0 * DOWNMIX_GAIN)).abs() < 0.5);
        assert_eq!(floats[1], 0.0);
    }

    #[test]
    fn vorbis_order_keeps_mono_and_stereo() {
        assert_eq!(ChannelMix::vorbis_stereo(1), ChannelMix::identity(1));
        assert_eq!(ChannelMix::vorbis_stereo(2), ChannelMix::identity(2));
        assert_eq!(ChannelMix::vorbis_stereo(10), ChannelMix::truncate(10, 2));
    }

    #[test]
    fn canonical_float_to_twenty_four_bit() {
        let mut bytes = Vec::new();
        for v in [1.0f32, -32768.0, 40000.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let samples = CanonicalSamples::new(format(BitDepth::F32, 1), &bytes);
        assert_eq!(samples.to_i32(24), vec![256, -8_388_608, 8_388_607]);
    }

    #[test]
    fn canonical_u8_to_native() {
        let bytes = [128u8, 0, 255];
        let samples = CanonicalSamples::new(format(BitDepth::U8, 1), &bytes);
        assert_eq!(samples.to_i32(8), vec![0, -128, 127]);
        assert_eq!(samples.to_i16(), vec![0, -32768, 32512]);
        assert_eq!(samples.to_unit_f32(), vec![0.0, -1.0, 127.0 / 128.0]);
    }

    #[test]
    fn canonical_s16_to_unit_float() {
        let mut bytes = Vec::new();
        for v in [16384i16, -32768] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let samples = CanonicalSamples::new(format(BitDepth::S16, 2), &bytes);
        assert_eq!(samples.frames(), 1);
        assert_eq!(samples.to_unit_f32(), vec![0.5, -1.0]);
    }
}
