//! Canonical PCM format and the policy that picks it from native stream parameters.

use std::fmt;

use crate::error::FormatError;

/// Largest byte count a host can address through a signed 32-bit size.
pub const MAX_SIGNED_BYTES: u64 = i32::MAX as u64;

/// Canonical sample width.
///
/// 8-bit samples are unsigned with 128 as silence, 16-bit samples are signed
/// little-endian and 32-bit samples are little-endian IEEE floats scaled so that
/// full scale is ±32768.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    U8,
    S16,
    F32,
}

impl BitDepth {
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::U8),
            16 => Some(BitDepth::S16),
            32 => Some(BitDepth::F32),
            _ => None,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            BitDepth::U8 => 8,
            BitDepth::S16 => 16,
            BitDepth::F32 => 32,
        }
    }

    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitDepth::U8 => f.write_str("8-bit unsigned"),
            BitDepth::S16 => f.write_str("16-bit signed"),
            BitDepth::F32 => f.write_str("32-bit float"),
        }
    }
}

/// Format of the interleaved PCM exchanged with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    bit_depth: BitDepth,
    channels: u16,
    sample_rate: u32,
}

impl SampleFormat {
    pub fn new(bit_depth: BitDepth, channels: u16, sample_rate: u32) -> Result<Self, FormatError> {
        if channels == 0 {
            return Err(FormatError::NoChannels);
        }
        if channels > 2 {
            return Err(FormatError::UnsupportedChannels(u32::from(channels)));
        }
        if sample_rate == 0 {
            return Err(FormatError::NoSampleRate);
        }
        Ok(Self {
            bit_depth,
            channels,
            sample_rate,
        })
    }

    /// Builds a format from the raw values a host passes to an encoder.
    pub fn from_host(bits: u32, channels: u32, sample_rate: u32) -> Result<Self, FormatError> {
        let bit_depth = BitDepth::from_bits(bits).ok_or(FormatError::UnsupportedBitDepth(bits))?;
        let channels =
            u16::try_from(channels).map_err(|_| FormatError::UnsupportedChannels(channels))?;
        Self::new(bit_depth, channels, sample_rate)
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn bits(&self) -> u32 {
        self.bit_depth.bits()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bytes in one interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.bit_depth.bytes() * usize::from(self.channels)
    }

    /// Exact byte size of `total_samples` frames.
    pub fn estimated_bytes(&self, total_samples: u64) -> u64 {
        total_samples.saturating_mul(self.frame_bytes() as u64)
    }

    /// Byte size reported to a host with a 32-bit size field, saturated at `u32::MAX`.
    pub fn byte_size(&self, total_samples: u64) -> u32 {
        u32::try_from(self.estimated_bytes(total_samples)).unwrap_or(u32::MAX)
    }

    fn with_bit_depth(self, bit_depth: BitDepth) -> Self {
        Self { bit_depth, ..self }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} channel(s), {}",
            self.sample_rate, self.channels, self.bit_depth
        )
    }
}

/// Parameters a native decoder reports once its stream is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeParams {
    pub channels: u32,
    pub sample_rate: u32,
    /// Decoded sample width, `None` when the codec has no natural width.
    pub bits_per_sample: Option<u32>,
    /// Stored sample width, `None` when the container does not report one.
    pub bits_per_coded_sample: Option<u32>,
    /// Length in frames, 0 when unknown.
    pub total_samples: u64,
}

/// Chooses the canonical format for a native stream.
///
/// Native widths of exactly 8 or 16 bits are kept. Anything else, including codecs
/// with no natural width, becomes 32-bit float. Channel counts above two are reduced
/// to two. If a 32-bit stream would exceed [`MAX_SIGNED_BYTES`], 16-bit is used instead.
pub fn select_format(params: &NativeParams) -> Result<SampleFormat, FormatError> {
    if params.channels == 0 {
        return Err(FormatError::NoChannels);
    }
    if params.sample_rate == 0 {
        return Err(FormatError::NoSampleRate);
    }

    let native_bits = match (params.bits_per_sample, params.bits_per_coded_sample) {
        (None, None) => None,
        (decoded, coded) => Some(decoded.unwrap_or(0).max(coded.unwrap_or(0))),
    };
    let bit_depth = match native_bits {
        Some(0) => return Err(FormatError::NoBitDepth),
        Some(8) => BitDepth::U8,
        Some(16) => BitDepth::S16,
        _ => BitDepth::F32,
    };

    let channels = params.channels.min(2) as u16;
    let format = SampleFormat::new(bit_depth, channels, params.sample_rate)?;
    Ok(apply_size_ceiling(format, params.total_samples))
}

/// Falls back from 32-bit float to 16-bit when the stream would not fit
/// [`MAX_SIGNED_BYTES`].
pub fn apply_size_ceiling(format: SampleFormat, total_samples: u64) -> SampleFormat {
    if format.bit_depth == BitDepth::F32 && format.estimated_bytes(total_samples) > MAX_SIGNED_BYTES
    {
        format.with_bit_depth(BitDepth::S16)
    } else {
        format
    }
}
