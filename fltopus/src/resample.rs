use soxr::Soxr;
use soxr::format::Stereo;
use soxr::params::{QualityRecipe, QualitySpec, RuntimeSpec};
use tracing::debug;

use crate::error::OpusError;

/// Output frames read from the filter per drain call.
const DRAIN_FRAMES: usize = 4096;

/// Converts interleaved unit-range audio of one or two channels to another rate.
pub struct Resampler {
    source_hz: f64,
    dest_hz: f64,
    channels: usize,
    soxr: Soxr<Stereo<f32>>,
    input: Vec<[f32; 2]>,
    output: Vec<[f32; 2]>,
}

impl Resampler {
    pub fn new(source_hz: u32, dest_hz: u32, channels: usize) -> Result<Self, OpusError> {
        if !(1..=2).contains(&channels) {
            return Err(OpusError::Unsupported(format!(
                "cannot resample {channels} channels"
            )));
        }
        let quality = QualitySpec::new(QualityRecipe::high());
        let soxr = Soxr::<Stereo<f32>>::new_with_params(
            f64::from(source_hz),
            f64::from(dest_hz),
            quality,
            RuntimeSpec::default(),
        )
        .map_err(|e| OpusError::Resample(e.to_string()))?;
        debug!(source_hz, dest_hz, channels, "resampler created");

        Ok(Self {
            source_hz: f64::from(source_hz),
            dest_hz: f64::from(dest_hz),
            channels,
            soxr,
            input: Vec::new(),
            output: Vec::new(),
        })
    }

    /// Resamples `samples` and appends the result, interleaved, to `out`.
    pub fn process(&mut self, samples: &[f32], out: &mut Vec<f32>) -> Result<(), OpusError> {
        self.input.clear();
        match self.channels {
            1 => self.input.extend(samples.iter().map(|&s| [s, s])),
            _ => self
                .input
                .extend(samples.chunks_exact(2).map(|pair| [pair[0], pair[1]])),
        }
        self.run(out)
    }

    /// Ends the input and appends whatever the filter still holds.
    pub fn flush(&mut self, out: &mut Vec<f32>) -> Result<(), OpusError> {
        self.output.clear();
        self.output.resize(DRAIN_FRAMES, [0.0; 2]);
        loop {
            let produced = self
                .soxr
                .drain(&mut self.output)
                .map_err(|e| OpusError::Resample(e.to_string()))?;
            if produced == 0 {
                return Ok(());
            }
            self.emit(produced, out);
        }
    }

    fn run(&mut self, out: &mut Vec<f32>) -> Result<(), OpusError> {
        let capacity =
            ((self.input.len() as f64) * self.dest_hz / self.source_hz).ceil() as usize + 16;
        self.output.clear();
        self.output.resize(capacity, [0.0; 2]);

        let mut consumed = 0;
        while consumed < self.input.len() {
            let processed = self
                .soxr
                .process(&self.input[consumed..], &mut self.output)
                .map_err(|e| OpusError::Resample(e.to_string()))?;
            self.emit(processed.output_frames, out);
            consumed += processed.input_frames;
            if processed.input_frames == 0 && processed.output_frames == 0 {
                break;
            }
        }
        Ok(())
    }

    fn emit(&self, frames: usize, out: &mut Vec<f32>) {
        for frame in &self.output[..frames] {
            match self.channels {
                1 => out.push(frame[0]),
                _ => out.extend_from_slice(frame),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, rate: f32) -> Vec<f32> {
        (0..frames)
            .map(|i| (i as f32 / rate * 440.0 * std::f32::consts::TAU).sin() * 0.5)
            .collect()
    }

    #[test]
    fn drained_output_matches_the_rate_ratio() {
        let mut resampler = Resampler::new(44_100, 48_000, 1).unwrap();
        let source = sine(44_100, 44_100.0);
        let mut out = Vec::new();
        for piece in source.chunks(4_410) {
            resampler.process(piece, &mut out).unwrap();
        }
        resampler.flush(&mut out).unwrap();

        assert!(out.len().abs_diff(48_000) <= 2, "{} frames", out.len());
        // the tail is signal, not padding
        let tail = &out[out.len() - 2_000..];
        let rms = (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt();
        assert!(rms > 0.25, "tail rms {rms}");
    }

    #[test]
    fn stereo_stays_interleaved() {
        let mut resampler = Resampler::new(24_000, 48_000, 2).unwrap();
        let source: Vec<f32> = sine(2_400, 24_000.0)
            .into_iter()
            .flat_map(|s| [s, 0.0])
            .collect();
        let mut out = Vec::new();
        resampler.process(&source, &mut out).unwrap();
        resampler.flush(&mut out).unwrap();

        assert_eq!(out.len() % 2, 0);
        assert!((out.len() / 2).abs_diff(4_800) <= 2);
        assert!(out.iter().skip(1).step_by(2).all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn more_than_two_channels_are_refused() {
        assert!(Resampler::new(44_100, 48_000, 3).is_err());
    }
}
