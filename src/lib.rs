/*MIT License

Copyright (c) 2025 David Maseda Neira

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Invertible constant-Q analysis and resynthesis built on a non-stationary
//! Gabor filterbank (NSGF-CQT).
//!
//! A block of `block_size` samples is mapped to one band-pass signal per
//! log-spaced band and back again without loss. Two coefficient layouts are
//! provided: [`NsgfCqtDense`] keeps every band at full block length, while
//! [`NsgfCqtSparse`] keeps only the power-of-two frequency span each band
//! occupies. [`CqtProcessor`] wraps either transform in a sample-in/sample-out
//! streaming engine with a user hook that sees every block of coefficients.
//!
//! ```no_run
//! use cqt_rs::prelude::*;
//!
//! let config = CqtConfig::new(48000.0, 4096, 1.0 / 12.0, 100.0, 10000.0, 1000.0)?;
//! let mut processor = CqtSparseProcessor::<f64, _>::direct(config, |coefs: &mut SparseCoefs<f64>| {
//!     for band in coefs.iter_mut() {
//!         band.iter_mut().for_each(|c| *c = *c * 0.5);
//!     }
//! })?;
//!
//! let output = processor.process_sample(0.25);
//! # let _ = output;
//! # Ok::<(), cqt_rs::ConfigError>(())
//! ```

use num_traits::Float;

pub mod dense;
pub mod double_buffer;
pub mod fft_backend;
pub mod filterbank;
pub mod processor;
pub mod rt_check;
pub mod simd;
pub mod slicing;
pub mod sparse;

pub use dense::{CoefMatrix, NsgfCqtDense};
pub use double_buffer::DoubleBuffer;
pub use fft_backend::{Complex, Dft, DftBackend, DftPlanner, DftPlannerTrait, FftNum};
pub use filterbank::{BandSpan, Filterbank};
pub use processor::{
    BandCoefs, BlockProcessor, CqtDenseProcessor, CqtProcessor, CqtSparseProcessor, CqtTransform,
    Passthrough, ProcessingMode,
};
pub use slicing::{Slicer, Splicer};
pub use sparse::{NsgfCqtSparse, SparseCoefs};

pub mod prelude {
    pub use crate::{
        BandCoefs, BlockProcessor, CoefMatrix, Complex, ConfigError, CqtConfig, CqtDenseProcessor,
        CqtProcessor, CqtSparseProcessor, CqtTransform, FrequencyScale, NsgfCqtDense, NsgfCqtSparse,
        Passthrough, ProcessingMode, SparseCoefs, WindowType,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Periodic Hann, `sin²(πn/N)`
    Hann,

    /// Square root of the periodic Hann window; two passes at 50% overlap sum to one
    SqrtHann,
}

/// Frequency axis on which band centers are evenly spaced.
///
/// [`Log2`](Self::Log2) gives the constant-Q transform; the others give a
/// variable-Q transform whose bandwidths follow a psychoacoustic scale.
/// [`CqtConfig::fraction`] is measured in units of the chosen scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyScale {
    /// Octaves
    #[default]
    Log2,

    /// Mel, `1127·ln(1 + f/700)`
    Mel,

    /// ERB-rate after Moore and Glasberg, `21.4·log10(1 + 4.37·f/1000)`
    Erb,

    /// Bark after Traunmüller, `26.81 / (1 + 1960/f) − 0.53`
    Bark,
}

impl FrequencyScale {
    /// Map a frequency in Hz onto the scale. Zero maps to `-inf` on
    /// [`Log2`](Self::Log2) and to a finite value on the others.
    pub fn from_hz(self, hz: f64) -> f64 {
        match self {
            Self::Log2 => hz.log2(),
            Self::Mel => 1127.0 * (hz / 700.0).ln_1p(),
            Self::Erb => 21.4 * (4.37 * hz / 1000.0 + 1.0).log10(),
            Self::Bark => 26.81 / (1.0 + 1960.0 / hz) - 0.53,
        }
    }

    /// Inverse of [`from_hz`](Self::from_hz). Bark values at or above the top
    /// of the scale (26.28) map to infinity.
    pub fn to_hz(self, value: f64) -> f64 {
        match self {
            Self::Log2 => value.exp2(),
            Self::Mel => 700.0 * (value / 1127.0).exp_m1(),
            Self::Erb => 1000.0 * (10f64.powf(value / 21.4) - 1.0) / 4.37,
            Self::Bark => {
                let denominator = 26.81 / (value + 0.53) - 1.0;
                if denominator > 0.0 {
                    1960.0 / denominator
                } else {
                    f64::INFINITY
                }
            }
        }
    }

    /// Distance from `from` to `to` Hz in scale units
    pub fn distance(self, from: f64, to: f64) -> f64 {
        match self {
            Self::Log2 => (to / from).log2(),
            _ => self.from_hz(to) - self.from_hz(from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    #[error("block size must be a power of two >= 4, got {0}")]
    InvalidBlockSize(usize),

    #[error("fraction must be positive and finite, got {0}")]
    InvalidFraction(f64),

    #[error("frequencies must satisfy 0 < min < reference < max, got {min} / {reference} / {max}")]
    InvalidFrequencyRange { min: f64, reference: f64, max: f64 },

    #[error("frequency range {min}..{max} Hz spans less than one octave")]
    RangeTooNarrow { min: f64, max: f64 },

    #[error("max frequency {max} Hz is not below the Nyquist frequency {nyquist} Hz")]
    AboveNyquist { max: f64, nyquist: f64 },

    #[error("band {band} has no frequency bin above the atom threshold")]
    EmptyBand { band: usize },

    #[error("filterbank is not invertible: dual frame RMS error {rms:e}")]
    NotInvertible { rms: f64 },
}

/// Band layout derived from a [`CqtConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandInfo {
    /// Bands strictly below the reference frequency
    pub bands_down: usize,
    /// Bands strictly above the reference frequency
    pub bands_up: usize,
    /// `bands_down + bands_up + 1`
    pub num_bands: usize,
}

/// Immutable transform configuration.
///
/// Fields are public so a config can be built by struct literal; transforms
/// call [`CqtConfig::validate`] before using one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CqtConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Samples per transform block (the DFT size)
    pub block_size: usize,
    /// Band spacing in units of `scale` (octaves for [`FrequencyScale::Log2`])
    pub fraction: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    /// Frequency that receives a band center exactly
    pub ref_frequency: f64,
    pub scale: FrequencyScale,
}

impl Default for CqtConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 4096,
            fraction: 1.0 / 12.0,
            min_frequency: 100.0,
            max_frequency: 10000.0,
            ref_frequency: 1000.0,
            scale: FrequencyScale::Log2,
        }
    }
}

impl CqtConfig {
    const MIN_BLOCK_SIZE: usize = 1 << 10;
    const MAX_BLOCK_SIZE: usize = 1 << 16;
    const MAX_POINTS_PER_OCTAVE: f64 = 96.0;
    const MIN_AUDIBLE_FREQUENCY: f64 = 20.0;
    const MAX_AUDIBLE_FREQUENCY: f64 = 20000.0;

    pub fn new(
        sample_rate: f64,
        block_size: usize,
        fraction: f64,
        min_frequency: f64,
        max_frequency: f64,
        ref_frequency: f64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            sample_rate,
            block_size,
            fraction,
            min_frequency,
            max_frequency,
            ref_frequency,
            scale: FrequencyScale::Log2,
        };
        config.validate()?;
        Ok(config)
    }

    /// Same bands spaced on another frequency scale; `fraction` is
    /// reinterpreted in units of `scale`.
    pub fn with_scale(self, scale: FrequencyScale) -> Result<Self, ConfigError> {
        let config = Self { scale, ..self };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.block_size < 4 || !self.block_size.is_power_of_two() {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        if !(self.fraction.is_finite() && self.fraction > 0.0) {
            return Err(ConfigError::InvalidFraction(self.fraction));
        }

        let ordered = self.min_frequency > 0.0
            && self.min_frequency < self.ref_frequency
            && self.ref_frequency < self.max_frequency
            && self.max_frequency.is_finite();
        if !ordered {
            return Err(ConfigError::InvalidFrequencyRange {
                min: self.min_frequency,
                reference: self.ref_frequency,
                max: self.max_frequency,
            });
        }

        if self.min_frequency * 2.0 > self.max_frequency {
            return Err(ConfigError::RangeTooNarrow {
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }

        let nyquist = self.sample_rate / 2.0;
        if self.max_frequency >= nyquist {
            return Err(ConfigError::AboveNyquist {
                max: self.max_frequency,
                nyquist,
            });
        }

        Ok(())
    }

    /// Clamp every parameter into the range a real-time audio host can handle.
    ///
    /// Block size is rounded to a power of two in `[2^10, 2^16]`, points per
    /// octave are limited to `[1, 96]` and frequencies to the audible range,
    /// with the reference frequency kept strictly between the other two. The
    /// result still has to pass [`validate`](Self::validate): a sample rate too
    /// low for the clamped range is not fixed here. On scales other than
    /// [`FrequencyScale::Log2`] the fraction is left as it is.
    pub fn clamped(self) -> Self {
        let block_size = self
            .block_size
            .clamp(Self::MIN_BLOCK_SIZE, Self::MAX_BLOCK_SIZE)
            .next_power_of_two();

        let fraction = match self.scale {
            FrequencyScale::Log2 if self.fraction.is_finite() && self.fraction > 0.0 => {
                1.0 / (1.0 / self.fraction).clamp(1.0, Self::MAX_POINTS_PER_OCTAVE)
            }
            FrequencyScale::Log2 => 1.0 / 12.0,
            _ => self.fraction,
        };

        let clamp_audible = |f: f64| {
            if f.is_nan() {
                Self::MIN_AUDIBLE_FREQUENCY
            } else {
                f.clamp(Self::MIN_AUDIBLE_FREQUENCY, Self::MAX_AUDIBLE_FREQUENCY)
            }
        };
        let mut min_frequency = clamp_audible(self.min_frequency);
        let mut max_frequency = clamp_audible(self.max_frequency);
        if min_frequency > max_frequency {
            std::mem::swap(&mut min_frequency, &mut max_frequency);
        }
        if max_frequency / min_frequency < 4.0 {
            min_frequency = (max_frequency / 4.0).max(Self::MIN_AUDIBLE_FREQUENCY);
            max_frequency = min_frequency * 4.0;
        }

        let mut ref_frequency = clamp_audible(self.ref_frequency);
        if !(ref_frequency > min_frequency && ref_frequency < max_frequency) {
            ref_frequency = (min_frequency * max_frequency).sqrt();
        }

        Self {
            sample_rate: self.sample_rate,
            block_size,
            fraction,
            min_frequency,
            max_frequency,
            ref_frequency,
            scale: self.scale,
        }
    }

    /// Bands per unit of the frequency scale
    pub fn points_per_octave(&self) -> f64 {
        1.0 / self.fraction
    }

    /// Slicer hop, fixed at half a block
    pub fn hop_size(&self) -> usize {
        self.block_size / 2
    }

    /// Non-negative frequency bins of a block
    pub fn freq_bins(&self) -> usize {
        self.block_size / 2 + 1
    }

    pub fn band_info(&self) -> BandInfo {
        let ppo = self.points_per_octave();
        let distance = |from, to| self.scale.distance(from, to);
        let bands_down = (ppo * distance(self.min_frequency, self.ref_frequency)).ceil() as usize;
        let bands_up = (ppo * distance(self.ref_frequency, self.max_frequency)).ceil() as usize;
        BandInfo {
            bands_down,
            bands_up,
            num_bands: bands_down + bands_up + 1,
        }
    }
}

/// Generate a periodic window of the given length.
pub fn generate_window<T: FftNum>(window_type: WindowType, size: usize) -> Vec<T> {
    let pi = T::PI();
    let n = fft_backend::from_usize::<T>(size);

    (0..size)
        .map(|i| {
            let s = (pi * fft_backend::from_usize::<T>(i) / n).sin();
            match window_type {
                WindowType::Hann => s * s,
                WindowType::SqrtHann => (s * s).sqrt(),
            }
        })
        .collect()
}

/// Root-mean-square of a slice; zero for an empty slice.
pub fn rms<T: Float>(values: &[T]) -> T {
    if values.is_empty() {
        return T::zero();
    }
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v * v);
    (sum / T::from(values.len()).unwrap_or_else(T::one)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_config() -> CqtConfig {
        CqtConfig::new(48000.0, 1024, 1.0, 100.0, 10000.0, 1500.0).unwrap()
    }

    #[test]
    fn test_config_default_is_valid() {
        let config = CqtConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hop_size(), 2048);
        assert_eq!(config.freq_bins(), 2049);
        assert!((config.points_per_octave() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_config_invalid_block_size() {
        let config = CqtConfig::new(48000.0, 1000, 1.0, 100.0, 10000.0, 1500.0);
        assert!(matches!(config, Err(ConfigError::InvalidBlockSize(1000))));

        let config = CqtConfig::new(48000.0, 2, 1.0, 100.0, 10000.0, 1500.0);
        assert!(matches!(config, Err(ConfigError::InvalidBlockSize(2))));
    }

    #[test]
    fn test_config_invalid_frequency_order() {
        let config = CqtConfig::new(48000.0, 1024, 1.0, 100.0, 10000.0, 50.0);
        assert!(matches!(config, Err(ConfigError::InvalidFrequencyRange { .. })));

        let config = CqtConfig::new(48000.0, 1024, 1.0, 0.0, 10000.0, 1500.0);
        assert!(matches!(config, Err(ConfigError::InvalidFrequencyRange { .. })));
    }

    #[test]
    fn test_config_needs_one_octave() {
        let config = CqtConfig::new(48000.0, 1024, 1.0, 1000.0, 1900.0, 1500.0);
        assert!(matches!(
            config,
            Err(ConfigError::RangeTooNarrow { min, max }) if min == 1000.0 && max == 1900.0
        ));
        assert!(CqtConfig::new(48000.0, 1024, 1.0, 1000.0, 2000.0, 1500.0).is_ok());
    }

    #[test]
    fn test_scale_maps_invert() {
        for scale in [
            FrequencyScale::Log2,
            FrequencyScale::Mel,
            FrequencyScale::Erb,
            FrequencyScale::Bark,
        ] {
            for hz in [20.0, 100.0, 1000.0, 7000.0, 20000.0] {
                let back = scale.to_hz(scale.from_hz(hz));
                assert!((back - hz).abs() < 1e-6 * hz, "{:?} at {} Hz: {}", scale, hz, back);
            }
            assert!(scale.from_hz(1000.0) < scale.from_hz(1001.0));
        }
        assert!((FrequencyScale::Mel.from_hz(700.0) - 1127.0 * 2f64.ln()).abs() < 1e-9);
        assert_eq!(FrequencyScale::Bark.to_hz(30.0), f64::INFINITY);
    }

    #[test]
    fn test_band_info_on_mel_scale() {
        let config = CqtConfig::default().with_scale(FrequencyScale::Mel).unwrap();
        let config = CqtConfig {
            fraction: 50.0,
            ..config
        };
        // 150.5 mel up to 1000 mel, then up to 3073 mel
        let info = config.band_info();
        assert_eq!(info.bands_down, 17);
        assert_eq!(info.bands_up, 42);
    }

    #[test]
    fn test_config_above_nyquist() {
        let config = CqtConfig::new(16000.0, 1024, 1.0, 100.0, 10000.0, 1500.0);
        assert!(matches!(config, Err(ConfigError::AboveNyquist { .. })));
    }

    #[test]
    fn test_band_info() {
        let info = reference_config().band_info();
        // log2(15) = 3.91, log2(6.67) = 2.74
        assert_eq!(info.bands_down, 4);
        assert_eq!(info.bands_up, 3);
        assert_eq!(info.num_bands, 8);
    }

    #[test]
    fn test_clamped() {
        let config = CqtConfig {
            sample_rate: 48000.0,
            block_size: 100,
            fraction: 1.0 / 200.0,
            min_frequency: 5.0,
            max_frequency: 30000.0,
            ref_frequency: 25000.0,
            scale: FrequencyScale::Log2,
        }
        .clamped();

        assert_eq!(config.block_size, 1024);
        assert!((config.points_per_octave() - 96.0).abs() < 1e-9);
        assert_eq!(config.min_frequency, 20.0);
        assert_eq!(config.max_frequency, 20000.0);
        assert!(config.ref_frequency > config.min_frequency);
        assert!(config.ref_frequency < config.max_frequency);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sqrt_hann_power_complementary() {
        let window: Vec<f64> = generate_window(WindowType::SqrtHann, 64);
        for i in 0..32 {
            let sum = window[i] * window[i] + window[i + 32] * window[i + 32];
            assert!((sum - 1.0).abs() < 1e-12, "sum at {} = {}", i, sum);
        }
        assert_eq!(window[0], 0.0);
        assert!((window[32] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::EmptyBand { band: 3 };
        assert_eq!(err.to_string(), "band 3 has no frequency bin above the atom threshold");
    }
}
