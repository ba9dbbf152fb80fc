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

//! Filterbank construction: band centers evenly spaced on a frequency scale,
//! Gaussian atoms on that scale, and the canonical dual frame.

use log::{debug, trace};
use std::ops::Range;

use crate::fft_backend::{Complex, FftNum, from_f64};
use crate::{BandInfo, ConfigError, CqtConfig, FrequencyScale, rms};

/// Contiguous frequency-bin span `[start, start + len)` kept for one sparse band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandSpan {
    pub start: usize,
    /// Power of two, at least 4
    pub len: usize,
}

impl BandSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Analysis atoms, dual atoms and the axes they are sampled on.
///
/// Atoms are stored per band over the full block of `N` bins. Only bins
/// `0..=N/2` carry energy; the negative-frequency half is zero for both the
/// atoms and the dual atoms.
#[derive(Debug, Clone)]
pub struct Filterbank<T: FftNum> {
    config: CqtConfig,
    band_info: BandInfo,
    band_frequencies: Vec<T>,
    bin_frequencies: Vec<T>,
    atoms: Vec<Vec<T>>,
    dual_atoms: Vec<Vec<T>>,
    diagonal: Vec<T>,
}

impl<T: FftNum> Filterbank<T> {
    /// Atom values at or below this are dropped by the sparse layout
    pub const SPARSE_THRESHOLD: f64 = 1e-6;

    /// Full (untruncated) atoms, as used by the dense layout
    pub fn new(config: CqtConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Atoms with every value `<= threshold` set to zero before the dual frame
    /// is computed
    pub fn with_threshold(config: CqtConfig, threshold: f64) -> Result<Self, ConfigError> {
        Self::build(config, Some(threshold))
    }

    fn build(config: CqtConfig, threshold: Option<f64>) -> Result<Self, ConfigError> {
        config.validate()?;

        let band_info = config.band_info();
        let n = config.block_size;
        let half = n / 2;
        let num_bands = band_info.num_bands;

        let scale = config.scale;
        let ref_position = scale.from_hz(config.ref_frequency);
        let band_positions: Vec<f64> = (0..num_bands)
            .map(|k| ref_position + config.fraction * (k as f64 - band_info.bands_down as f64))
            .collect();
        let band_frequencies: Vec<f64> = match scale {
            FrequencyScale::Log2 => (0..num_bands)
                .map(|k| {
                    let octaves = config.fraction * (k as f64 - band_info.bands_down as f64);
                    config.ref_frequency * octaves.exp2()
                })
                .collect(),
            _ => band_positions.iter().map(|&p| scale.to_hz(p)).collect(),
        };
        let bin_frequencies: Vec<f64> = (0..n)
            .map(|i| i as f64 * config.sample_rate / n as f64)
            .collect();

        debug!(
            "filterbank: {} bands ({} down, {} up) on {:?} scale, {:.2}..{:.2} Hz, block {}",
            num_bands,
            band_info.bands_down,
            band_info.bands_up,
            scale,
            band_frequencies[0],
            band_frequencies[num_bands - 1],
            n
        );

        // exp(-c (s(f) - s(b))^2) with c = ln 4 / frac^2; on Log2, s(0) = -inf gives 0 at DC
        let c = 4f64.ln() / (config.fraction * config.fraction);
        let bin_positions: Vec<f64> = bin_frequencies.iter().map(|&f| scale.from_hz(f)).collect();

        let mut atoms: Vec<Vec<f64>> = band_positions
            .iter()
            .map(|&center| {
                bin_positions
                    .iter()
                    .map(|&position| {
                        let distance = position - center;
                        (-c * distance * distance).exp()
                    })
                    .collect()
            })
            .collect();

        // Edge bands pass everything beyond their centers
        let lowest = band_positions[0];
        let highest = band_positions[num_bands - 1];
        for (i, &position) in bin_positions.iter().enumerate() {
            if position < lowest {
                atoms[0][i] = 1.0;
            }
            if position > highest {
                atoms[num_bands - 1][i] = 1.0;
            }
        }

        for atom in atoms.iter_mut() {
            if let Some(th) = threshold {
                atom.iter_mut().filter(|v| **v <= th).for_each(|v| *v = 0.0);
            }
            atom[half + 1..].fill(0.0);
        }

        let diagonal: Vec<f64> = (0..=half)
            .map(|i| atoms.iter().map(|atom| atom[i] * atom[i]).sum())
            .collect();

        let dual_atoms: Vec<Vec<f64>> = atoms
            .iter()
            .map(|atom| {
                let mut dual = vec![0.0; n];
                for (i, &d) in diagonal.iter().enumerate() {
                    dual[i] = atom[i] / d;
                }
                dual
            })
            .collect();

        let to_t = |values: &[f64]| values.iter().map(|&v| from_f64::<T>(v)).collect::<Vec<T>>();

        let filterbank = Self {
            config,
            band_info,
            band_frequencies: to_t(&band_frequencies),
            bin_frequencies: to_t(&bin_frequencies),
            atoms: atoms.iter().map(|a| to_t(a)).collect(),
            dual_atoms: dual_atoms.iter().map(|a| to_t(a)).collect(),
            diagonal: to_t(&diagonal),
        };

        let error = filterbank.dual_frame_error();
        trace!("filterbank: dual frame RMS error {:e}", error.to_f64().unwrap_or(f64::NAN));
        // an empty diagonal bin shows up as NaN
        if error.is_nan() || error > Self::invertibility_tolerance() {
            return Err(ConfigError::NotInvertible {
                rms: error.to_f64().unwrap_or(f64::NAN),
            });
        }

        Ok(filterbank)
    }

    fn invertibility_tolerance() -> T {
        T::epsilon().sqrt()
    }

    pub fn config(&self) -> &CqtConfig {
        &self.config
    }

    pub fn band_info(&self) -> BandInfo {
        self.band_info
    }

    pub fn num_bands(&self) -> usize {
        self.band_info.num_bands
    }

    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Band center frequencies in Hz, increasing
    pub fn band_frequencies(&self) -> &[T] {
        &self.band_frequencies
    }

    /// Frequency of every DFT bin of a block, `i * fs / N`
    pub fn bin_frequencies(&self) -> &[T] {
        &self.bin_frequencies
    }

    pub fn atoms(&self) -> &[Vec<T>] {
        &self.atoms
    }

    pub fn atom(&self, band: usize) -> &[T] {
        &self.atoms[band]
    }

    pub fn dual_atoms(&self) -> &[Vec<T>] {
        &self.dual_atoms
    }

    pub fn dual_atom(&self, band: usize) -> &[T] {
        &self.dual_atoms[band]
    }

    /// Per-bin energy `Σ_k g²` over bins `0..=N/2`
    pub fn diagonal(&self) -> &[T] {
        &self.diagonal
    }

    /// RMS deviation of `Σ_k g·gDual` from one over bins `0..=N/2`
    pub fn dual_frame_error(&self) -> T {
        let deviation: Vec<T> = (0..self.diagonal.len())
            .map(|i| {
                let sum = self
                    .atoms
                    .iter()
                    .zip(&self.dual_atoms)
                    .fold(T::zero(), |acc, (g, gd)| acc + g[i] * gd[i]);
                sum - T::one()
            })
            .collect();
        rms(&deviation)
    }

    /// Spans of every band, for the sparse layout
    pub(crate) fn spans(&self, threshold: f64) -> Result<Vec<BandSpan>, ConfigError> {
        let threshold = from_f64::<T>(threshold);
        self.atoms
            .iter()
            .enumerate()
            .map(|(band, atom)| find_span(atom, threshold).ok_or(ConfigError::EmptyBand { band }))
            .collect()
    }
}

/// First-to-last span of bins strictly above `threshold`, widened to a power of
/// two (at least 4) and shifted down if it would run past the end of `atom`.
pub fn find_span<T: FftNum>(atom: &[T], threshold: T) -> Option<BandSpan> {
    let first = atom.iter().position(|&v| v > threshold)?;
    let last = atom.iter().rposition(|&v| v > threshold)?;

    let len = (last - first + 1).next_power_of_two().max(4);
    let start = first.min(atom.len().saturating_sub(len));
    Some(BandSpan { start, len })
}

/// Twiddles `exp(i·2π·start·n/len)` undoing the circular shift of extracting a
/// span that does not start at bin zero
pub(crate) fn phase_vector<T: FftNum>(span: BandSpan) -> Vec<Complex<T>> {
    let two_pi = 2.0 * std::f64::consts::PI;
    (0..span.len)
        .map(|n| {
            // reduce first so the angle stays exact for large spans
            let turns = ((span.start * n) % span.len) as f64 / span.len as f64;
            let (sin, cos) = (two_pi * turns).sin_cos();
            Complex::new(from_f64(cos), from_f64(sin))
        })
        .collect()
}
