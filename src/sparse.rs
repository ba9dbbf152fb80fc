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

//! Sparse layout: every band keeps only the power-of-two span of bins its atom
//! occupies, so narrow bands cost a short DFT instead of a full-block one.

use log::{debug, trace, warn};

use crate::dense::CoefMatrix;
use crate::fft_backend::{Complex, Dft, DftBackend, DftPlanner, DftPlannerTrait, FftNum, from_usize};
use crate::filterbank::{BandSpan, Filterbank, phase_vector};
use crate::rt_check::RealtimeGuard;
use crate::simd;
use crate::{ConfigError, CqtConfig};

/// One complex vector per band; band `k` holds `band_span(k).len` coefficients.
pub type SparseCoefs<T> = Vec<Vec<Complex<T>>>;

/// NSGF-CQT with per-band compacted coefficients.
///
/// Coefficients of band `k` are the dense band signal sampled every
/// `N / len[k]` samples, which is exact because the band's spectrum fits in its
/// span.
pub struct NsgfCqtSparse<T: FftNum> {
    filterbank: Filterbank<T>,
    spans: Vec<BandSpan>,
    phases: Vec<Vec<Complex<T>>>,
    dft: Dft<T>,
    band_dfts: Vec<Dft<T>>,
    spectrum: Vec<Complex<T>>,
    band_buffers: SparseCoefs<T>,
}

impl<T: FftNum> NsgfCqtSparse<T> {
    pub fn new(config: CqtConfig) -> Result<Self, ConfigError> {
        let threshold = Filterbank::<T>::SPARSE_THRESHOLD;
        let filterbank = Filterbank::with_threshold(config, threshold)?;
        let spans = filterbank.spans(threshold)?;
        let n = config.block_size;

        let mut planner = DftPlanner::<T>::new();
        let dft = planner.plan_dft(n);

        for (band, span) in spans.iter().enumerate() {
            trace!("sparse cqt: band {} spans bins {}..{}", band, span.start, span.end());
            if span.len == n {
                warn!("sparse cqt: band {} covers the whole block ({} bins)", band, n);
            }
        }

        let band_dfts = spans.iter().map(|span| planner.plan_dft(span.len)).collect();
        let phases = spans.iter().map(|&span| phase_vector(span)).collect();
        let band_buffers = zeroed(&spans, 1);

        debug!(
            "sparse cqt: {} bands, {} coefficients per block ({} dense)",
            spans.len(),
            spans.iter().map(|s| s.len).sum::<usize>(),
            n * spans.len()
        );

        Ok(Self {
            filterbank,
            spans,
            phases,
            dft,
            band_dfts,
            spectrum: vec![Complex::new(T::zero(), T::zero()); n],
            band_buffers,
        })
    }

    pub fn config(&self) -> &CqtConfig {
        self.filterbank.config()
    }

    pub fn filterbank(&self) -> &Filterbank<T> {
        &self.filterbank
    }

    pub fn block_size(&self) -> usize {
        self.filterbank.block_size()
    }

    pub fn num_bands(&self) -> usize {
        self.spans.len()
    }

    pub fn spans(&self) -> &[BandSpan] {
        &self.spans
    }

    pub fn band_span(&self, band: usize) -> BandSpan {
        self.spans[band]
    }

    /// Atom of `band` restricted to its span
    pub fn atom(&self, band: usize) -> &[T] {
        &self.filterbank.atom(band)[self.spans[band].range()]
    }

    /// Dual atom of `band` restricted to its span
    pub fn dual_atom(&self, band: usize) -> &[T] {
        &self.filterbank.dual_atom(band)[self.spans[band].range()]
    }

    /// Frequencies in Hz of the bins in the span of `band`
    pub fn band_frequency_axis(&self, band: usize) -> &[T] {
        &self.filterbank.bin_frequencies()[self.spans[band].range()]
    }

    pub fn phase(&self, band: usize) -> &[Complex<T>] {
        &self.phases[band]
    }

    /// Zeroed container shaped for [`forward`](Self::forward)
    pub fn coefs(&self) -> SparseCoefs<T> {
        zeroed(&self.spans, 1)
    }

    /// Zeroed half-length container per band, the shape exchanged between
    /// adjacent blocks in sliding mode
    pub fn valid_coefs(&self) -> SparseCoefs<T> {
        zeroed(&self.spans, 2)
    }

    pub fn real_coefs(&self) -> Vec<Vec<T>> {
        self.spans.iter().map(|span| vec![T::zero(); span.len]).collect()
    }

    pub fn forward(&mut self, x: &[T], coefs: &mut SparseCoefs<T>) {
        let _guard = RealtimeGuard::enter();
        let n = self.block_size();
        debug_assert_eq!(x.len(), n, "block length");
        debug_assert_eq!(coefs.len(), self.num_bands(), "band count");

        self.spectrum.fill(Complex::new(T::zero(), T::zero()));
        self.dft.rdft(x, &mut self.spectrum);
        let norm = T::one() / from_usize::<T>(n);
        for bin in self.spectrum[..n / 2 + 1].iter_mut() {
            *bin = *bin * norm;
        }

        for (band, span) in self.spans.iter().enumerate() {
            let atom = &self.filterbank.atom(band)[span.range()];
            let buffer = &mut self.band_buffers[band];
            for ((b, &bin), &g) in buffer.iter_mut().zip(&self.spectrum[span.range()]).zip(atom) {
                *b = bin * g;
            }
            self.band_dfts[band].idft_in_place(buffer);

            let gain = from_usize::<T>(2 * span.len);
            let out = &mut coefs[band];
            debug_assert_eq!(out.len(), span.len, "coefficients of band {}", band);
            for ((c, &b), &p) in out.iter_mut().zip(buffer.iter()).zip(&self.phases[band]) {
                *c = p * b * gain;
            }
        }
    }

    pub fn inverse(&mut self, coefs: &SparseCoefs<T>, x: &mut [T]) {
        let _guard = RealtimeGuard::enter();
        let n = self.block_size();
        debug_assert_eq!(x.len(), n, "block length");
        debug_assert_eq!(coefs.len(), self.num_bands(), "band count");

        self.spectrum.fill(Complex::new(T::zero(), T::zero()));

        for (band, span) in self.spans.iter().enumerate() {
            let gain = T::one() / from_usize::<T>(2 * span.len);
            let buffer = &mut self.band_buffers[band];
            debug_assert_eq!(coefs[band].len(), span.len, "coefficients of band {}", band);
            for ((b, &c), p) in buffer.iter_mut().zip(&coefs[band]).zip(&self.phases[band]) {
                *b = p.conj() * c * gain;
            }
            self.band_dfts[band].dft_in_place(buffer);

            // bands overlap in frequency
            let dual = &self.filterbank.dual_atom(band)[span.range()];
            for ((acc, &b), &gd) in self.spectrum[span.range()].iter_mut().zip(buffer.iter()).zip(dual) {
                *acc = *acc + b * gd;
            }
        }

        self.dft.irdft(&self.spectrum, x);
        simd::scale_in_place(x, from_usize::<T>(n));
    }

    /// Resample every band to the full block length.
    ///
    /// The result equals what [`NsgfCqtDense::forward`](crate::NsgfCqtDense::forward)
    /// produces for the same filterbank, which makes sparse output directly
    /// comparable and displayable. Allocates; not for the real-time path.
    pub fn rasterize(&mut self, coefs: &SparseCoefs<T>) -> CoefMatrix<T> {
        let n = self.block_size();
        debug_assert_eq!(coefs.len(), self.num_bands(), "band count");

        let mut out = CoefMatrix::zeros(n, self.num_bands());
        let mut baseband = Vec::with_capacity(n);

        for (band, span) in self.spans.iter().enumerate() {
            baseband.clear();
            baseband.extend(coefs[band].iter().zip(&self.phases[band]).map(|(&c, p)| p.conj() * c));
            self.band_dfts[band].dft_in_place(&mut baseband);

            let gain = from_usize::<T>(n / span.len);
            let column = out.col_mut(band);
            for (dst, &b) in column[span.range()].iter_mut().zip(&baseband) {
                *dst = b * gain;
            }
            self.dft.idft_in_place(column);
        }

        out
    }
}

fn zeroed<T: FftNum>(spans: &[BandSpan], divisor: usize) -> SparseCoefs<T> {
    spans
        .iter()
        .map(|span| vec![Complex::new(T::zero(), T::zero()); span.len / divisor])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NsgfCqtDense;

    fn reference_config(block_size: usize) -> CqtConfig {
        CqtConfig::new(48000.0, block_size, 1.0, 100.0, 10000.0, 1500.0).unwrap()
    }

    #[test]
    fn test_spans_are_valid() {
        let cqt = NsgfCqtSparse::<f64>::new(reference_config(4096)).unwrap();
        assert_eq!(cqt.num_bands(), 8);

        for (band, span) in cqt.spans().iter().enumerate() {
            assert!(span.len.is_power_of_two() && span.len >= 4, "band {}: {:?}", band, span);
            assert!(span.end() <= 4096, "band {}: {:?}", band, span);
            assert_eq!(cqt.atom(band).len(), span.len);
            assert_eq!(cqt.phase(band).len(), span.len);
            assert_eq!(cqt.band_frequency_axis(band).len(), span.len);
        }

        // lowest band is clamped to one down to DC
        assert_eq!(cqt.band_span(0).start, 0);
        // narrow low bands compact well
        assert!(cqt.band_span(1).len < 4096 / 8);
    }

    #[test]
    fn test_container_shapes() {
        let cqt = NsgfCqtSparse::<f32>::new(reference_config(2048)).unwrap();
        let coefs = cqt.coefs();
        let valid = cqt.valid_coefs();
        let real = cqt.real_coefs();

        for band in 0..cqt.num_bands() {
            let len = cqt.band_span(band).len;
            assert_eq!(coefs[band].len(), len);
            assert_eq!(valid[band].len(), len / 2);
            assert_eq!(real[band].len(), len);
        }
    }

    #[test]
    fn test_sparse_roundtrip_impulse() {
        let mut cqt = NsgfCqtSparse::<f64>::new(reference_config(1024)).unwrap();
        let mut x = vec![0.0; 1024];
        x[500] = 1.0;
        x[501] = -0.5;

        let mut coefs = cqt.coefs();
        let mut y = vec![0.0; 1024];
        cqt.forward(&x, &mut coefs);
        cqt.inverse(&coefs, &mut y);

        let max_err = x.iter().zip(&y).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
        assert!(max_err < 1e-12, "max error {:e}", max_err);
    }

    #[test]
    fn test_rasterize_matches_dense() {
        let config = reference_config(1024);
        let mut sparse = NsgfCqtSparse::<f64>::new(config).unwrap();
        let mut dense = NsgfCqtDense::<f64>::new(config).unwrap();

        let x: Vec<f64> = (0..1024)
            .map(|i| (2.0 * std::f64::consts::PI * 1500.0 * i as f64 / 48000.0).sin())
            .collect();

        let mut sparse_coefs = sparse.coefs();
        let mut dense_coefs = dense.coefs();
        sparse.forward(&x, &mut sparse_coefs);
        dense.forward(&x, &mut dense_coefs);

        let raster = sparse.rasterize(&sparse_coefs);
        assert_eq!(raster.rows(), 1024);
        assert_eq!(raster.cols(), 8);

        // differ only by atom values below the sparse threshold
        let max_err = raster
            .as_slice()
            .iter()
            .zip(dense_coefs.as_slice())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-4, "max error {:e}", max_err);
    }
}
