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

//! Dense layout: every band keeps a full block of complex coefficients.

use log::debug;
use std::ops::{Index, IndexMut};
use std::slice::{ChunksExact, ChunksExactMut};

use crate::fft_backend::{Complex, Dft, DftBackend, FftNum};
use crate::filterbank::Filterbank;
use crate::rt_check::RealtimeGuard;
use crate::{ConfigError, CqtConfig};

/// Column-major complex matrix, one column per band.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<Complex<T>>,
}

impl<T: FftNum> CoefMatrix<T> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![Complex::new(T::zero(), T::zero()); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn col(&self, col: usize) -> &[Complex<T>] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    #[inline]
    pub fn col_mut(&mut self, col: usize) -> &mut [Complex<T>] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    pub fn columns(&self) -> ChunksExact<'_, Complex<T>> {
        self.data.chunks_exact(self.rows.max(1))
    }

    pub fn columns_mut(&mut self) -> ChunksExactMut<'_, Complex<T>> {
        self.data.chunks_exact_mut(self.rows.max(1))
    }

    pub fn as_slice(&self) -> &[Complex<T>] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex<T>] {
        &mut self.data
    }

    pub fn fill_zero(&mut self) {
        self.data.fill(Complex::new(T::zero(), T::zero()));
    }
}

impl<T> Index<(usize, usize)> for CoefMatrix<T> {
    type Output = Complex<T>;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Complex<T> {
        &self.data[col * self.rows + row]
    }
}

impl<T> IndexMut<(usize, usize)> for CoefMatrix<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Complex<T> {
        &mut self.data[col * self.rows + row]
    }
}

/// NSGF-CQT with full-length coefficients for every band.
///
/// `forward` maps a real block of `N` samples to an `N × K` matrix whose column
/// `k` is the band-pass analytic signal of band `k`; `inverse` maps it back.
/// Scratch space is allocated here, so neither direction touches the heap.
pub struct NsgfCqtDense<T: FftNum> {
    filterbank: Filterbank<T>,
    dft: Dft<T>,
    spectrum: Vec<Complex<T>>,
    band_spectra: CoefMatrix<T>,
}

impl<T: FftNum> NsgfCqtDense<T> {
    pub fn new(config: CqtConfig) -> Result<Self, ConfigError> {
        let filterbank = Filterbank::new(config)?;
        let n = config.block_size;
        let num_bands = filterbank.num_bands();

        debug!("dense cqt: {} x {} coefficient matrix", n, num_bands);

        Ok(Self {
            dft: Dft::new(n),
            spectrum: vec![Complex::new(T::zero(), T::zero()); n],
            band_spectra: CoefMatrix::zeros(n, num_bands),
            filterbank,
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
        self.filterbank.num_bands()
    }

    /// Zeroed container shaped for [`forward`](Self::forward)
    pub fn coefs(&self) -> CoefMatrix<T> {
        CoefMatrix::zeros(self.block_size(), self.num_bands())
    }

    pub fn forward(&mut self, x: &[T], coefs: &mut CoefMatrix<T>) {
        let _guard = RealtimeGuard::enter();
        let n = self.block_size();
        debug_assert_eq!(x.len(), n, "block length");
        debug_assert_eq!(coefs.rows(), n, "coefficient rows");
        debug_assert_eq!(coefs.cols(), self.num_bands(), "band count");

        self.dft.rdft(x, &mut self.spectrum);

        let two = T::one() + T::one();
        for (band, atom) in self.band_spectra.columns_mut().zip(self.filterbank.atoms()) {
            for ((out, &bin), &g) in band.iter_mut().zip(&self.spectrum).zip(atom) {
                *out = bin * (two * g);
            }
        }

        self.dft.idft_columns(&self.band_spectra, coefs);
    }

    pub fn inverse(&mut self, coefs: &CoefMatrix<T>, x: &mut [T]) {
        let _guard = RealtimeGuard::enter();
        let n = self.block_size();
        debug_assert_eq!(x.len(), n, "block length");
        debug_assert_eq!(coefs.rows(), n, "coefficient rows");
        debug_assert_eq!(coefs.cols(), self.num_bands(), "band count");

        self.dft.dft_columns(coefs, &mut self.band_spectra);

        let half = T::one() / (T::one() + T::one());
        self.spectrum.fill(Complex::new(T::zero(), T::zero()));
        for (band, dual) in self.band_spectra.columns().zip(self.filterbank.dual_atoms()) {
            for ((acc, &y), &gd) in self.spectrum.iter_mut().zip(band).zip(dual) {
                *acc = *acc + y * (gd * half);
            }
        }

        self.dft.irdft(&self.spectrum, x);
    }
}
