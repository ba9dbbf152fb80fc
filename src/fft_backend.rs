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

//! DFT engine abstraction layer
//!
//! Every transform in this crate talks to its DFTs through [`DftBackend`], a
//! fixed-size engine that owns its plans and scratch memory so that none of the
//! per-block operations touch the heap. Engines are created once per size by a
//! [`DftPlannerTrait`] implementation selected at build time:
//! - `rustfft-backend`: `rustfft` for complex transforms, `realfft` for the
//!   real-to-complex pair (default)
//!
//! Normalization is fixed across engines: the forward transforms (`dft`,
//! `rdft`) are unnormalized and the inverse transforms (`idft`, `irdft`) scale
//! by `1/N`.

use num_traits::{Float, FloatConst, FromPrimitive};
use std::fmt;

use crate::dense::CoefMatrix;

// Re-export Complex type from rustfft's num_complex
#[cfg(feature = "rustfft-backend")]
pub use rustfft::num_complex::Complex;

/// Sample type accepted by the transforms (`f32` or `f64`).
#[cfg(feature = "rustfft-backend")]
pub trait FftNum:
    Float + FloatConst + FromPrimitive + rustfft::FftNum + fmt::Debug + Send + Sync + 'static
{
}

#[cfg(feature = "rustfft-backend")]
impl FftNum for f32 {}
#[cfg(feature = "rustfft-backend")]
impl FftNum for f64 {}

/// Lossy conversion from `f64`, total for both implementors of [`FftNum`].
#[inline]
pub(crate) fn from_f64<T: FftNum>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

#[inline]
pub(crate) fn from_usize<T: FftNum>(value: usize) -> T {
    T::from_usize(value).unwrap_or_else(T::nan)
}

/// Fixed-size DFT engine.
///
/// Complex buffers are `len()` long. The real transforms read or write the
/// first `len() / 2 + 1` bins of a complex buffer that may be longer; bins
/// above that range are neither read nor written.
pub trait DftBackend<T: FftNum>: Send + Sync {
    /// Transform size
    fn len(&self) -> usize;

    /// Check if the size is zero (always false for planned engines)
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unnormalized forward DFT, in place
    fn dft_in_place(&mut self, buffer: &mut [Complex<T>]);

    /// Inverse DFT scaled by `1/N`, in place
    fn idft_in_place(&mut self, buffer: &mut [Complex<T>]);

    /// Unnormalized real-to-complex DFT into `output[..N/2 + 1]`
    fn rdft(&mut self, input: &[T], output: &mut [Complex<T>]);

    /// Complex-to-real inverse DFT of `input[..N/2 + 1]` scaled by `1/N`.
    ///
    /// The imaginary parts of the DC and Nyquist bins are ignored.
    fn irdft(&mut self, input: &[Complex<T>], output: &mut [T]);

    fn dft(&mut self, input: &[Complex<T>], output: &mut [Complex<T>]) {
        output.copy_from_slice(input);
        self.dft_in_place(output);
    }

    fn idft(&mut self, input: &[Complex<T>], output: &mut [Complex<T>]) {
        output.copy_from_slice(input);
        self.idft_in_place(output);
    }

    /// Column-wise [`dft`](Self::dft)
    fn dft_columns(&mut self, input: &CoefMatrix<T>, output: &mut CoefMatrix<T>) {
        debug_assert_eq!(input.cols(), output.cols());
        for (src, dst) in input.columns().zip(output.columns_mut()) {
            self.dft(src, dst);
        }
    }

    /// Column-wise [`idft`](Self::idft)
    fn idft_columns(&mut self, input: &CoefMatrix<T>, output: &mut CoefMatrix<T>) {
        debug_assert_eq!(input.cols(), output.cols());
        for (src, dst) in input.columns().zip(output.columns_mut()) {
            self.idft(src, dst);
        }
    }

    /// Column-wise [`rdft`](Self::rdft) of a column-major real matrix with
    /// `len()` rows
    fn rdft_columns(&mut self, input: &[T], output: &mut CoefMatrix<T>) {
        debug_assert_eq!(input.len(), self.len() * output.cols());
        for (src, dst) in input.chunks_exact(self.len()).zip(output.columns_mut()) {
            self.rdft(src, dst);
        }
    }

    /// Column-wise [`irdft`](Self::irdft) into a column-major real matrix with
    /// `len()` rows
    fn irdft_columns(&mut self, input: &CoefMatrix<T>, output: &mut [T]) {
        debug_assert_eq!(output.len(), self.len() * input.cols());
        let len = self.len();
        for (src, dst) in input.columns().zip(output.chunks_exact_mut(len)) {
            self.irdft(src, dst);
        }
    }
}

/// Planner creating [`DftBackend`] engines, sharing plans between engines of
/// the same size
pub trait DftPlannerTrait<T: FftNum> {
    type Dft: DftBackend<T>;

    /// Create a new planner
    fn new() -> Self;

    /// Plan an engine for transforms of the given size
    fn plan_dft(&mut self, size: usize) -> Self::Dft;
}

// ============================================================================
// RustFFT Backend Implementation
// ============================================================================

#[cfg(feature = "rustfft-backend")]
mod rustfft_impl {
    use super::*;
    use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
    use rustfft::{Fft, FftPlanner as RustFftPlanner};
    use std::sync::Arc;

    /// Engine built from shared rustfft/realfft plans plus private scratch.
    pub struct RustDft<T: FftNum> {
        len: usize,
        forward: Arc<dyn Fft<T>>,
        inverse: Arc<dyn Fft<T>>,
        real_forward: Arc<dyn RealToComplex<T>>,
        real_inverse: Arc<dyn ComplexToReal<T>>,
        scale: T,
        real_buffer: Vec<T>,
        half_spectrum: Vec<Complex<T>>,
        scratch: Vec<Complex<T>>,
    }

    impl<T: FftNum> RustDft<T> {
        /// Plan a standalone engine; prefer [`DftPlanner::plan_dft`] when
        /// several engines are needed.
        pub fn new(len: usize) -> Self {
            DftPlanner::<T>::new().plan_dft(len)
        }
    }

    impl<T: FftNum> fmt::Debug for RustDft<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RustDft").field("len", &self.len).finish()
        }
    }

    impl<T: FftNum> DftBackend<T> for RustDft<T> {
        fn len(&self) -> usize {
            self.len
        }

        fn dft_in_place(&mut self, buffer: &mut [Complex<T>]) {
            debug_assert_eq!(buffer.len(), self.len);
            let scratch_len = self.forward.get_inplace_scratch_len();
            self.forward
                .process_with_scratch(buffer, &mut self.scratch[..scratch_len]);
        }

        fn idft_in_place(&mut self, buffer: &mut [Complex<T>]) {
            debug_assert_eq!(buffer.len(), self.len);
            let scratch_len = self.inverse.get_inplace_scratch_len();
            self.inverse
                .process_with_scratch(buffer, &mut self.scratch[..scratch_len]);
            for value in buffer.iter_mut() {
                *value = *value * self.scale;
            }
        }

        fn rdft(&mut self, input: &[T], output: &mut [Complex<T>]) {
            let bins = self.len / 2 + 1;
            debug_assert_eq!(input.len(), self.len);
            debug_assert!(output.len() >= bins);

            self.real_buffer.copy_from_slice(input);
            let scratch_len = self.real_forward.get_scratch_len();
            let result = self.real_forward.process_with_scratch(
                &mut self.real_buffer,
                &mut output[..bins],
                &mut self.scratch[..scratch_len],
            );
            debug_assert!(result.is_ok(), "real forward DFT: {:?}", result);
        }

        fn irdft(&mut self, input: &[Complex<T>], output: &mut [T]) {
            let bins = self.len / 2 + 1;
            debug_assert!(input.len() >= bins);
            debug_assert_eq!(output.len(), self.len);

            self.half_spectrum.copy_from_slice(&input[..bins]);
            // realfft rejects spectra that are not Hermitian-consistent
            self.half_spectrum[0].im = T::zero();
            self.half_spectrum[bins - 1].im = T::zero();

            let scratch_len = self.real_inverse.get_scratch_len();
            let result = self.real_inverse.process_with_scratch(
                &mut self.half_spectrum,
                output,
                &mut self.scratch[..scratch_len],
            );
            debug_assert!(result.is_ok(), "real inverse DFT: {:?}", result);
            crate::simd::scale_in_place(output, self.scale);
        }
    }

    /// DFT planner using rustfft and realfft
    pub struct DftPlanner<T: FftNum> {
        complex: RustFftPlanner<T>,
        real: RealFftPlanner<T>,
    }

    impl<T: FftNum> DftPlannerTrait<T> for DftPlanner<T> {
        type Dft = RustDft<T>;

        fn new() -> Self {
            Self {
                complex: RustFftPlanner::new(),
                real: RealFftPlanner::new(),
            }
        }

        fn plan_dft(&mut self, size: usize) -> RustDft<T> {
            debug_assert!(size >= 2 && size % 2 == 0, "DFT size must be even");

            let forward = self.complex.plan_fft_forward(size);
            let inverse = self.complex.plan_fft_inverse(size);
            let real_forward = self.real.plan_fft_forward(size);
            let real_inverse = self.real.plan_fft_inverse(size);

            let scratch_len = forward
                .get_inplace_scratch_len()
                .max(inverse.get_inplace_scratch_len())
                .max(real_forward.get_scratch_len())
                .max(real_inverse.get_scratch_len());

            RustDft {
                len: size,
                forward,
                inverse,
                scale: T::one() / from_usize::<T>(size),
                real_buffer: vec![T::zero(); size],
                half_spectrum: real_inverse.make_input_vec(),
                scratch: vec![Complex::new(T::zero(), T::zero()); scratch_len],
                real_forward,
                real_inverse,
            }
        }
    }
}

#[cfg(feature = "rustfft-backend")]
pub use rustfft_impl::{DftPlanner, RustDft};

/// Engine type selected by the enabled backend feature
#[cfg(feature = "rustfft-backend")]
pub type Dft<T> = RustDft<T>;

// Ensure a backend is enabled
#[cfg(not(feature = "rustfft-backend"))]
compile_error!("A DFT backend must be enabled: 'rustfft-backend'");
