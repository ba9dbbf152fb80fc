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

//! Sample-in/sample-out streaming around a CQT.
//!
//! [`CqtProcessor`] slices the input into half-overlapping blocks, windows them
//! with a square-root Hann window, runs the transform, hands the coefficients
//! to a [`BlockProcessor`] hook, resynthesizes, windows again and overlap-adds.
//! With an identity hook the output is the input delayed by
//! [`latency`](CqtProcessor::latency) samples.
//!
//! In [`ProcessingMode::Sliding`] the hook does not see a block's coefficients
//! directly. Each analysis block is windowed band by band, and the hook gets
//! the composite of the current block's first half and the previous block's
//! second half, which covers a single hop of time. Two consecutive composites
//! are joined back into one block for resynthesis, which adds half a block of
//! latency.

use log::debug;

use crate::dense::{CoefMatrix, NsgfCqtDense};
use crate::double_buffer::DoubleBuffer;
use crate::fft_backend::{Complex, FftNum};
use crate::rt_check::RealtimeGuard;
use crate::slicing::{Slicer, Splicer};
use crate::sparse::{NsgfCqtSparse, SparseCoefs};
use crate::{ConfigError, CqtConfig, WindowType, generate_window, simd};

/// Uniform per-band access to a coefficient container.
pub trait BandCoefs<T: FftNum> {
    fn num_bands(&self) -> usize;

    fn band(&self, band: usize) -> &[Complex<T>];

    fn band_mut(&mut self, band: usize) -> &mut [Complex<T>];

    fn fill_zero(&mut self) {
        for band in 0..self.num_bands() {
            self.band_mut(band).fill(Complex::new(T::zero(), T::zero()));
        }
    }
}

impl<T: FftNum> BandCoefs<T> for CoefMatrix<T> {
    fn num_bands(&self) -> usize {
        self.cols()
    }

    fn band(&self, band: usize) -> &[Complex<T>] {
        self.col(band)
    }

    fn band_mut(&mut self, band: usize) -> &mut [Complex<T>] {
        self.col_mut(band)
    }

    fn fill_zero(&mut self) {
        CoefMatrix::fill_zero(self);
    }
}

impl<T: FftNum> BandCoefs<T> for SparseCoefs<T> {
    fn num_bands(&self) -> usize {
        self.len()
    }

    fn band(&self, band: usize) -> &[Complex<T>] {
        &self[band]
    }

    fn band_mut(&mut self, band: usize) -> &mut [Complex<T>] {
        &mut self[band]
    }
}

/// Block transform driven by [`CqtProcessor`].
pub trait CqtTransform {
    type Sample: FftNum;
    type Coefs: BandCoefs<Self::Sample> + Clone;

    fn new(config: CqtConfig) -> Result<Self, ConfigError>
    where
        Self: Sized;

    fn config(&self) -> &CqtConfig;

    fn num_bands(&self) -> usize;

    /// Coefficients per block in `band`
    fn band_len(&self, band: usize) -> usize;

    /// Zeroed container for one block
    fn coefs(&self) -> Self::Coefs;

    /// Zeroed container holding half a block per band
    fn half_coefs(&self) -> Self::Coefs;

    fn forward(&mut self, x: &[Self::Sample], coefs: &mut Self::Coefs);

    fn inverse(&mut self, coefs: &Self::Coefs, x: &mut [Self::Sample]);
}

impl<T: FftNum> CqtTransform for NsgfCqtDense<T> {
    type Sample = T;
    type Coefs = CoefMatrix<T>;

    fn new(config: CqtConfig) -> Result<Self, ConfigError> {
        NsgfCqtDense::new(config)
    }

    fn config(&self) -> &CqtConfig {
        NsgfCqtDense::config(self)
    }

    fn num_bands(&self) -> usize {
        NsgfCqtDense::num_bands(self)
    }

    fn band_len(&self, _band: usize) -> usize {
        self.block_size()
    }

    fn coefs(&self) -> CoefMatrix<T> {
        NsgfCqtDense::coefs(self)
    }

    fn half_coefs(&self) -> CoefMatrix<T> {
        CoefMatrix::zeros(self.block_size() / 2, NsgfCqtDense::num_bands(self))
    }

    fn forward(&mut self, x: &[T], coefs: &mut CoefMatrix<T>) {
        NsgfCqtDense::forward(self, x, coefs);
    }

    fn inverse(&mut self, coefs: &CoefMatrix<T>, x: &mut [T]) {
        NsgfCqtDense::inverse(self, coefs, x);
    }
}

impl<T: FftNum> CqtTransform for NsgfCqtSparse<T> {
    type Sample = T;
    type Coefs = SparseCoefs<T>;

    fn new(config: CqtConfig) -> Result<Self, ConfigError> {
        NsgfCqtSparse::new(config)
    }

    fn config(&self) -> &CqtConfig {
        NsgfCqtSparse::config(self)
    }

    fn num_bands(&self) -> usize {
        NsgfCqtSparse::num_bands(self)
    }

    fn band_len(&self, band: usize) -> usize {
        self.band_span(band).len
    }

    fn coefs(&self) -> SparseCoefs<T> {
        NsgfCqtSparse::coefs(self)
    }

    fn half_coefs(&self) -> SparseCoefs<T> {
        self.valid_coefs()
    }

    fn forward(&mut self, x: &[T], coefs: &mut SparseCoefs<T>) {
        NsgfCqtSparse::forward(self, x, coefs);
    }

    fn inverse(&mut self, coefs: &SparseCoefs<T>, x: &mut [T]) {
        NsgfCqtSparse::inverse(self, coefs, x);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Hook sees each analysis block; one block of latency
    #[default]
    Direct,

    /// Hook sees half-block composites of adjacent blocks; 1.5 blocks of latency
    Sliding,
}

/// Per-block hook: may read or modify coefficients in place, never resize them.
pub trait BlockProcessor<K> {
    fn process_block(&mut self, coefs: &mut K);
}

impl<K, F> BlockProcessor<K> for F
where
    F: FnMut(&mut K),
{
    fn process_block(&mut self, coefs: &mut K) {
        self(coefs)
    }
}

/// Hook that leaves coefficients untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<K> BlockProcessor<K> for Passthrough {
    fn process_block(&mut self, _coefs: &mut K) {}
}

pub type CqtDenseProcessor<T, H = Passthrough> = CqtProcessor<NsgfCqtDense<T>, H>;
pub type CqtSparseProcessor<T, H = Passthrough> = CqtProcessor<NsgfCqtSparse<T>, H>;

struct SlidingStage<C: CqtTransform> {
    band_windows: Vec<Vec<C::Sample>>,
    analysis: DoubleBuffer<C::Coefs>,
    halves: DoubleBuffer<C::Coefs>,
    joined: C::Coefs,
}

impl<C: CqtTransform> SlidingStage<C> {
    fn new(cqt: &C) -> Self {
        let band_windows = (0..cqt.num_bands())
            .map(|band| generate_window(WindowType::SqrtHann, cqt.band_len(band)))
            .collect();
        Self {
            band_windows,
            analysis: DoubleBuffer::new(cqt.coefs()),
            halves: DoubleBuffer::new(cqt.half_coefs()),
            joined: cqt.coefs(),
        }
    }

    fn process<H: BlockProcessor<C::Coefs>>(&mut self, cqt: &mut C, block: &mut [C::Sample], hook: &mut H) {
        let current = self.analysis.next_slot();
        cqt.forward(block, current);
        apply_band_windows(current, &self.band_windows);

        let composite = self.halves.next_slot();
        overlap_halves(self.analysis.current(), self.analysis.last(), composite);
        hook.process_block(composite);

        join_halves(self.halves.last(), self.halves.current(), &mut self.joined);
        apply_band_windows(&mut self.joined, &self.band_windows);
        cqt.inverse(&self.joined, block);
    }

    fn reset(&mut self) {
        for buffer in [&mut self.analysis, &mut self.halves] {
            buffer.current_mut().fill_zero();
            buffer.last_mut().fill_zero();
        }
        self.joined.fill_zero();
    }
}

enum Stage<C: CqtTransform> {
    Direct(C::Coefs),
    Sliding(SlidingStage<C>),
}

struct Engine<C: CqtTransform> {
    cqt: C,
    window: Vec<C::Sample>,
    slicer: Slicer<C::Sample>,
    splicer: Splicer<C::Sample>,
    block: Vec<C::Sample>,
    stage: Stage<C>,
}

impl<C: CqtTransform> Engine<C> {
    fn new(config: CqtConfig, mode: ProcessingMode) -> Result<Self, ConfigError> {
        let cqt = C::new(config)?;
        let n = config.block_size;

        let stage = match mode {
            ProcessingMode::Direct => Stage::Direct(cqt.coefs()),
            ProcessingMode::Sliding => Stage::Sliding(SlidingStage::new(&cqt)),
        };
        debug!(
            "cqt processor: {:?} mode, block {}, hop {}, {} bands",
            mode,
            n,
            config.hop_size(),
            cqt.num_bands()
        );

        Ok(Self {
            window: generate_window(WindowType::SqrtHann, n),
            slicer: Slicer::new(n, config.hop_size()),
            splicer: Splicer::new(n, config.hop_size()),
            block: vec![<C::Sample as num_traits::Zero>::zero(); n],
            stage,
            cqt,
        })
    }

    fn process_block<H: BlockProcessor<C::Coefs>>(&mut self, hook: &mut H) {
        self.block.copy_from_slice(self.slicer.next_block());
        simd::apply_window(&mut self.block, &self.window);

        match &mut self.stage {
            Stage::Direct(coefs) => {
                self.cqt.forward(&self.block, coefs);
                hook.process_block(coefs);
                self.cqt.inverse(coefs, &mut self.block);
            }
            Stage::Sliding(stage) => stage.process(&mut self.cqt, &mut self.block, hook),
        }

        simd::apply_window(&mut self.block, &self.window);
        self.splicer.push_block(&self.block);
    }

    fn reset(&mut self) {
        self.slicer.reset();
        self.splicer.reset();
        self.block.fill(<C::Sample as num_traits::Zero>::zero());
        match &mut self.stage {
            Stage::Direct(coefs) => coefs.fill_zero(),
            Stage::Sliding(stage) => stage.reset(),
        }
    }
}

/// Streaming CQT processor with a per-block hook.
///
/// A processor built with [`uninitialized`](Self::uninitialized) outputs
/// silence until [`initialize`](Self::initialize) succeeds, so it can be
/// created before the host's sample rate is known.
pub struct CqtProcessor<C: CqtTransform, H = Passthrough> {
    mode: ProcessingMode,
    engine: Option<Engine<C>>,
    hook: H,
}

impl<C: CqtTransform, H: BlockProcessor<C::Coefs> + Default> Default for CqtProcessor<C, H> {
    fn default() -> Self {
        Self::uninitialized(ProcessingMode::default(), H::default())
    }
}

impl<C: CqtTransform, H: BlockProcessor<C::Coefs>> CqtProcessor<C, H> {
    pub fn new(config: CqtConfig, mode: ProcessingMode, hook: H) -> Result<Self, ConfigError> {
        let mut processor = Self::uninitialized(mode, hook);
        processor.initialize(config)?;
        Ok(processor)
    }

    pub fn direct(config: CqtConfig, hook: H) -> Result<Self, ConfigError> {
        Self::new(config, ProcessingMode::Direct, hook)
    }

    pub fn sliding(config: CqtConfig, hook: H) -> Result<Self, ConfigError> {
        Self::new(config, ProcessingMode::Sliding, hook)
    }

    pub fn uninitialized(mode: ProcessingMode, hook: H) -> Self {
        Self {
            mode,
            engine: None,
            hook,
        }
    }

    /// Build the transform and every buffer for `config`, replacing any
    /// previous state. Allocates; call from a non-real-time thread.
    ///
    /// On error the processor keeps its previous state.
    pub fn initialize(&mut self, config: CqtConfig) -> Result<(), ConfigError> {
        self.engine = Some(Engine::new(config, self.mode)?);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn config(&self) -> Option<&CqtConfig> {
        self.engine.as_ref().map(|engine| engine.cqt.config())
    }

    pub fn cqt(&self) -> Option<&C> {
        self.engine.as_ref().map(|engine| &engine.cqt)
    }

    /// Delay in samples between input and output; zero while uninitialized
    pub fn latency(&self) -> usize {
        let Some(config) = self.config() else {
            return 0;
        };
        match self.mode {
            ProcessingMode::Direct => config.block_size,
            ProcessingMode::Sliding => config.block_size + config.block_size / 2,
        }
    }

    /// Analysis and synthesis window
    pub fn window(&self) -> Option<&[C::Sample]> {
        self.engine.as_ref().map(|engine| engine.window.as_slice())
    }

    /// Coefficient-domain window of `band` (sliding mode only)
    pub fn band_window(&self, band: usize) -> Option<&[C::Sample]> {
        match &self.engine.as_ref()?.stage {
            Stage::Sliding(stage) => stage.band_windows.get(band).map(Vec::as_slice),
            Stage::Direct(_) => None,
        }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn hook_mut(&mut self) -> &mut H {
        &mut self.hook
    }

    pub fn into_hook(self) -> H {
        self.hook
    }

    /// Zero all streaming state without reallocating
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
    }

    /// Push one input sample and pop one output sample.
    pub fn process_sample(&mut self, sample: C::Sample) -> C::Sample {
        let Some(engine) = self.engine.as_mut() else {
            return <C::Sample as num_traits::Zero>::zero();
        };
        let _guard = RealtimeGuard::enter();

        engine.slicer.push_sample(sample);
        let out = engine.splicer.next_sample();
        if engine.slicer.has_block() {
            engine.process_block(&mut self.hook);
        }
        out
    }

    /// [`process_sample`](Self::process_sample) over a buffer
    pub fn process(&mut self, input: &[C::Sample], output: &mut [C::Sample]) {
        debug_assert_eq!(input.len(), output.len());
        for (out, &sample) in output.iter_mut().zip(input) {
            *out = self.process_sample(sample);
        }
    }
}

fn apply_band_windows<T: FftNum, K: BandCoefs<T>>(coefs: &mut K, windows: &[Vec<T>]) {
    for (band, window) in windows.iter().enumerate() {
        for (c, &w) in coefs.band_mut(band).iter_mut().zip(window) {
            *c = *c * w;
        }
    }
}

/// `out = current[..half] + last[half..]` per band, `half` being the length of
/// each band of `out`
fn overlap_halves<T: FftNum, K: BandCoefs<T>>(current: &K, last: &K, out: &mut K) {
    for band in 0..out.num_bands() {
        let dst = out.band_mut(band);
        let half = dst.len();
        let head = &current.band(band)[..half];
        let tail = &last.band(band)[half..];
        for ((d, &a), &b) in dst.iter_mut().zip(head).zip(tail) {
            *d = a + b;
        }
    }
}

/// `out = [first; second]` per band
fn join_halves<T: FftNum, K: BandCoefs<T>>(first: &K, second: &K, out: &mut K) {
    for band in 0..out.num_bands() {
        let dst = out.band_mut(band);
        let half = dst.len() / 2;
        dst[..half].copy_from_slice(first.band(band));
        dst[half..].copy_from_slice(second.band(band));
    }
}
