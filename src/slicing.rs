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

//! Sample-stream to block-stream conversion and back.

use num_traits::Float;

use crate::rt_check::RealtimeGuard;

/// Cuts a sample stream into overlapping blocks.
///
/// Samples are written twice, `buffer_size` apart, so the most recent block is
/// always a contiguous slice.
#[derive(Debug, Clone)]
pub struct Slicer<T> {
    buffer: Vec<T>,
    buffer_size: usize,
    block_size: usize,
    hop_size: usize,
    write_pos: usize,
    // pushes since the last block boundary, independent of buffer wrap
    since_block: usize,
}

impl<T: Float> Slicer<T> {
    /// # Panics
    ///
    /// If `hop_size` is zero or larger than `block_size`.
    pub fn new(block_size: usize, hop_size: usize) -> Self {
        assert!(
            hop_size > 0 && hop_size <= block_size,
            "hop size {} must be in 1..={}",
            hop_size,
            block_size
        );
        let buffer_size = (block_size + 1).next_power_of_two();

        let mut slicer = Self {
            buffer: vec![T::zero(); 2 * buffer_size],
            buffer_size,
            block_size,
            hop_size,
            write_pos: 0,
            since_block: 0,
        };
        slicer.reset();
        slicer
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn overlap_size(&self) -> usize {
        self.block_size - self.hop_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Clear the history and rewind to the initial state
    pub fn reset(&mut self) {
        self.buffer.fill(T::zero());
        self.write_pos = 0;
        self.since_block = 0;
    }

    #[inline]
    pub fn push_sample(&mut self, sample: T) {
        let _guard = RealtimeGuard::enter();
        self.buffer[self.write_pos] = sample;
        self.buffer[self.write_pos + self.buffer_size] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer_size;
        self.since_block = self.since_block % self.hop_size + 1;
    }

    /// True once every `hop_size` pushes
    #[inline]
    pub fn has_block(&self) -> bool {
        self.since_block == self.hop_size
    }

    /// The latest `block_size` samples, oldest first.
    ///
    /// Samples pushed before the first one read as zero. Meant to be called
    /// once per [`has_block`](Self::has_block).
    pub fn next_block(&mut self) -> &[T] {
        let _guard = RealtimeGuard::enter();
        // the mirrored half keeps the block contiguous
        let start = (self.write_pos + self.buffer_size - self.block_size) % self.buffer_size;
        &self.buffer[start..start + self.block_size]
    }
}

/// Overlap-adds a block stream back into a sample stream.
#[derive(Debug, Clone)]
pub struct Splicer<T> {
    buffer: Vec<T>,
    buffer_size: usize,
    block_size: usize,
    hop_size: usize,
    write_pos: usize,
    read_pos: usize,
}

impl<T: Float> Splicer<T> {
    /// # Panics
    ///
    /// If `hop_size` is zero or larger than `block_size`.
    pub fn new(block_size: usize, hop_size: usize) -> Self {
        assert!(
            hop_size > 0 && hop_size <= block_size,
            "hop size {} must be in 1..={}",
            hop_size,
            block_size
        );
        let buffer_size = (block_size + 1).next_power_of_two();

        let mut splicer = Self {
            buffer: vec![T::zero(); buffer_size],
            buffer_size,
            block_size,
            hop_size,
            write_pos: 0,
            read_pos: 0,
        };
        splicer.reset();
        splicer
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn overlap_size(&self) -> usize {
        self.block_size - self.hop_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Clear pending output and rewind to the initial state
    pub fn reset(&mut self) {
        self.buffer.fill(T::zero());
        self.write_pos = 0;
        self.read_pos = (self.buffer_size - self.hop_size) % self.buffer_size;
    }

    /// Add the first `overlap_size` samples of `block` onto pending output and
    /// overwrite with the rest, then advance one hop.
    pub fn push_block(&mut self, block: &[T]) {
        let _guard = RealtimeGuard::enter();
        debug_assert_eq!(block.len(), self.block_size, "block length");

        let overlap = self.overlap_size();
        for (n, &sample) in block.iter().enumerate() {
            let m = (self.write_pos + n) % self.buffer_size;
            self.buffer[m] = if n < overlap {
                self.buffer[m] + sample
            } else {
                sample
            };
        }
        self.write_pos = (self.write_pos + self.hop_size) % self.buffer_size;
    }

    #[inline]
    pub fn next_sample(&mut self) -> T {
        let _guard = RealtimeGuard::enter();
        let sample = self.buffer[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.buffer_size;
        sample
    }
}
