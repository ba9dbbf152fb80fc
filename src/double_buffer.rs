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

/// Two-slot register holding the current and the previous value of a
/// block-rate signal.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    flipped: bool,
}

impl<T: Clone> DoubleBuffer<T> {
    /// Both slots start as `value`
    pub fn new(value: T) -> Self {
        Self {
            slots: [value.clone(), value],
            flipped: false,
        }
    }

    /// Overwrite both slots with `value`
    pub fn fill(&mut self, value: &T) {
        self.slots[0].clone_from(value);
        self.slots[1].clone_from(value);
    }

    /// Advance and store `value` as the new current slot
    pub fn push(&mut self, value: T) {
        *self.next_slot() = value;
    }
}

impl<T> DoubleBuffer<T> {
    #[inline]
    fn current_index(&self) -> usize {
        usize::from(self.flipped)
    }

    /// Swap roles: the current slot becomes the last one
    #[inline]
    pub fn advance(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Advance and return the new current slot for writing.
    ///
    /// The slot still holds the value from two advances ago.
    #[inline]
    pub fn next_slot(&mut self) -> &mut T {
        self.advance();
        self.current_mut()
    }

    #[inline]
    pub fn current(&self) -> &T {
        &self.slots[self.current_index()]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut T {
        let i = self.current_index();
        &mut self.slots[i]
    }

    #[inline]
    pub fn last(&self) -> &T {
        &self.slots[1 - self.current_index()]
    }

    #[inline]
    pub fn last_mut(&mut self) -> &mut T {
        let i = 1 - self.current_index();
        &mut self.slots[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_rotates() {
        let mut buffer = DoubleBuffer::new(0);
        buffer.push(1);
        assert_eq!((*buffer.current(), *buffer.last()), (1, 0));
        buffer.push(2);
        assert_eq!((*buffer.current(), *buffer.last()), (2, 1));
        buffer.push(3);
        assert_eq!((*buffer.current(), *buffer.last()), (3, 2));
    }

    #[test]
    fn test_next_slot_reuses_storage() {
        let mut buffer = DoubleBuffer::new(vec![0.0f32; 4]);
        buffer.next_slot()[0] = 1.0;
        buffer.next_slot()[0] = 2.0;

        let slot = buffer.next_slot();
        assert_eq!(slot[0], 1.0);
        assert_eq!(slot.len(), 4);
        assert_eq!(buffer.last()[0], 2.0);
    }

    #[test]
    fn test_fill_and_mut_accessors() {
        let mut buffer = DoubleBuffer::new(vec![1, 2]);
        buffer.fill(&vec![7, 7]);
        assert_eq!(buffer.current(), buffer.last());

        buffer.last_mut()[0] = 3;
        buffer.current_mut()[1] = 4;
        assert_eq!(buffer.last(), &vec![3, 7]);
        assert_eq!(buffer.current(), &vec![7, 4]);

        buffer.advance();
        assert_eq!(buffer.current(), &vec![3, 7]);
    }
}
