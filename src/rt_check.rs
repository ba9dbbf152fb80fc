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

//! Heap-allocation guard for the real-time path.
//!
//! Every hot-path entry point opens a [`RealtimeGuard`]. When the crate is
//! built with `debug_assertions` or the `rt-check` feature, the guard marks the
//! current thread as being inside a real-time section; [`CheckedAllocator`],
//! installed as the global allocator by a host or a test binary, counts any
//! allocation made from such a thread and aborts in debug builds. Without the
//! instrumentation the guard is a zero-sized no-op.
//!
//! ```ignore
//! #[global_allocator]
//! static ALLOCATOR: cqt_rs::rt_check::CheckedAllocator = cqt_rs::rt_check::CheckedAllocator;
//! ```

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

static VIOLATIONS: AtomicUsize = AtomicUsize::new(0);

/// Marks the current thread as real-time for as long as it lives.
#[must_use = "the section ends as soon as the guard is dropped"]
pub struct RealtimeGuard {
    // tied to the thread whose depth counter it bumped
    _not_send: PhantomData<*const ()>,
}

impl RealtimeGuard {
    #[inline]
    pub fn enter() -> Self {
        #[cfg(any(debug_assertions, feature = "rt-check"))]
        {
            let _ = DEPTH.try_with(|depth| depth.set(depth.get() + 1));
        }
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for RealtimeGuard {
    #[inline]
    fn drop(&mut self) {
        #[cfg(any(debug_assertions, feature = "rt-check"))]
        {
            let _ = DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
        }
    }
}

/// Whether the current thread holds a [`RealtimeGuard`]
pub fn in_realtime_section() -> bool {
    DEPTH.try_with(|depth| depth.get() > 0).unwrap_or(false)
}

/// Allocations seen inside real-time sections since start-up or the last
/// [`reset_violations`]
pub fn violations() -> usize {
    VIOLATIONS.load(Ordering::Relaxed)
}

pub fn reset_violations() {
    VIOLATIONS.store(0, Ordering::Relaxed);
}

fn check_allocation() {
    if !in_realtime_section() {
        return;
    }
    VIOLATIONS.fetch_add(1, Ordering::Relaxed);

    #[cfg(debug_assertions)]
    {
        use std::io::Write;

        // leave the section so nothing below recurses into this check
        let _ = DEPTH.try_with(|depth| depth.set(0));
        let _ = std::io::stderr().write_all(b"cqt-rs: heap allocation inside a real-time section\n");
        std::process::abort();
    }
}

/// System allocator that reports allocations made inside a [`RealtimeGuard`].
pub struct CheckedAllocator;

unsafe impl GlobalAlloc for CheckedAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        check_allocation();
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        check_allocation();
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        check_allocation();
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}
