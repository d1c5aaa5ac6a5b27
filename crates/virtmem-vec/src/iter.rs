//! Owning iterator.

use std::fmt;
use std::iter::FusedIterator;
use std::ptr;
use std::slice;

use virtmem_core::{GrowthPolicy, Linear};
use virtmem_pages::{PageAllocator, SystemPages};

use crate::vector::VirtualVec;

/// Iterator that moves elements out of a [`VirtualVec`].
///
/// Created by `VirtualVec::into_iter`. The reservation is held until the
/// iterator is dropped; elements not yet yielded are dropped with it.
pub struct IntoIter<T, G: GrowthPolicy = Linear, A: PageAllocator = SystemPages> {
    /// Length already set to 0; only keeps the region alive.
    vec: VirtualVec<T, G, A>,
    front: usize,
    back: usize,
}

impl<T, G: GrowthPolicy, A: PageAllocator> IntoIter<T, G, A> {
    /// `vec` must already have its length zeroed; `len` is the old length.
    pub(crate) fn new(vec: VirtualVec<T, G, A>, len: usize) -> Self {
        Self {
            vec,
            front: 0,
            back: len,
        }
    }

    /// Elements not yet yielded.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[front, back)` is initialised and owned by the iterator.
        unsafe {
            slice::from_raw_parts(
                self.vec.data_ptr().as_ptr().add(self.front),
                self.back - self.front,
            )
        }
    }

    /// Elements not yet yielded, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`, with exclusive access.
        unsafe {
            slice::from_raw_parts_mut(
                self.vec.data_ptr().as_ptr().add(self.front),
                self.back - self.front,
            )
        }
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> Iterator for IntoIter<T, G, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        let index = self.front;
        self.front += 1;
        // SAFETY: `index` was in `[front, back)` and is now outside it, so
        // the value is read exactly once.
        Some(unsafe { self.vec.data_ptr().as_ptr().add(index).read() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> DoubleEndedIterator for IntoIter<T, G, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        // SAFETY: as in `next`.
        Some(unsafe { self.vec.data_ptr().as_ptr().add(self.back).read() })
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> ExactSizeIterator for IntoIter<T, G, A> {}

impl<T, G: GrowthPolicy, A: PageAllocator> FusedIterator for IntoIter<T, G, A> {}

impl<T, G: GrowthPolicy, A: PageAllocator> Drop for IntoIter<T, G, A> {
    fn drop(&mut self) {
        let remaining: *mut [T] = self.as_mut_slice();
        self.front = self.back;
        // SAFETY: the remaining elements are dropped once and never read.
        unsafe { ptr::drop_in_place(remaining) };
    }
}

impl<T: fmt::Debug, G: GrowthPolicy, A: PageAllocator> fmt::Debug for IntoIter<T, G, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}
