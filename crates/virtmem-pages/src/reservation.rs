//! Owned handle to a reserved address range.

use std::ptr::NonNull;

use virtmem_core::PageError;

/// An address range claimed from a [`PageAllocator`](crate::PageAllocator).
///
/// The handle is move-only. [`PageAllocator::release`](crate::PageAllocator::release)
/// consumes it, so a reservation cannot be released twice through safe code.
/// Dropping a `Reservation` without releasing it leaks the address range.
#[derive(Debug)]
#[must_use = "a reservation leaks its address range unless released"]
pub struct Reservation {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: a reservation is a plain address range with exclusive ownership;
// nothing about it is tied to the thread that created it.
unsafe impl Send for Reservation {}

impl Reservation {
    /// Wrap a raw range.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be a live reservation obtained from the
    /// allocator that will later release this handle, and no other
    /// `Reservation` may refer to it.
    pub unsafe fn from_raw_parts(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Unwrap into the base address and byte length without releasing.
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize) {
        (self.base, self.len)
    }

    /// First byte of the range. Page-aligned.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Length of the range in bytes. A multiple of the page size.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the range is empty. Allocators never hand out empty ranges.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of `offset`, after checking that `[offset, offset + len)` is
    /// page-aligned and inside the reservation.
    ///
    /// # Errors
    ///
    /// [`PageError::Misaligned`] if either bound is off a page boundary,
    /// [`PageError::OutOfBounds`] if the range ends past the reservation.
    pub fn subrange(
        &self,
        offset: usize,
        len: usize,
        page_size: usize,
    ) -> Result<NonNull<u8>, PageError> {
        if offset % page_size != 0 || len % page_size != 0 {
            return Err(PageError::Misaligned {
                offset,
                len,
                page_size,
            });
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.len => {}
            _ => {
                return Err(PageError::OutOfBounds {
                    offset,
                    len,
                    reserved: self.len,
                })
            }
        }
        // SAFETY: offset <= self.len, so the result stays within (or one
        // past) the reserved range.
        Ok(unsafe { self.base.add(offset) })
    }
}
