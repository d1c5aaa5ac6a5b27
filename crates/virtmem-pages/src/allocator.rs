//! The page allocator interface.

use virtmem_core::PageError;

use crate::reservation::Reservation;

/// Four-call virtual-memory surface: reserve, commit, decommit, release.
///
/// Offsets and lengths passed to [`commit`](Self::commit) and
/// [`decommit`](Self::decommit) are bytes relative to the reservation base
/// and must be multiples of [`page_size`](Self::page_size).
///
/// Implementations are not expected to be thread-safe; callers serialise
/// access.
pub trait PageAllocator {
    /// Granularity of commit and decommit, in bytes.
    fn page_size(&self) -> usize;

    /// Claim `bytes` of address space, rounded up to the page size, with no
    /// physical backing.
    ///
    /// # Errors
    ///
    /// [`PageError::ZeroSized`] for `bytes == 0`,
    /// [`PageError::LayoutOverflow`] if rounding overflows, and
    /// [`PageError::Reserve`] if the address space is not available.
    fn reserve(&self, bytes: usize) -> Result<Reservation, PageError>;

    /// Back `[offset, offset + len)` with zero-initialised read/write memory.
    ///
    /// Committing pages that are already committed leaves their contents
    /// untouched.
    ///
    /// # Errors
    ///
    /// [`PageError::Misaligned`] / [`PageError::OutOfBounds`] for a bad
    /// range, [`PageError::Commit`] under memory pressure.
    fn commit(&self, reservation: &Reservation, offset: usize, len: usize)
        -> Result<(), PageError>;

    /// Remove physical backing from `[offset, offset + len)`. The range stays
    /// reserved; accessing it faults until it is committed again.
    ///
    /// # Safety
    ///
    /// No live reference may point into the range.
    ///
    /// # Errors
    ///
    /// [`PageError::Misaligned`] / [`PageError::OutOfBounds`] for a bad
    /// range, [`PageError::Decommit`] if the OS refuses.
    unsafe fn decommit(
        &self,
        reservation: &Reservation,
        offset: usize,
        len: usize,
    ) -> Result<(), PageError>;

    /// Free the whole reservation.
    ///
    /// # Safety
    ///
    /// No live reference may point into the reservation, and it must have
    /// come from this allocator.
    ///
    /// # Errors
    ///
    /// [`PageError::Release`] if the OS refuses. The address range is lost
    /// either way.
    unsafe fn release(&self, reservation: Reservation) -> Result<(), PageError>;
}
