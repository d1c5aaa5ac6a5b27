//! Reservation plus committed boundary: the untyped half of the vector.
//!
//! [`RawRegion`] owns one [`Reservation`] and the byte offset up to which it
//! is committed. It grows the boundary through the growth policy, walks it
//! back down on clear, and releases the reservation on drop. It knows
//! nothing about elements.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use virtmem_core::{GrowthPolicy, PageError, ScrubPolicy, VecConfig, VecError};
use virtmem_pages::{PageAllocator, PrivilegeGuard, Reservation};

pub(crate) struct RawRegion<G: GrowthPolicy, A: PageAllocator> {
    pages: A,
    /// `None` until something is reserved (or for zero-sized layouts).
    reservation: Option<Reservation>,
    /// Committed prefix of the reservation, in bytes. Always a page multiple.
    committed: Cell<usize>,
    scrub: ScrubPolicy,
    lock_privilege: bool,
    _policy: PhantomData<fn() -> G>,
}

impl<G: GrowthPolicy, A: PageAllocator> RawRegion<G, A> {
    /// A region with no reservation. Every commit request fails.
    pub(crate) fn unreserved(pages: A, config: &VecConfig) -> Self {
        Self {
            pages,
            reservation: None,
            committed: Cell::new(0),
            scrub: config.scrub,
            lock_privilege: config.lock_privilege,
            _policy: PhantomData,
        }
    }

    /// Reserve `bytes` (already page-rounded). Zero bytes reserves nothing.
    pub(crate) fn reserve(pages: A, bytes: usize, config: &VecConfig) -> Result<Self, VecError> {
        let mut region = Self::unreserved(pages, config);
        if bytes > 0 {
            region.reservation = Some(region.pages.reserve(bytes)?);
        }
        Ok(region)
    }

    pub(crate) fn pages(&self) -> &A {
        &self.pages
    }

    pub(crate) fn page_size(&self) -> usize {
        self.pages.page_size()
    }

    pub(crate) fn base(&self) -> Option<NonNull<u8>> {
        self.reservation.as_ref().map(Reservation::base)
    }

    pub(crate) fn reserved_bytes(&self) -> usize {
        self.reservation.as_ref().map_or(0, Reservation::len)
    }

    pub(crate) fn committed_bytes(&self) -> usize {
        self.committed.get()
    }

    /// Advance the committed boundary until it covers `needed` bytes.
    ///
    /// The whole delta is committed with a single allocator call. On error
    /// the boundary is left where it was.
    pub(crate) fn ensure_committed(&self, needed: usize) -> Result<(), VecError> {
        let committed = self.committed.get();
        if needed <= committed {
            return Ok(());
        }
        let reserved = self.reserved_bytes();
        let out_of_bounds = PageError::OutOfBounds {
            offset: committed,
            len: needed - committed,
            reserved,
        };
        let reservation = self
            .reservation
            .as_ref()
            .ok_or_else(|| out_of_bounds.clone())?;
        let page_size = self.pages.page_size();
        let target =
            G::commit_target(committed, needed, reserved, page_size).ok_or(out_of_bounds)?;

        let _privilege = if self.lock_privilege {
            Some(PrivilegeGuard::lock_memory()?)
        } else {
            None
        };
        self.pages.commit(reservation, committed, target - committed)?;
        if self.scrub == ScrubPolicy::OnCommit {
            // SAFETY: `[committed, target)` was just committed and holds no
            // elements yet.
            unsafe {
                reservation
                    .base()
                    .as_ptr()
                    .add(committed)
                    .write_bytes(0, target - committed);
            }
        }
        tracing::trace!(
            policy = G::NAME,
            from = committed,
            to = target,
            "committed pages"
        );
        self.committed.set(target);
        Ok(())
    }

    /// Walk the committed boundary down in shrink steps, stopping before a
    /// step would cross `floor`. Decommit failures are logged and skipped.
    ///
    /// # Safety
    ///
    /// Nothing at or above `floor` may be referenced.
    pub(crate) unsafe fn decommit_down_to(&self, floor: usize) {
        let Some(reservation) = self.reservation.as_ref() else {
            return;
        };
        let page_size = self.pages.page_size();
        let plan = G::decommit_plan(self.committed.get(), floor, page_size);
        for range in plan {
            let len = range.end - range.start;
            if self.scrub == ScrubPolicy::BeforeDecommit {
                // SAFETY: the range is committed and unreferenced.
                unsafe {
                    reservation
                        .base()
                        .as_ptr()
                        .add(range.start)
                        .write_bytes(0, len);
                }
            }
            // SAFETY: forwarded from the caller.
            match unsafe { self.pages.decommit(reservation, range.start, len) } {
                Ok(()) => tracing::trace!(
                    policy = G::NAME,
                    offset = range.start,
                    len,
                    "decommitted pages"
                ),
                Err(err) => tracing::warn!(
                    offset = range.start,
                    len,
                    error = %err,
                    "decommit failed; continuing"
                ),
            }
            self.committed.set(range.start);
        }
    }
}

impl<G: GrowthPolicy, A: PageAllocator> Drop for RawRegion<G, A> {
    fn drop(&mut self) {
        // SAFETY: the owner drops its elements before the region, and the
        // region is unreachable once dropped.
        unsafe { self.decommit_down_to(0) };
        if let Some(reservation) = self.reservation.take() {
            // SAFETY: as above; the reservation came from `self.pages`.
            if let Err(err) = unsafe { self.pages.release(reservation) } {
                tracing::warn!(error = %err, "release failed; address range leaked");
            }
        }
    }
}
