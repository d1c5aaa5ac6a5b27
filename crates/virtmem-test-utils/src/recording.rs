//! Heap-backed page allocator that records every call.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::ptr::NonNull;
use std::rc::Rc;

use indexmap::IndexMap;
use virtmem_core::{page_align_up, PageError};
use virtmem_pages::{PageAllocator, Reservation};

/// Byte written over decommitted pages so stale reads stand out.
pub const POISON: u8 = 0xDD;

/// One recorded allocator call. `id` numbers reservations in creation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageOp {
    Reserve { id: usize, bytes: usize },
    Commit { id: usize, offset: usize, len: usize },
    Decommit { id: usize, offset: usize, len: usize },
    Release { id: usize, bytes: usize },
}

struct Region {
    id: usize,
    layout: Layout,
    committed: Vec<bool>,
}

struct State {
    page_size: usize,
    next_id: usize,
    /// Live reservations keyed by base address.
    regions: IndexMap<usize, Region>,
    ops: Vec<PageOp>,
    fail_reserve: bool,
    fail_decommit: bool,
    /// Number of further commits that succeed before one fails.
    commits_until_failure: Option<usize>,
}

/// [`PageAllocator`] over ordinary heap memory, for tests.
///
/// Enforces the same range and alignment rules as the OS allocator,
/// zero-fills newly committed pages, poisons decommitted ones with
/// [`POISON`], and logs every call as a [`PageOp`]. Clones share state, so a
/// test can keep a handle after moving one into a container.
#[derive(Clone)]
pub struct RecordingPages {
    state: Rc<RefCell<State>>,
}

impl RecordingPages {
    /// Page size used by [`RecordingPages::default`].
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// Create an allocator with the given page size (a power of two).
    pub fn new(page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        Self {
            state: Rc::new(RefCell::new(State {
                page_size,
                next_id: 0,
                regions: IndexMap::new(),
                ops: Vec::new(),
                fail_reserve: false,
                fail_decommit: false,
                commits_until_failure: None,
            })),
        }
    }

    /// Snapshot of the call log.
    pub fn ops(&self) -> Vec<PageOp> {
        self.state.borrow().ops.clone()
    }

    /// Forget the call log (reservations are unaffected).
    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }

    /// Number of commit calls logged.
    pub fn commit_count(&self) -> usize {
        self.count(|op| matches!(op, PageOp::Commit { .. }))
    }

    /// Number of decommit calls logged.
    pub fn decommit_count(&self) -> usize {
        self.count(|op| matches!(op, PageOp::Decommit { .. }))
    }

    /// Number of reserve calls logged.
    pub fn reserve_count(&self) -> usize {
        self.count(|op| matches!(op, PageOp::Reserve { .. }))
    }

    /// Number of release calls logged.
    pub fn release_count(&self) -> usize {
        self.count(|op| matches!(op, PageOp::Release { .. }))
    }

    /// Number of reservations not yet released.
    pub fn live_reservations(&self) -> usize {
        self.state.borrow().regions.len()
    }

    /// Bytes currently committed across all live reservations.
    pub fn committed_bytes(&self) -> usize {
        let state = self.state.borrow();
        let pages: usize = state
            .regions
            .values()
            .map(|r| r.committed.iter().filter(|&&c| c).count())
            .sum();
        pages * state.page_size
    }

    /// Make every following reserve fail.
    pub fn fail_reserves(&self, fail: bool) {
        self.state.borrow_mut().fail_reserve = fail;
    }

    /// Let `n` more commits succeed, then fail every commit after that.
    pub fn fail_commits_after(&self, n: usize) {
        self.state.borrow_mut().commits_until_failure = Some(n);
    }

    /// Stop injecting commit failures.
    pub fn allow_commits(&self) {
        self.state.borrow_mut().commits_until_failure = None;
    }

    /// Make every following decommit fail (after validating its range).
    pub fn fail_decommits(&self, fail: bool) {
        self.state.borrow_mut().fail_decommit = fail;
    }

    fn count(&self, pred: impl Fn(&PageOp) -> bool) -> usize {
        self.state.borrow().ops.iter().filter(|op| pred(op)).count()
    }
}

impl Default for RecordingPages {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl std::fmt::Debug for RecordingPages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RecordingPages")
            .field("page_size", &state.page_size)
            .field("live_reservations", &state.regions.len())
            .field("ops", &state.ops.len())
            .finish()
    }
}

impl PageAllocator for RecordingPages {
    fn page_size(&self) -> usize {
        self.state.borrow().page_size
    }

    fn reserve(&self, bytes: usize) -> Result<Reservation, PageError> {
        let mut state = self.state.borrow_mut();
        if bytes == 0 {
            return Err(PageError::ZeroSized);
        }
        let len = page_align_up(bytes, state.page_size)
            .ok_or(PageError::LayoutOverflow { count: bytes, size: 1 })?;
        if state.fail_reserve {
            return Err(PageError::Reserve {
                bytes: len,
                os_code: None,
            });
        }
        let layout = Layout::from_size_align(len, state.page_size)
            .map_err(|_| PageError::LayoutOverflow { count: len, size: 1 })?;
        // SAFETY: `layout` has a non-zero size.
        let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(
            PageError::Reserve {
                bytes: len,
                os_code: None,
            },
        )?;
        let id = state.next_id;
        state.next_id += 1;
        let page_size = state.page_size;
        state.regions.insert(
            base.as_ptr() as usize,
            Region {
                id,
                layout,
                committed: vec![false; len / page_size],
            },
        );
        state.ops.push(PageOp::Reserve { id, bytes: len });
        // SAFETY: freshly allocated and tracked only by this handle.
        Ok(unsafe { Reservation::from_raw_parts(base, len) })
    }

    fn commit(
        &self,
        reservation: &Reservation,
        offset: usize,
        len: usize,
    ) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        let page_size = state.page_size;
        let addr = reservation.subrange(offset, len, page_size)?;
        if let Some(remaining) = state.commits_until_failure {
            if remaining == 0 {
                return Err(PageError::Commit {
                    offset,
                    bytes: len,
                    os_code: None,
                });
            }
            state.commits_until_failure = Some(remaining - 1);
        }
        let key = reservation.base().as_ptr() as usize;
        let region = state.regions.get_mut(&key).ok_or(PageError::Commit {
            offset,
            bytes: len,
            os_code: None,
        })?;
        let id = region.id;
        let first = offset / page_size;
        for page in first..first + len / page_size {
            if !region.committed[page] {
                region.committed[page] = true;
                // SAFETY: the page lies inside the live allocation.
                unsafe {
                    addr.as_ptr()
                        .add((page - first) * page_size)
                        .write_bytes(0, page_size);
                }
            }
        }
        state.ops.push(PageOp::Commit { id, offset, len });
        Ok(())
    }

    unsafe fn decommit(
        &self,
        reservation: &Reservation,
        offset: usize,
        len: usize,
    ) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        let page_size = state.page_size;
        let addr = reservation.subrange(offset, len, page_size)?;
        let fail = state.fail_decommit;
        let key = reservation.base().as_ptr() as usize;
        let region = state.regions.get_mut(&key).ok_or(PageError::Decommit {
            offset,
            bytes: len,
            os_code: None,
        })?;
        let id = region.id;
        if fail {
            return Err(PageError::Decommit {
                offset,
                bytes: len,
                os_code: None,
            });
        }
        let first = offset / page_size;
        region.committed[first..first + len / page_size].fill(false);
        addr.as_ptr().write_bytes(POISON, len);
        state.ops.push(PageOp::Decommit { id, offset, len });
        Ok(())
    }

    unsafe fn release(&self, reservation: Reservation) -> Result<(), PageError> {
        let mut state = self.state.borrow_mut();
        let (base, len) = reservation.into_raw_parts();
        let region = state
            .regions
            .shift_remove(&(base.as_ptr() as usize))
            .ok_or(PageError::Release {
                bytes: len,
                os_code: None,
            })?;
        alloc::dealloc(base.as_ptr(), region.layout);
        state.ops.push(PageOp::Release {
            id: region.id,
            bytes: len,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = RecordingPages::DEFAULT_PAGE_SIZE;

    #[test]
    fn records_full_lifecycle() {
        let pages = RecordingPages::default();
        let r = pages.reserve(3 * PAGE - 1).unwrap();
        assert_eq!(r.len(), 3 * PAGE);
        pages.commit(&r, 0, PAGE).unwrap();
        unsafe {
            pages.decommit(&r, 0, PAGE).unwrap();
            pages.release(r).unwrap();
        }
        assert_eq!(
            pages.ops(),
            vec![
                PageOp::Reserve { id: 0, bytes: 3 * PAGE },
                PageOp::Commit { id: 0, offset: 0, len: PAGE },
                PageOp::Decommit { id: 0, offset: 0, len: PAGE },
                PageOp::Release { id: 0, bytes: 3 * PAGE },
            ]
        );
        assert_eq!(pages.live_reservations(), 0);
    }

    #[test]
    fn commit_zero_fills_and_decommit_poisons() {
        let pages = RecordingPages::default();
        let r = pages.reserve(PAGE).unwrap();
        pages.commit(&r, 0, PAGE).unwrap();
        let p = r.base().as_ptr();
        unsafe {
            assert_eq!(*p, 0);
            *p = 7;
            // Recommitting a committed page keeps its contents.
            pages.commit(&r, 0, PAGE).unwrap();
            assert_eq!(*p, 7);
            pages.decommit(&r, 0, PAGE).unwrap();
            assert_eq!(*p, POISON);
            pages.commit(&r, 0, PAGE).unwrap();
            assert_eq!(*p, 0);
            pages.release(r).unwrap();
        }
    }

    #[test]
    fn tracks_committed_bytes() {
        let pages = RecordingPages::default();
        let r = pages.reserve(4 * PAGE).unwrap();
        pages.commit(&r, 0, 3 * PAGE).unwrap();
        assert_eq!(pages.committed_bytes(), 3 * PAGE);
        unsafe {
            pages.decommit(&r, 2 * PAGE, PAGE).unwrap();
            assert_eq!(pages.committed_bytes(), 2 * PAGE);
            pages.release(r).unwrap();
        }
        assert_eq!(pages.committed_bytes(), 0);
    }

    #[test]
    fn injected_commit_failure() {
        let pages = RecordingPages::default();
        let r = pages.reserve(4 * PAGE).unwrap();
        pages.fail_commits_after(1);
        assert!(pages.commit(&r, 0, PAGE).is_ok());
        assert!(matches!(
            pages.commit(&r, PAGE, PAGE),
            Err(PageError::Commit { .. })
        ));
        pages.allow_commits();
        assert!(pages.commit(&r, PAGE, PAGE).is_ok());
        assert_eq!(pages.commit_count(), 2);
        unsafe { pages.release(r).unwrap() };
    }

    #[test]
    fn injected_reserve_failure() {
        let pages = RecordingPages::default();
        pages.fail_reserves(true);
        assert!(matches!(
            pages.reserve(PAGE),
            Err(PageError::Reserve { .. })
        ));
        assert_eq!(pages.reserve_count(), 0);
    }

    #[test]
    fn range_rules_match_system_allocator() {
        let pages = RecordingPages::default();
        let r = pages.reserve(2 * PAGE).unwrap();
        assert!(matches!(
            pages.commit(&r, PAGE, 2 * PAGE),
            Err(PageError::OutOfBounds { .. })
        ));
        assert!(matches!(
            pages.commit(&r, 3, PAGE),
            Err(PageError::Misaligned { .. })
        ));
        unsafe { pages.release(r).unwrap() };
    }

    #[test]
    fn clones_share_state() {
        let pages = RecordingPages::default();
        let other = pages.clone();
        let r = other.reserve(PAGE).unwrap();
        assert_eq!(pages.live_reservations(), 1);
        unsafe { pages.release(r).unwrap() };
        assert_eq!(other.release_count(), 1);
    }
}
