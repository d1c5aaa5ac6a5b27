//! The OS-backed page allocator and process-wide system information.

use once_cell::sync::Lazy;
use virtmem_core::{page_align_up, PageError};

use crate::allocator::PageAllocator;
use crate::os;
use crate::reservation::Reservation;

/// Virtual-memory parameters of the host, queried once per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemInfo {
    /// Granularity of commit and decommit.
    pub page_size: usize,
    /// Alignment of reservation base addresses. Equal to `page_size` on
    /// unix; 64 KiB on most Windows systems.
    pub allocation_granularity: usize,
    /// Smallest large/huge page the OS reports, if any.
    pub large_page_minimum: Option<usize>,
}

static SYSTEM_INFO: Lazy<SystemInfo> = Lazy::new(os::query_system_info);

/// Host virtual-memory parameters. Immutable for the life of the process.
pub fn system_info() -> &'static SystemInfo {
    &SYSTEM_INFO
}

/// Host page size in bytes.
pub fn page_size() -> usize {
    SYSTEM_INFO.page_size
}

/// [`PageAllocator`] over the host's virtual-memory API.
///
/// Unix: `mmap(PROT_NONE)` to reserve, `mprotect` to commit,
/// `madvise(MADV_DONTNEED)` plus `mprotect(PROT_NONE)` to decommit, `munmap`
/// to release. Windows: `VirtualAlloc` with `MEM_RESERVE`/`MEM_COMMIT` and
/// `VirtualFree` with `MEM_DECOMMIT`/`MEM_RELEASE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemPages;

impl PageAllocator for SystemPages {
    fn page_size(&self) -> usize {
        page_size()
    }

    fn reserve(&self, bytes: usize) -> Result<Reservation, PageError> {
        if bytes == 0 {
            return Err(PageError::ZeroSized);
        }
        let len = page_align_up(bytes, page_size())
            .ok_or(PageError::LayoutOverflow { count: bytes, size: 1 })?;
        let base = os::reserve(len).map_err(|os_code| PageError::Reserve {
            bytes: len,
            os_code,
        })?;
        tracing::debug!(bytes = len, base = ?base, "reserved address range");
        // SAFETY: `base..base + len` was just reserved and is owned by nobody else.
        Ok(unsafe { Reservation::from_raw_parts(base, len) })
    }

    fn commit(
        &self,
        reservation: &Reservation,
        offset: usize,
        len: usize,
    ) -> Result<(), PageError> {
        let addr = reservation.subrange(offset, len, page_size())?;
        if len == 0 {
            return Ok(());
        }
        // SAFETY: `subrange` checked the range lies inside the reservation.
        unsafe { os::commit(addr, len) }.map_err(|os_code| PageError::Commit {
            offset,
            bytes: len,
            os_code,
        })
    }

    unsafe fn decommit(
        &self,
        reservation: &Reservation,
        offset: usize,
        len: usize,
    ) -> Result<(), PageError> {
        let addr = reservation.subrange(offset, len, page_size())?;
        if len == 0 {
            return Ok(());
        }
        os::decommit(addr, len).map_err(|os_code| PageError::Decommit {
            offset,
            bytes: len,
            os_code,
        })
    }

    unsafe fn release(&self, reservation: Reservation) -> Result<(), PageError> {
        let (base, len) = reservation.into_raw_parts();
        os::release(base, len).map_err(|os_code| PageError::Release {
            bytes: len,
            os_code,
        })?;
        tracing::debug!(bytes = len, base = ?base, "released address range");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_nonzero_power_of_two() {
        let info = system_info();
        assert!(info.page_size.is_power_of_two());
        assert!(info.allocation_granularity >= info.page_size);
    }

    #[test]
    fn page_size_is_stable() {
        assert_eq!(page_size(), page_size());
        assert_eq!(SystemPages.page_size(), system_info().page_size);
    }

    #[test]
    fn reserve_rounds_up_to_page() {
        let pages = SystemPages;
        let r = pages.reserve(1).unwrap();
        assert_eq!(r.len(), page_size());
        assert_eq!(r.base().as_ptr() as usize % page_size(), 0);
        unsafe { pages.release(r).unwrap() };
    }

    #[test]
    fn reserve_zero_is_rejected() {
        assert_eq!(SystemPages.reserve(0).unwrap_err(), PageError::ZeroSized);
    }

    #[test]
    fn committed_pages_are_zeroed_and_writable() {
        let pages = SystemPages;
        let page = page_size();
        let r = pages.reserve(4 * page).unwrap();
        pages.commit(&r, page, 2 * page).unwrap();
        unsafe {
            let p = r.base().as_ptr().add(page);
            assert!((0..2 * page).all(|i| *p.add(i) == 0));
            *p = 0xAB;
            *p.add(2 * page - 1) = 0xCD;
            assert_eq!(*p, 0xAB);
            assert_eq!(*p.add(2 * page - 1), 0xCD);
            pages.release(r).unwrap();
        }
    }

    #[test]
    fn recommit_after_decommit_reads_zero() {
        let pages = SystemPages;
        let page = page_size();
        let r = pages.reserve(2 * page).unwrap();
        pages.commit(&r, 0, page).unwrap();
        unsafe {
            let p = r.base().as_ptr();
            *p.add(17) = 42;
            pages.decommit(&r, 0, page).unwrap();
            pages.commit(&r, 0, page).unwrap();
            assert_eq!(*p.add(17), 0);
            pages.release(r).unwrap();
        }
    }

    #[test]
    fn commit_outside_reservation_is_rejected() {
        let pages = SystemPages;
        let page = page_size();
        let r = pages.reserve(2 * page).unwrap();
        assert!(matches!(
            pages.commit(&r, page, 2 * page),
            Err(PageError::OutOfBounds { .. })
        ));
        assert!(matches!(
            pages.commit(&r, 1, page),
            Err(PageError::Misaligned { .. })
        ));
        unsafe { pages.release(r).unwrap() };
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn large_reservation_costs_no_commit() {
        // 1 GiB of address space; only reserved, never touched.
        let pages = SystemPages;
        let r = pages.reserve(1 << 30).unwrap();
        assert_eq!(r.len(), 1 << 30);
        unsafe { pages.release(r).unwrap() };
    }
}
