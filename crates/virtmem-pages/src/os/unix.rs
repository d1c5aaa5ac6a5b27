//! `mmap`/`mprotect`/`madvise`/`munmap` backend.

use std::ptr::{self, NonNull};

use super::last_os_code;
use crate::system::SystemInfo;

const FALLBACK_PAGE_SIZE: usize = 4096;

pub(crate) fn query_system_info() -> SystemInfo {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = if raw > 0 {
        raw as usize
    } else {
        FALLBACK_PAGE_SIZE
    };
    SystemInfo {
        page_size,
        allocation_granularity: page_size,
        large_page_minimum: huge_page_size(),
    }
}

#[cfg(target_os = "linux")]
fn huge_page_size() -> Option<usize> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = meminfo
        .lines()
        .find(|line| line.starts_with("Hugepagesize:"))?;
    let kib: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    kib.checked_mul(1024)
}

#[cfg(not(target_os = "linux"))]
fn huge_page_size() -> Option<usize> {
    None
}

/// Map `len` bytes of inaccessible, unbacked address space.
pub(crate) fn reserve(len: usize) -> Result<NonNull<u8>, Option<i32>> {
    // SAFETY: an anonymous mapping with a null hint never overlaps
    // existing mappings.
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(last_os_code());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or(None)
}

/// Make `[addr, addr + len)` readable and writable.
///
/// # Safety
///
/// The range must lie inside a mapping created by [`reserve`].
pub(crate) unsafe fn commit(addr: NonNull<u8>, len: usize) -> Result<(), Option<i32>> {
    if libc::mprotect(
        addr.as_ptr().cast(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
    ) != 0
    {
        return Err(last_os_code());
    }
    Ok(())
}

/// Drop the physical pages behind `[addr, addr + len)` and make the range
/// inaccessible again. The next commit sees zero-filled pages.
///
/// # Safety
///
/// The range must lie inside a mapping created by [`reserve`] and must not
/// be referenced.
pub(crate) unsafe fn decommit(addr: NonNull<u8>, len: usize) -> Result<(), Option<i32>> {
    if libc::madvise(addr.as_ptr().cast(), len, libc::MADV_DONTNEED) != 0 {
        return Err(last_os_code());
    }
    if libc::mprotect(addr.as_ptr().cast(), len, libc::PROT_NONE) != 0 {
        return Err(last_os_code());
    }
    Ok(())
}

/// Unmap the whole reservation.
///
/// # Safety
///
/// `addr`/`len` must be exactly a mapping created by [`reserve`] that is no
/// longer referenced.
pub(crate) unsafe fn release(addr: NonNull<u8>, len: usize) -> Result<(), Option<i32>> {
    if libc::munmap(addr.as_ptr().cast(), len) != 0 {
        return Err(last_os_code());
    }
    Ok(())
}

/// The lock-pages privilege has no token on unix; holding it is a no-op.
pub(crate) struct PrivilegeToken;

pub(crate) fn enable_lock_memory() -> Result<PrivilegeToken, Option<i32>> {
    Ok(PrivilegeToken)
}
