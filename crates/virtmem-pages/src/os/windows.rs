//! `VirtualAlloc`/`VirtualFree` backend, plus the `SeLockMemoryPrivilege`
//! token adjustment.

use std::ffi::c_void;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Memory::{
    GetLargePageMinimum, VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE,
    MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use super::last_os_code;
use crate::system::SystemInfo;

const LOCK_MEMORY_PRIVILEGE: &str = "SeLockMemoryPrivilege";

pub(crate) fn query_system_info() -> SystemInfo {
    // SAFETY: GetSystemInfo fully initialises the struct it is given.
    let info = unsafe {
        let mut info = MaybeUninit::<SYSTEM_INFO>::uninit();
        GetSystemInfo(info.as_mut_ptr());
        info.assume_init()
    };
    // SAFETY: no preconditions.
    let large = unsafe { GetLargePageMinimum() };
    SystemInfo {
        page_size: info.dwPageSize as usize,
        allocation_granularity: info.dwAllocationGranularity as usize,
        large_page_minimum: (large != 0).then_some(large),
    }
}

pub(crate) fn reserve(len: usize) -> Result<NonNull<u8>, Option<i32>> {
    // SAFETY: a null base lets the OS choose a free range.
    let ptr = unsafe { VirtualAlloc(ptr::null(), len, MEM_RESERVE, PAGE_READWRITE) };
    NonNull::new(ptr.cast::<u8>()).ok_or_else(last_os_code)
}

/// # Safety
///
/// The range must lie inside a reservation made by [`reserve`].
pub(crate) unsafe fn commit(addr: NonNull<u8>, len: usize) -> Result<(), Option<i32>> {
    let ptr = VirtualAlloc(addr.as_ptr().cast::<c_void>(), len, MEM_COMMIT, PAGE_READWRITE);
    if ptr.is_null() {
        return Err(last_os_code());
    }
    Ok(())
}

/// # Safety
///
/// The range must lie inside a reservation made by [`reserve`] and must not
/// be referenced.
pub(crate) unsafe fn decommit(addr: NonNull<u8>, len: usize) -> Result<(), Option<i32>> {
    if VirtualFree(addr.as_ptr().cast::<c_void>(), len, MEM_DECOMMIT) == 0 {
        return Err(last_os_code());
    }
    Ok(())
}

/// # Safety
///
/// `addr` must be the base of a reservation made by [`reserve`] that is no
/// longer referenced.
pub(crate) unsafe fn release(addr: NonNull<u8>, _len: usize) -> Result<(), Option<i32>> {
    // MEM_RELEASE requires a size of zero and frees the whole reservation.
    if VirtualFree(addr.as_ptr().cast::<c_void>(), 0, MEM_RELEASE) == 0 {
        return Err(last_os_code());
    }
    Ok(())
}

/// Process token with `SeLockMemoryPrivilege` enabled. Disabled and closed
/// on drop.
pub(crate) struct PrivilegeToken {
    token: HANDLE,
}

pub(crate) fn enable_lock_memory() -> Result<PrivilegeToken, Option<i32>> {
    let mut token: HANDLE = ptr::null_mut();
    // SAFETY: `token` is a valid out-pointer; the pseudo-handle from
    // GetCurrentProcess needs no closing.
    let opened = unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    };
    if opened == 0 {
        return Err(last_os_code());
    }
    let guard = PrivilegeToken { token };
    set_privilege(guard.token, true)?;
    Ok(guard)
}

impl Drop for PrivilegeToken {
    fn drop(&mut self) {
        if let Err(os_code) = set_privilege(self.token, false) {
            tracing::warn!(?os_code, "failed to disable lock-pages privilege");
        }
        // SAFETY: the handle was opened by OpenProcessToken and is closed once.
        unsafe {
            CloseHandle(self.token);
        }
    }
}

fn set_privilege(token: HANDLE, enable: bool) -> Result<(), Option<i32>> {
    let name: Vec<u16> = LOCK_MEMORY_PRIVILEGE
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    // SAFETY: `name` is NUL-terminated and `luid` is a valid out-pointer.
    if unsafe { LookupPrivilegeValueW(ptr::null(), name.as_ptr(), &mut luid) } == 0 {
        return Err(last_os_code());
    }
    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: if enable { SE_PRIVILEGE_ENABLED } else { 0 },
        }],
    };
    // SAFETY: `privileges` outlives the call; previous state is not requested.
    let adjusted = unsafe {
        AdjustTokenPrivileges(
            token,
            0,
            &privileges,
            mem::size_of::<TOKEN_PRIVILEGES>() as u32,
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if adjusted == 0 {
        return Err(last_os_code());
    }
    // AdjustTokenPrivileges succeeds even when the token lacks the privilege.
    // SAFETY: no preconditions.
    let last = unsafe { GetLastError() };
    if last == ERROR_NOT_ALL_ASSIGNED {
        return Err(Some(last as i32));
    }
    Ok(())
}
