//! Scoped acquisition of the OS lock-pages privilege.

use virtmem_core::PageError;

use crate::os;

/// Holds the "lock pages in memory" privilege until dropped.
///
/// On Windows this enables `SeLockMemoryPrivilege` on the process token and
/// disables it again on drop. On other platforms there is no such token and
/// the guard is inert.
#[must_use = "the privilege is dropped as soon as the guard is"]
pub struct PrivilegeGuard {
    _token: os::PrivilegeToken,
}

impl PrivilegeGuard {
    /// Enable the lock-pages privilege for the lifetime of the guard.
    ///
    /// # Errors
    ///
    /// [`PageError::Privilege`] if the token cannot be opened or does not
    /// hold the privilege.
    pub fn lock_memory() -> Result<Self, PageError> {
        let token = os::enable_lock_memory().map_err(|os_code| PageError::Privilege { os_code })?;
        Ok(Self { _token: token })
    }
}

impl std::fmt::Debug for PrivilegeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegeGuard").finish_non_exhaustive()
    }
}
