//! Platform backends for [`SystemPages`](crate::SystemPages).
//!
//! Each backend exposes the same free functions over raw addresses. Errors
//! carry only the raw OS code; callers attach offsets and sizes.

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::*;
    } else if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::*;
    } else {
        compile_error!("virtmem-pages supports unix and windows targets only");
    }
}

/// Raw OS error code of the last failed call on this thread.
pub(crate) fn last_os_code() -> Option<i32> {
    std::io::Error::last_os_error().raw_os_error()
}
