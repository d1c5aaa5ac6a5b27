//! Page-granular virtual memory for virtmem.
//!
//! A [`PageAllocator`] reserves address space without physical backing,
//! commits and decommits page-aligned sub-ranges of it, and finally releases
//! the whole range. [`SystemPages`] implements it over the host OS;
//! the backend is picked at build time.
//!
//! ```text
//! reserve(bytes) ──► Reservation ──commit(off, len)──► read/write pages
//!                        │        ◄─decommit(off, len)─
//!                        └──release()──► gone
//! ```
//!
//! This crate and `virtmem-vec` are the only ones that contain `unsafe`
//! code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod allocator;
mod os;
pub mod privilege;
pub mod reservation;
pub mod system;

pub use allocator::PageAllocator;
pub use privilege::PrivilegeGuard;
pub use reservation::Reservation;
pub use system::{page_size, system_info, SystemInfo, SystemPages};
