//! virtmem: pointer-stable containers over reserved virtual memory.
//!
//! This is the facade crate that re-exports the public API of the virtmem
//! sub-crates. Most users only need this one dependency.
//!
//! # Quick start
//!
//! ```rust
//! use virtmem::prelude::*;
//!
//! // Reserve address space for a million integers; nothing is committed yet.
//! let numbers: VirtualVec<i32> = VirtualVec::with_capacity(1_000_000)?;
//! assert_eq!(numbers.committed_bytes(), 0);
//!
//! let first = numbers.push(0)?;
//! for i in 1..16_384 {
//!     numbers.push(i)?;
//! }
//! // Still valid: the buffer never moved.
//! assert_eq!(*first, 0);
//! assert_eq!(numbers.len(), 16_384);
//! assert!(numbers.committed_bytes() >= 16_384 * 4);
//! # Ok::<(), VecError>(())
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `virtmem-core` | Errors, [`VecConfig`](types::VecConfig), growth policies |
//! | [`pages`] | `virtmem-pages` | Page allocator trait, OS backend, system info |
//! | [`vec`] | `virtmem-vec` | [`VirtualVec`](vec::VirtualVec) and its iterator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Errors, configuration, and growth policies (`virtmem-core`).
pub use virtmem_core as types;

/// Page-granular virtual memory (`virtmem-pages`).
///
/// Implement [`pages::PageAllocator`] to back a vector with something other
/// than [`pages::SystemPages`].
pub use virtmem_pages as pages;

/// The pointer-stable vector (`virtmem-vec`).
pub use virtmem_vec as vec;

/// Common imports.
///
/// ```rust
/// use virtmem::prelude::*;
/// ```
pub mod prelude {
    // Container
    pub use virtmem_vec::VirtualVec;

    // Configuration and policies
    pub use virtmem_core::{
        CloneCapacity, Exponential, GrowthPolicy, Linear, ScrubPolicy, VecConfig,
    };

    // Errors
    pub use virtmem_core::{PageError, VecError};

    // Pages
    pub use virtmem_pages::{page_size, PageAllocator, SystemPages};
}
