//! Pointer-stable vector over a single virtual-memory reservation.
//!
//! [`VirtualVec`] reserves address space for its full capacity when it is
//! built and commits physical pages only as elements are appended. Because
//! the buffer never moves:
//!
//! - appending takes `&self`, and references from earlier appends stay
//!   valid;
//! - physical memory follows the number of elements (rounded to the
//!   growth policy's step), not the next power of two.
//!
//! Commit steps come from a [`GrowthPolicy`] type parameter ([`Linear`] by
//! default, or [`Exponential`]). Pages come from a [`PageAllocator`]
//! ([`SystemPages`] by default).
//!
//! # Errors
//!
//! Fallible operations return [`VecError`]. A failed append leaves the
//! vector exactly as it was.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod iter;
mod raw;
mod vector;

pub use iter::IntoIter;
pub use vector::VirtualVec;

pub use virtmem_core::{
    CloneCapacity, Exponential, GrowthPolicy, Linear, PageError, ScrubPolicy, VecConfig, VecError,
};
pub use virtmem_pages::{PageAllocator, SystemPages};
