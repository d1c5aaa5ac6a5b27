//! Test utilities and mock types for virtmem development.
//!
//! - [`RecordingPages`]: a heap-backed [`PageAllocator`](virtmem_pages::PageAllocator)
//!   with a call log and failure injection.
//! - [`fixtures`]: element types that make drops, clones, and heap
//!   ownership observable.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod recording;

pub use fixtures::{CloneBudget, DropLog, Person, Tracked};
pub use recording::{PageOp, RecordingPages, POISON};
