//! Core types for virtmem.
//!
//! Shared by the page allocator and the container crates:
//!
//! - [`error`]: [`PageError`] from allocators, [`VecError`] from containers.
//! - [`config`]: [`VecConfig`] and the options it carries.
//! - [`growth`]: the [`GrowthPolicy`] trait with [`Linear`] and
//!   [`Exponential`] implementations.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod growth;

pub use config::{CloneCapacity, ScrubPolicy, VecConfig};
pub use error::{PageError, VecError};
pub use growth::{page_align_up, DecommitPlan, Exponential, GrowthPolicy, Linear};
