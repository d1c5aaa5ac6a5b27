//! Benchmark profiles and utilities for virtmem.
//!
//! - [`FillProfile`]: capacity and fill count for a run, with the
//!   [`REFERENCE`] profile (1,000,000 `i32` slots, 16,384 pushed).
//! - [`fill_sequential`]: push `0..n` into a vector.
//! - [`shuffled_indices`]: a seeded, reproducible random access order.
//! - [`CommitReport`]: a one-line summary of a vector's memory state.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use virtmem::prelude::*;

/// How large a vector to reserve and how many elements to push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillProfile {
    /// Elements reserved.
    pub capacity: usize,
    /// Elements pushed.
    pub fill: usize,
}

/// One million slots, sixteen pages' worth of 4 KiB `i32`s pushed.
pub const REFERENCE: FillProfile = FillProfile {
    capacity: 1_000_000,
    fill: 16_384,
};

/// Ten times the reference fill.
pub const STRESS: FillProfile = FillProfile {
    capacity: 10_000_000,
    fill: 163_840,
};

impl FillProfile {
    /// Reserve a vector for this profile and push `0..fill` into it.
    pub fn build<G: GrowthPolicy>(&self) -> Result<VirtualVec<i32, G>, VecError> {
        let v = VirtualVec::with_config(VecConfig::new(self.capacity))?;
        fill_sequential(&v, self.fill)?;
        Ok(v)
    }
}

/// Push `0..n` (as `i32`) onto `v`.
///
/// # Errors
///
/// The first push error.
pub fn fill_sequential<G: GrowthPolicy, A: PageAllocator>(
    v: &VirtualVec<i32, G, A>,
    n: usize,
) -> Result<(), VecError> {
    v.try_extend((0..n).map(|i| i as i32))
}

/// The indices `0..n` in an order fixed by `seed`.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Memory state of a vector at one point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitReport {
    /// Live elements.
    pub len: usize,
    /// Elements that fit in committed pages.
    pub committed: usize,
    /// Maximum elements.
    pub capacity: usize,
    /// Committed bytes.
    pub committed_bytes: usize,
    /// Reserved bytes.
    pub reserved_bytes: usize,
}

impl CommitReport {
    /// Snapshot the counters of `v`.
    pub fn of<T, G: GrowthPolicy, A: PageAllocator>(v: &VirtualVec<T, G, A>) -> Self {
        Self {
            len: v.len(),
            committed: v.committed(),
            capacity: v.capacity(),
            committed_bytes: v.committed_bytes(),
            reserved_bytes: v.reserved_bytes(),
        }
    }
}

impl fmt::Display for CommitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} committed={} capacity={} ({} of {} bytes backed)",
            self.len, self.committed, self.capacity, self.committed_bytes, self.reserved_bytes
        )
    }
}
