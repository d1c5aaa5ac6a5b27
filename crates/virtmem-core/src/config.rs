//! Virtual vector configuration.

use crate::error::PageError;
use crate::growth::page_align_up;

/// How much address space a copy of a vector reserves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CloneCapacity {
    /// Reserve the source's full capacity.
    #[default]
    Full,
    /// Reserve only as many elements as the source has committed (never
    /// fewer than its length).
    Committed,
}

/// Whether released physical pages are zeroed by the container itself.
///
/// The OS already hands out zeroed pages on commit; these options cover
/// allocators and threat models where that is not enough.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScrubPolicy {
    /// Rely on the allocator's zero-on-commit guarantee.
    #[default]
    Never,
    /// Overwrite each range with zeroes before it is decommitted.
    BeforeDecommit,
    /// Overwrite each range with zeroes right after it is committed.
    OnCommit,
}

/// Configuration for a virtual vector.
///
/// Fixed at construction; the vector does not expose a way to change it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VecConfig {
    /// Maximum number of elements. The whole range is reserved up front.
    pub capacity: usize,

    /// Reservation size used by copies of the vector.
    ///
    /// Default: [`CloneCapacity::Full`].
    pub clone_capacity: CloneCapacity,

    /// Zeroing behaviour around commit and decommit.
    ///
    /// Default: [`ScrubPolicy::Never`].
    pub scrub: ScrubPolicy,

    /// Hold the OS lock-pages privilege while committing.
    ///
    /// Default: `false`. Only meaningful on Windows; elsewhere acquiring the
    /// privilege is a no-op.
    pub lock_privilege: bool,
}

impl VecConfig {
    /// Default copy reservation mode.
    pub const DEFAULT_CLONE_CAPACITY: CloneCapacity = CloneCapacity::Full;

    /// Default scrub mode.
    pub const DEFAULT_SCRUB: ScrubPolicy = ScrubPolicy::Never;

    /// Create a config for `capacity` elements with default options.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clone_capacity: Self::DEFAULT_CLONE_CAPACITY,
            scrub: Self::DEFAULT_SCRUB,
            lock_privilege: false,
        }
    }

    /// Set the copy reservation mode.
    pub fn with_clone_capacity(mut self, clone_capacity: CloneCapacity) -> Self {
        self.clone_capacity = clone_capacity;
        self
    }

    /// Set the scrub mode.
    pub fn with_scrub(mut self, scrub: ScrubPolicy) -> Self {
        self.scrub = scrub;
        self
    }

    /// Enable or disable the lock-pages privilege around commits.
    pub fn with_lock_privilege(mut self, lock_privilege: bool) -> Self {
        self.lock_privilege = lock_privilege;
        self
    }

    /// Page-rounded reservation size for `capacity` elements of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::LayoutOverflow`] if the byte size does not fit
    /// in `usize` (before or after rounding), and
    /// [`PageError::UnsupportedAlignment`] if `T` needs a stricter alignment
    /// than a page boundary gives.
    pub fn reserved_bytes_for<T>(&self, page_size: usize) -> Result<usize, PageError> {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>();
        if align > page_size {
            return Err(PageError::UnsupportedAlignment { align, page_size });
        }
        let overflow = PageError::LayoutOverflow {
            count: self.capacity,
            size,
        };
        let bytes = self.capacity.checked_mul(size).ok_or_else(|| overflow.clone())?;
        if bytes > isize::MAX as usize {
            return Err(overflow);
        }
        page_align_up(bytes, page_size).ok_or(overflow)
    }
}

impl Default for VecConfig {
    fn default() -> Self {
        Self::new(0)
    }
}
