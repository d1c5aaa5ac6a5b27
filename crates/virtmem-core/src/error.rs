//! Error types for page allocation and the virtual vector.
//!
//! [`PageError`] describes a refusal from a page allocator (reserve,
//! commit, decommit, release, or a privilege adjustment). [`VecError`]
//! is what container operations return; allocator failures are wrapped
//! in [`VecError::AllocationFailure`].

use std::error::Error;
use std::fmt;

/// Errors reported by a page allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageError {
    /// A reservation of zero bytes was requested.
    ZeroSized,
    /// `count * size` does not fit in the address space.
    LayoutOverflow {
        /// Number of elements requested.
        count: usize,
        /// Size of one element in bytes.
        size: usize,
    },
    /// The element alignment exceeds what a page-aligned base can provide.
    UnsupportedAlignment {
        /// Required alignment in bytes.
        align: usize,
        /// Page size in bytes.
        page_size: usize,
    },
    /// A commit or decommit range does not start and end on page boundaries.
    Misaligned {
        /// Byte offset into the reservation.
        offset: usize,
        /// Length of the range in bytes.
        len: usize,
        /// Page size in bytes.
        page_size: usize,
    },
    /// A commit or decommit range extends past the reservation.
    OutOfBounds {
        /// Byte offset into the reservation.
        offset: usize,
        /// Length of the range in bytes.
        len: usize,
        /// Total reserved bytes.
        reserved: usize,
    },
    /// The OS refused to reserve address space.
    Reserve {
        /// Bytes requested (page-rounded).
        bytes: usize,
        /// Raw OS error code, if one was reported.
        os_code: Option<i32>,
    },
    /// The OS refused to back a range with physical memory.
    Commit {
        /// Byte offset into the reservation.
        offset: usize,
        /// Bytes requested.
        bytes: usize,
        /// Raw OS error code, if one was reported.
        os_code: Option<i32>,
    },
    /// The OS refused to remove backing from a range.
    Decommit {
        /// Byte offset into the reservation.
        offset: usize,
        /// Bytes requested.
        bytes: usize,
        /// Raw OS error code, if one was reported.
        os_code: Option<i32>,
    },
    /// The OS refused to release a reservation.
    Release {
        /// Total reserved bytes.
        bytes: usize,
        /// Raw OS error code, if one was reported.
        os_code: Option<i32>,
    },
    /// The lock-pages privilege could not be enabled.
    Privilege {
        /// Raw OS error code, if one was reported.
        os_code: Option<i32>,
    },
}

struct OsCode(Option<i32>);

impl fmt::Display for OsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, " (os error {code})"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSized => write!(f, "cannot reserve a zero-sized range"),
            Self::LayoutOverflow { count, size } => {
                write!(f, "{count} elements of {size} bytes overflow the address space")
            }
            Self::UnsupportedAlignment { align, page_size } => {
                write!(f, "alignment {align} exceeds page size {page_size}")
            }
            Self::Misaligned {
                offset,
                len,
                page_size,
            } => {
                write!(
                    f,
                    "range [{offset}, +{len}) is not aligned to page size {page_size}"
                )
            }
            Self::OutOfBounds {
                offset,
                len,
                reserved,
            } => {
                write!(
                    f,
                    "range [{offset}, +{len}) exceeds reservation of {reserved} bytes"
                )
            }
            Self::Reserve { bytes, os_code } => {
                write!(f, "failed to reserve {bytes} bytes{}", OsCode(*os_code))
            }
            Self::Commit {
                offset,
                bytes,
                os_code,
            } => {
                write!(
                    f,
                    "failed to commit {bytes} bytes at offset {offset}{}",
                    OsCode(*os_code)
                )
            }
            Self::Decommit {
                offset,
                bytes,
                os_code,
            } => {
                write!(
                    f,
                    "failed to decommit {bytes} bytes at offset {offset}{}",
                    OsCode(*os_code)
                )
            }
            Self::Release { bytes, os_code } => {
                write!(
                    f,
                    "failed to release reservation of {bytes} bytes{}",
                    OsCode(*os_code)
                )
            }
            Self::Privilege { os_code } => {
                write!(f, "lock-pages privilege unavailable{}", OsCode(*os_code))
            }
        }
    }
}

impl Error for PageError {}

/// Errors returned by virtual vector operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VecError {
    /// Bounds-checked access with an index at or past the length.
    OutOfRange {
        /// The rejected index.
        index: usize,
        /// Length at the time of the access.
        len: usize,
    },
    /// An append would grow past the fixed capacity.
    CapacityExceeded {
        /// Element count the append would have produced.
        requested: usize,
        /// Fixed capacity in elements.
        capacity: usize,
    },
    /// The page allocator refused a reservation, commit, or privilege.
    AllocationFailure(PageError),
}

impl fmt::Display for VecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "capacity exceeded: requested {requested} elements, capacity {capacity}"
                )
            }
            Self::AllocationFailure(err) => write!(f, "allocation failure: {err}"),
        }
    }
}

impl Error for VecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AllocationFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PageError> for VecError {
    fn from(err: PageError) -> Self {
        Self::AllocationFailure(err)
    }
}
