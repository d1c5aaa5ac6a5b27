//! The pointer-stable vector.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use virtmem_core::{CloneCapacity, GrowthPolicy, Linear, VecConfig, VecError};
use virtmem_pages::{PageAllocator, SystemPages};

use crate::iter::IntoIter;
use crate::raw::RawRegion;

/// A growable array whose storage is one virtual-memory reservation.
///
/// The whole capacity is reserved at construction and physical pages are
/// committed as elements are appended, in steps chosen by the growth policy
/// `G`. The buffer never moves, so [`push`](Self::push) takes `&self` and
/// every reference it has returned stays valid while more elements are
/// appended:
///
/// ```
/// use virtmem_vec::VirtualVec;
///
/// let names: VirtualVec<String> = VirtualVec::with_capacity(1_000)?;
/// let first = names.push("ada".to_string())?;
/// for i in 0..500 {
///     names.push(format!("n{i}"))?;
/// }
/// assert_eq!(first, "ada");
/// assert_eq!(names.len(), 501);
/// # Ok::<(), virtmem_vec::VecError>(())
/// ```
///
/// Operations that remove elements ([`clear`](Self::clear),
/// [`truncate`](Self::truncate)) need `&mut self`, which rules out any
/// outstanding element reference. The counters live in [`Cell`]s, so the
/// vector is `Send` (for `T: Send`) but not `Sync`.
pub struct VirtualVec<T, G: GrowthPolicy = Linear, A: PageAllocator = SystemPages> {
    region: RawRegion<G, A>,
    len: Cell<usize>,
    capacity: usize,
    config: VecConfig,
    _marker: PhantomData<T>,
}

impl<T> VirtualVec<T> {
    /// Reserve room for `capacity` elements from the OS. Nothing is
    /// committed yet.
    ///
    /// # Errors
    ///
    /// [`VecError::AllocationFailure`] if the byte size overflows, `T` is
    /// over-aligned, or the OS refuses the reservation.
    pub fn with_capacity(capacity: usize) -> Result<Self, VecError> {
        Self::with_config(VecConfig::new(capacity))
    }

    /// An unreserved vector with capacity 0.
    pub fn new() -> Self {
        Self::new_in(SystemPages)
    }
}

impl<T, G: GrowthPolicy> VirtualVec<T, G, SystemPages> {
    /// Reserve according to `config` from the OS.
    ///
    /// # Errors
    ///
    /// As for [`with_capacity`](VirtualVec::with_capacity).
    pub fn with_config(config: VecConfig) -> Result<Self, VecError> {
        Self::with_config_in(config, SystemPages)
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> VirtualVec<T, G, A> {
    /// An unreserved vector over `pages`. Every push fails with
    /// [`VecError::CapacityExceeded`].
    pub fn new_in(pages: A) -> Self {
        let config = VecConfig::default();
        Self {
            region: RawRegion::unreserved(pages, &config),
            len: Cell::new(0),
            capacity: 0,
            config,
            _marker: PhantomData,
        }
    }

    /// Reserve according to `config` from `pages`.
    ///
    /// Zero-sized element types and a capacity of 0 reserve nothing.
    ///
    /// # Errors
    ///
    /// [`VecError::AllocationFailure`] wrapping
    /// [`LayoutOverflow`](virtmem_core::PageError::LayoutOverflow),
    /// [`UnsupportedAlignment`](virtmem_core::PageError::UnsupportedAlignment),
    /// or whatever the allocator's `reserve` reported.
    pub fn with_config_in(config: VecConfig, pages: A) -> Result<Self, VecError> {
        let bytes = config.reserved_bytes_for::<T>(pages.page_size())?;
        let region = RawRegion::reserve(pages, bytes, &config)?;
        Ok(Self {
            region,
            len: Cell::new(0),
            capacity: config.capacity,
            config,
            _marker: PhantomData,
        })
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// `true` if there are no live elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of elements, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Same as [`capacity`](Self::capacity).
    pub fn max_size(&self) -> usize {
        self.capacity
    }

    /// Number of elements that fit in the committed pages.
    ///
    /// `len() <= committed() <= capacity()` always holds. Zero-sized
    /// elements occupy no pages, so for them this equals `len()`.
    pub fn committed(&self) -> usize {
        match mem::size_of::<T>() {
            0 => self.len(),
            size => (self.region.committed_bytes() / size).min(self.capacity),
        }
    }

    /// Bytes with physical backing. Always a multiple of the page size.
    pub fn committed_bytes(&self) -> usize {
        self.region.committed_bytes()
    }

    /// Bytes of address space reserved.
    pub fn reserved_bytes(&self) -> usize {
        self.region.reserved_bytes()
    }

    /// Commit granularity of the underlying allocator.
    pub fn page_size(&self) -> usize {
        self.region.page_size()
    }

    /// Whole elements per page (`usize::MAX` for zero-sized `T`).
    pub fn page_elements(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => self.page_size() / size,
        }
    }

    /// The configuration this vector was built with.
    pub fn config(&self) -> &VecConfig {
        &self.config
    }

    /// `true` once an address range is held.
    pub fn is_reserved(&self) -> bool {
        self.region.base().is_some()
    }

    /// The page allocator.
    pub fn allocator(&self) -> &A {
        self.region.pages()
    }

    /// Pointer to the first element. Dangling (but aligned) while nothing is
    /// reserved. Stable for the life of the reservation.
    pub fn as_ptr(&self) -> *const T {
        self.data_ptr().as_ptr()
    }

    /// Mutable pointer to the first element.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data_ptr().as_ptr()
    }

    /// The live elements.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` is committed and initialised; the region is
        // aligned for `T` and never moves.
        unsafe { slice::from_raw_parts(self.data_ptr().as_ptr(), self.len()) }
    }

    /// The live elements, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`, and `&mut self` is exclusive.
        unsafe { slice::from_raw_parts_mut(self.data_ptr().as_ptr(), self.len()) }
    }

    pub(crate) fn data_ptr(&self) -> NonNull<T> {
        self.region
            .base()
            .map_or(NonNull::dangling(), NonNull::cast::<T>)
    }

    /// Bounds-checked access.
    ///
    /// # Errors
    ///
    /// [`VecError::OutOfRange`] if `index >= len()`.
    pub fn at(&self, index: usize) -> Result<&T, VecError> {
        let len = self.len();
        self.as_slice()
            .get(index)
            .ok_or(VecError::OutOfRange { index, len })
    }

    /// Bounds-checked mutable access.
    ///
    /// # Errors
    ///
    /// [`VecError::OutOfRange`] if `index >= len()`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, VecError> {
        let len = self.len();
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(VecError::OutOfRange { index, len })
    }

    /// Make sure the slot at the logical end is committed and return it.
    fn slot(&self) -> Result<NonNull<T>, VecError> {
        let len = self.len();
        if len >= self.capacity {
            return Err(VecError::CapacityExceeded {
                requested: len.saturating_add(1),
                capacity: self.capacity,
            });
        }
        let size = mem::size_of::<T>();
        if size != 0 {
            // `capacity * size` fit at construction.
            self.region.ensure_committed((len + 1) * size)?;
        }
        // SAFETY: `len < capacity`, so the slot lies inside the reservation.
        Ok(unsafe { self.data_ptr().add(len) })
    }

    /// Append `value` and return a reference to it.
    ///
    /// Commits the next growth step first if the slot is not backed yet.
    /// References returned by earlier pushes remain valid.
    ///
    /// # Errors
    ///
    /// [`VecError::CapacityExceeded`] when full, or
    /// [`VecError::AllocationFailure`] if the commit is refused. In both
    /// cases the vector is unchanged and `value` is dropped.
    pub fn push(&self, value: T) -> Result<&T, VecError> {
        let slot = self.slot()?;
        // SAFETY: the slot is committed, past the logical end, and not
        // referenced by anything.
        unsafe { slot.as_ptr().write(value) };
        self.len.set(self.len() + 1);
        // SAFETY: just initialised; removal needs `&mut self`.
        Ok(unsafe { &*slot.as_ptr() })
    }

    /// Append the value produced by `make`.
    ///
    /// Capacity and commit are checked before `make` runs, so `make` is not
    /// called if the vector is already full or the commit fails. `make` may
    /// itself push onto this vector; if that fills it, the built value is
    /// dropped and the append fails.
    ///
    /// # Errors
    ///
    /// As for [`push`](Self::push).
    pub fn emplace_with<F>(&self, make: F) -> Result<&T, VecError>
    where
        F: FnOnce() -> T,
    {
        self.slot()?;
        self.push(make())
    }

    /// Append `value` and return a mutable reference to it.
    ///
    /// # Errors
    ///
    /// As for [`push`](Self::push).
    pub fn push_mut(&mut self, value: T) -> Result<&mut T, VecError> {
        let slot = self.slot()?;
        // SAFETY: as in `push`; `&mut self` makes the result exclusive.
        unsafe {
            slot.as_ptr().write(value);
            self.len.set(self.len() + 1);
            Ok(&mut *slot.as_ptr())
        }
    }

    /// Push every item of `iter`, stopping at the first error.
    ///
    /// # Errors
    ///
    /// The first error from [`push`](Self::push). Items pushed before it
    /// stay in the vector.
    pub fn try_extend<I>(&self, iter: I) -> Result<(), VecError>
    where
        I: IntoIterator<Item = T>,
    {
        for item in iter {
            self.push(item)?;
        }
        Ok(())
    }

    /// Drop elements from index `len` onward, in index order. Committed
    /// pages are kept; see [`shrink_to_fit`](Self::shrink_to_fit).
    pub fn truncate(&mut self, len: usize) {
        let old = self.len();
        if len >= old {
            return;
        }
        self.len.set(len);
        if mem::needs_drop::<T>() {
            // SAFETY: `[len, old)` was initialised and is no longer counted.
            unsafe {
                let tail = self.data_ptr().as_ptr().add(len);
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(tail, old - len));
            }
        }
    }

    /// Drop all elements in index order, then decommit every page. The
    /// reservation is kept for reuse.
    pub fn clear(&mut self) {
        self.drop_elements();
        // SAFETY: no elements remain and `&mut self` rules out references.
        unsafe { self.region.decommit_down_to(0) };
    }

    /// Decommit trailing growth steps that hold no live element.
    ///
    /// The boundary walks down in shrink steps and stops at the first step
    /// that would uncover a live element.
    pub fn shrink_to_fit(&mut self) {
        let floor = self.len() * mem::size_of::<T>();
        // SAFETY: only bytes at or above the live prefix are decommitted.
        unsafe { self.region.decommit_down_to(floor) };
    }

    fn drop_elements(&mut self) {
        let len = self.len.replace(0);
        if len > 0 && mem::needs_drop::<T>() {
            // SAFETY: `[0, len)` was initialised and is no longer counted,
            // so a panicking destructor cannot cause a double drop.
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    self.data_ptr().as_ptr(),
                    len,
                ));
            }
        }
    }

    /// Move the contents out, leaving `self` unreserved over a clone of the
    /// same allocator.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::new_in(self.region.pages().clone());
        mem::replace(self, empty)
    }

    /// A fresh, empty vector sized for a copy of `self`, with the source's
    /// committed region already committed.
    fn empty_copy(&self) -> Result<Self, VecError>
    where
        A: Clone,
    {
        let capacity = match self.config.clone_capacity {
            CloneCapacity::Full => self.capacity,
            CloneCapacity::Committed => self.committed().max(self.len()),
        };
        let config = VecConfig {
            capacity,
            ..self.config.clone()
        };
        let copy = Self::with_config_in(config, self.region.pages().clone())?;
        let precommit = self
            .region
            .committed_bytes()
            .min(copy.region.reserved_bytes());
        copy.region.ensure_committed(precommit)?;
        Ok(copy)
    }

    /// Deep copy, cloning each element in order into a new reservation.
    ///
    /// The copy's capacity follows [`VecConfig::clone_capacity`].
    ///
    /// # Errors
    ///
    /// [`VecError::AllocationFailure`] if the new range cannot be reserved
    /// or committed. If `T::clone` panics, the partial copy is dropped and
    /// released.
    pub fn try_clone(&self) -> Result<Self, VecError>
    where
        T: Clone,
        A: Clone,
    {
        let copy = self.empty_copy()?;
        for item in self.as_slice() {
            copy.push(item.clone())?;
        }
        Ok(copy)
    }

    /// Copy with one bulk memory copy instead of per-element clones.
    ///
    /// # Errors
    ///
    /// As for [`try_clone`](Self::try_clone).
    pub fn try_clone_bitwise(&self) -> Result<Self, VecError>
    where
        T: Copy,
        A: Clone,
    {
        let copy = self.empty_copy()?;
        let len = self.len();
        copy.region.ensure_committed(len * mem::size_of::<T>())?;
        // SAFETY: both ranges hold `len` committed slots and belong to
        // different reservations.
        unsafe {
            ptr::copy_nonoverlapping(self.data_ptr().as_ptr(), copy.data_ptr().as_ptr(), len);
        }
        copy.len.set(len);
        Ok(copy)
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> Drop for VirtualVec<T, G, A> {
    fn drop(&mut self) {
        self.drop_elements();
        // `region` decommits and releases when it is dropped next.
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator + Default> Default for VirtualVec<T, G, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T: Clone, G: GrowthPolicy, A: PageAllocator + Clone> Clone for VirtualVec<T, G, A> {
    /// # Panics
    ///
    /// If the copy cannot be reserved or committed. Use
    /// [`try_clone`](VirtualVec::try_clone) to handle that case.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(err) => panic!("VirtualVec::clone failed: {err}"),
        }
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> Deref for VirtualVec<T, G, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> DerefMut for VirtualVec<T, G, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> AsRef<[T]> for VirtualVec<T, G, A> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> AsMut<[T]> for VirtualVec<T, G, A> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug, G: GrowthPolicy, A: PageAllocator> fmt::Debug for VirtualVec<T, G, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T, U, G1, A1, G2, A2> PartialEq<VirtualVec<U, G2, A2>> for VirtualVec<T, G1, A1>
where
    T: PartialEq<U>,
    G1: GrowthPolicy,
    A1: PageAllocator,
    G2: GrowthPolicy,
    A2: PageAllocator,
{
    fn eq(&self, other: &VirtualVec<U, G2, A2>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, G: GrowthPolicy, A: PageAllocator> Eq for VirtualVec<T, G, A> {}

impl<T, U, G: GrowthPolicy, A: PageAllocator> PartialEq<[U]> for VirtualVec<T, G, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T, U, G: GrowthPolicy, A: PageAllocator> PartialEq<&[U]> for VirtualVec<T, G, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &&[U]) -> bool {
        self.as_slice() == *other
    }
}

impl<T, U, G: GrowthPolicy, A: PageAllocator, const N: usize> PartialEq<[U; N]>
    for VirtualVec<T, G, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T, U, G: GrowthPolicy, A: PageAllocator> PartialEq<Vec<U>> for VirtualVec<T, G, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &Vec<U>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<'a, T, G: GrowthPolicy, A: PageAllocator> IntoIterator for &'a VirtualVec<T, G, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, G: GrowthPolicy, A: PageAllocator> IntoIterator for &'a mut VirtualVec<T, G, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T, G: GrowthPolicy, A: PageAllocator> IntoIterator for VirtualVec<T, G, A> {
    type Item = T;
    type IntoIter = IntoIter<T, G, A>;

    fn into_iter(self) -> Self::IntoIter {
        // The iterator now owns the elements; the vector only keeps the
        // region alive.
        let len = self.len.replace(0);
        IntoIter::new(self, len)
    }
}
