use std::{
    alloc::{Layout, alloc, dealloc},
    ptr::{self, NonNull},
};

use crate::error::Error;

/// An owned allocation: pointer plus allocated slot count. Knows nothing
/// about which slots hold live values; the owner tracks that and is also
/// responsible for calling [RawBuf::release]. There is deliberately no
/// `Drop` impl, so a corrupted owner can choose to leak instead of freeing
/// through a suspect pointer.
///
/// The pointer is a plain `*mut T` rather than `NonNull` so that external
/// byte-level corruption (including an all-zero rewrite) produces an
/// inconsistent value, never an invalid one. `cap == 0` is the unallocated
/// state (dangling pointer). Zero-sized `T` never allocates at any capacity.
pub(crate) struct RawBuf<T> {
    ptr: *mut T,
    cap: usize,
}

impl<T> RawBuf<T> {
    fn dangling_ptr() -> *mut T {
        NonNull::dangling().as_ptr()
    }

    /// The unallocated state.
    pub fn dangling() -> Self {
        Self {
            ptr: Self::dangling_ptr(),
            cap: 0,
        }
    }

    /// Allocate exactly `cap` slots from the global allocator. Layout
    /// overflow and allocator exhaustion both surface as
    /// [Error::AllocationFailure]; nothing panics.
    pub fn allocate(cap: usize) -> Result<Self, Error> {
        if cap == 0 || size_of::<T>() == 0 {
            return Ok(Self {
                ptr: Self::dangling_ptr(),
                cap,
            });
        }
        let layout = Layout::array::<T>(cap).map_err(|_| Error::AllocationFailure)?;
        let ptr = unsafe { alloc(layout) }.cast::<T>();
        if ptr.is_null() {
            return Err(Error::AllocationFailure);
        }
        Ok(Self { ptr, cap })
    }

    /// Return the allocation to the global allocator and reset to the
    /// unallocated state. Idempotent. Does not touch slot contents.
    pub fn release(&mut self) {
        if self.cap != 0 && size_of::<T>() != 0 {
            unsafe {
                // The layout was validated by `allocate`.
                let layout =
                    Layout::from_size_align_unchecked(self.cap * size_of::<T>(), align_of::<T>());
                dealloc(self.ptr.cast(), layout);
            }
        }
        self.ptr = Self::dangling_ptr();
        self.cap = 0;
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Pointer address as an integer, folded into the owner's digest.
    pub fn addr(&self) -> usize {
        self.ptr as usize
    }

    /// Raw pointer to slot `i`. The caller keeps `i` within `cap` (any `i`
    /// is fine for zero-sized `T`).
    pub fn slot(&self, i: usize) -> *mut T {
        debug_assert!(i <= self.cap || size_of::<T>() == 0);
        unsafe { self.ptr.add(i) }
    }

    /// Move-construct slot `i` from `value`.
    ///
    /// # Safety
    /// `i < cap` and slot `i` holds no live value.
    pub unsafe fn write(&self, i: usize, value: T) {
        unsafe { ptr::write(self.slot(i), value) }
    }

    /// Move the value out of slot `i`, leaving the slot logically dead.
    ///
    /// # Safety
    /// `i < cap` and slot `i` holds a live value that is not read again.
    pub unsafe fn read(&self, i: usize) -> T {
        unsafe { ptr::read(self.slot(i)) }
    }

    /// Run the destructor of the value in slot `i` in place.
    ///
    /// # Safety
    /// `i < cap` and slot `i` holds a live value that is not used again.
    pub unsafe fn drop_in_place(&self, i: usize) {
        unsafe { ptr::drop_in_place(self.slot(i)) }
    }

    /// Move the first `n` live values into `dst`, which must be a distinct
    /// allocation. The source slots become logically dead.
    ///
    /// # Safety
    /// `n <= cap`, `n <= dst.cap`, slots `0..n` are live, and `dst` does not
    /// alias `self`.
    pub unsafe fn move_into(&self, dst: &RawBuf<T>, n: usize) {
        unsafe { ptr::copy_nonoverlapping(self.slot(0), dst.slot(0), n) }
    }

    /// Whether `cap == 0` coincides with the unallocated pointer state.
    /// Vacuously true for zero-sized `T`.
    pub fn ptr_consistent(&self) -> bool {
        if size_of::<T>() == 0 {
            return true;
        }
        (self.cap == 0) == (self.ptr == Self::dangling_ptr())
    }

    pub fn is_unallocated(&self) -> bool {
        size_of::<T>() == 0 || self.ptr == Self::dangling_ptr()
    }
}
