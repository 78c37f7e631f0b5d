use std::fmt;
use std::mem;

use digest::Digest;

use crate::error::Error;
use crate::raw::RawBuf;

/// A dynamic-array stack that validates its own control block before every
/// operation.
///
/// The struct is `#[repr(C)]` so the two canaries physically bracket the
/// control fields (pointer, capacity, length, digest) in memory: a buffer
/// overrun from an adjacent object trips a canary, while a targeted rewrite
/// of the control fields trips the digest. Every public operation starts by
/// evaluating the validity predicate and refuses to touch memory when it
/// fails; every successful mutation ends with a fresh digest.
///
/// Failures are ordinary [Error] results. There is no panicking path for
/// misuse, and results must be checked.
#[repr(C)]
pub struct GuardedStack<T> {
    head_canary: u64,
    buf: RawBuf<T>,
    len: usize,
    digest: u8,
    tail_canary: u64,
}

/// Exclusive ownership moves with the value; no interior sharing.
unsafe impl<T: Send> Send for GuardedStack<T> {}
unsafe impl<T: Sync> Sync for GuardedStack<T> {}

impl<T> GuardedStack<T> {
    /// Value both canaries must hold.
    const CANARY: u64 = 0xC0DE_FACE_5AFE_57AC;

    /// Grow to `cap * GROWTH_FACTOR + 1` when full.
    const GROWTH_FACTOR: usize = 2;

    /// Shrink to fit when occupancy drops below this ratio. Together with
    /// growing only when 100% full this forms a hysteresis band, so a
    /// push/pop sequence at the boundary cannot thrash the allocator.
    const SHRINK_FACTOR: f64 = 0.4;

    /// An empty stack. Allocates nothing and cannot fail.
    pub fn new() -> Self {
        let mut stack = Self {
            head_canary: Self::CANARY,
            buf: RawBuf::dangling(),
            len: 0,
            digest: 0,
            tail_canary: Self::CANARY,
        };
        stack.digest = stack.compute_digest();
        debug_assert!(stack.is_valid());
        stack
    }

    /// The validity predicate: canaries intact, digest matches the control
    /// fields, `len <= capacity`, and the pointer agrees with the capacity.
    /// Read-only and infallible; use this to probe a suspect instance
    /// without triggering an error.
    pub fn is_valid(&self) -> bool {
        self.head_canary == Self::CANARY
            && self.tail_canary == Self::CANARY
            && self.digest == self.compute_digest()
            && self.len <= self.buf.cap()
            && self.buf.ptr_consistent()
    }

    /// Push a value on top, growing the buffer when full.
    pub fn push(&mut self, value: T) -> Result<(), Error> {
        self.push_with(|| value)
    }

    /// Push the result of `make`, constructing it only after capacity for it
    /// is secured.
    pub fn push_with(&mut self, make: impl FnOnce() -> T) -> Result<(), Error> {
        self.check()?;
        if self.len == self.buf.cap() {
            // `+ 1` makes progress from capacity 0.
            self.realloc(self.buf.cap() * Self::GROWTH_FACTOR + 1)?;
        }
        unsafe { self.buf.write(self.len, make()) };
        self.len += 1;
        self.refresh_digest();
        Ok(())
    }

    /// Remove and return the top element. Shrinks the buffer once occupancy
    /// falls below [Self::SHRINK_FACTOR]. Shrinking is best-effort: if the
    /// smaller allocation cannot be obtained the stack keeps its current
    /// buffer, stays valid, and the popped value is still returned.
    pub fn pop(&mut self) -> Result<T, Error> {
        self.check()?;
        if self.len == 0 {
            return Err(Error::Underflow);
        }
        self.len -= 1;
        let value = unsafe { self.buf.read(self.len) };
        self.refresh_digest();
        let cap = self.buf.cap();
        // Guard the division: emptying the stack can leave cap at 0.
        if cap > 0 && (self.len as f64) / (cap as f64) < Self::SHRINK_FACTOR {
            // A failed realloc leaves the pre-call state intact, so the
            // element already popped is the only change.
            let _ = self.realloc(self.len);
        }
        Ok(value)
    }

    /// Borrow the top element.
    pub fn top(&self) -> Result<&T, Error> {
        self.check()?;
        if self.len == 0 {
            return Err(Error::Underflow);
        }
        Ok(unsafe { &*self.buf.slot(self.len - 1) })
    }

    /// Mutably borrow the top element.
    pub fn top_mut(&mut self) -> Result<&mut T, Error> {
        self.check()?;
        if self.len == 0 {
            return Err(Error::Underflow);
        }
        Ok(unsafe { &mut *self.buf.slot(self.len - 1) })
    }

    /// Reallocate to exactly `new_cap` slots.
    ///
    /// `new_cap == 0` is a full release, identical to [Self::clear].
    /// `new_cap < len()` **truncates**: the excess top elements are dropped
    /// before the survivors move, the same rule the zero case follows. On
    /// [Error::AllocationFailure] the stack is untouched and still valid.
    pub fn reserve(&mut self, new_cap: usize) -> Result<(), Error> {
        self.check()?;
        self.realloc(new_cap)
    }

    /// Drop every element and release the buffer.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.check()?;
        self.realloc(0)
    }

    /// Number of live elements.
    pub fn len(&self) -> Result<usize, Error> {
        self.check()?;
        Ok(self.len)
    }

    /// Whether the stack holds no elements.
    pub fn is_empty(&self) -> Result<bool, Error> {
        self.check()?;
        Ok(self.len == 0)
    }

    /// Allocated slot count.
    pub fn capacity(&self) -> Result<usize, Error> {
        self.check()?;
        Ok(self.buf.cap())
    }

    /// Duplicate the contents into a fresh stack whose buffer is sized to
    /// exactly `len()`. The source is untouched and must be valid.
    ///
    /// This is the only duplication path; `Clone` is deliberately not
    /// implemented so an invalid source can never be copied silently.
    pub fn try_clone(&self) -> Result<Self, Error>
    where
        T: Clone,
    {
        self.check()?;
        let mut out = Self::new();
        if self.len > 0 {
            out.buf = RawBuf::allocate(self.len)?;
            out.refresh_digest();
            for i in 0..self.len {
                let value = unsafe { (*self.buf.slot(i)).clone() };
                unsafe { out.buf.write(i, value) };
            }
            out.len = self.len;
            out.refresh_digest();
        }
        Ok(out)
    }

    /// Move the contents out in O(1), leaving `self` as a tombstone: its
    /// length exceeds its capacity, so every later operation on it reports
    /// [Error::InvalidState] instead of touching stale memory. An invalid
    /// source fails before anything is transferred.
    ///
    /// Move-assignment is `dst = src.take()?`; the destination's previous
    /// buffer is released by its own drop.
    pub fn take(&mut self) -> Result<Self, Error> {
        self.check()?;
        let mut out = Self::new();
        out.buf = mem::replace(&mut self.buf, RawBuf::dangling());
        out.len = self.len;
        out.refresh_digest();
        // Tombstone: len > cap fails the predicate from here on.
        self.len = 1;
        debug_assert!(!self.is_valid());
        debug_assert!(out.is_valid());
        Ok(out)
    }

    /// Human-readable snapshot of the control block and slots, with the
    /// uninitialized tail rendered as a placeholder. Diagnostic only; never
    /// part of the correctness contract.
    pub fn describe(&self) -> String
    where
        T: fmt::Debug,
    {
        let mut out = format!(
            "GuardedStack {{ valid: {}, len: {}, cap: {}, digest: {:#04x}, canaries: {:#x}/{:#x} }}",
            self.is_valid(),
            self.len,
            self.buf.cap(),
            self.digest,
            self.head_canary,
            self.tail_canary,
        );
        // Slot contents are only trustworthy while the predicate holds.
        if self.is_valid() {
            out.push_str(" [");
            for i in 0..self.buf.cap() {
                if i > 0 {
                    out.push_str(", ");
                }
                if i < self.len {
                    out.push_str(&format!("{:?}", unsafe { &*self.buf.slot(i) }));
                } else {
                    out.push_str("<uninit>");
                }
            }
            out.push(']');
        }
        out
    }

    /// Pre-check shared by every public operation.
    fn check(&self) -> Result<(), Error> {
        if self.is_valid() {
            Ok(())
        } else {
            tracing::warn!(
                len = self.len,
                cap = self.buf.cap(),
                "guarded stack control block failed validation"
            );
            Err(Error::InvalidState)
        }
    }

    /// Fingerprint of the logical control fields: pointer address, capacity,
    /// length. The digest field itself and the canaries do not participate.
    fn compute_digest(&self) -> u8 {
        let mut d = Digest::new();
        d.update_usize(self.buf.addr());
        d.update_usize(self.buf.cap());
        d.update_usize(self.len);
        d.finalize()
    }

    /// Store a digest matching the current fields, then assert the
    /// post-condition. A failure here is the library's own bug, not external
    /// corruption.
    fn refresh_digest(&mut self) {
        self.digest = self.compute_digest();
        debug_assert!(self.is_valid());
    }

    /// Reallocate to exactly `new_cap` slots, truncating when `new_cap` is
    /// below the live count. Caller has already validated the control block.
    fn realloc(&mut self, new_cap: usize) -> Result<(), Error> {
        if new_cap == 0 {
            unsafe { self.drop_slots() };
            self.buf.release();
            self.refresh_digest();
            return Ok(());
        }
        // Allocate before mutating anything, so failure leaves the pre-call
        // state intact.
        let new_buf = RawBuf::allocate(new_cap)?;
        unsafe {
            while self.len > new_cap {
                self.len -= 1;
                self.buf.drop_in_place(self.len);
            }
            // Old and new allocations never alias.
            self.buf.move_into(&new_buf, self.len);
        }
        self.buf.release();
        self.buf = new_buf;
        self.refresh_digest();
        Ok(())
    }

    /// Drop all live elements and zero the length. Leaves the buffer alone.
    unsafe fn drop_slots(&mut self) {
        while self.len > 0 {
            self.len -= 1;
            unsafe { self.buf.drop_in_place(self.len) };
        }
    }

    /// The deliberate moved-from shape: canaries intact, no buffer, length 1
    /// over capacity 0. Dropping one of these is routine, unlike dropping a
    /// corrupted instance.
    fn is_tombstone(&self) -> bool {
        self.head_canary == Self::CANARY
            && self.tail_canary == Self::CANARY
            && self.buf.cap() == 0
            && self.buf.is_unallocated()
            && self.len == 1
    }
}

impl<T> Default for GuardedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl<T> Drop for GuardedStack<T> {
    fn drop(&mut self) {
        if self.is_valid() {
            unsafe { self.drop_slots() };
            self.buf.release();
        } else if !self.is_tombstone() {
            // Freeing through a corrupted control block risks compounding
            // the damage; leak the allocation instead.
            tracing::warn!(
                len = self.len,
                cap = self.buf.cap(),
                "dropping an invalid guarded stack; leaking its buffer"
            );
        }
    }
}
