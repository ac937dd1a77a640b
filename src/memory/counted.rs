use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A stable name for a slot in a `NodeArena`.
///
/// Handles are slot indices offset by one, so the zero handle is null.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(u32);

impl Handle {
    pub const NULL: Handle = Handle(0);

    /// Largest slot index a handle can name.
    pub(crate) const MAX_INDEX: usize = u32::MAX as usize - 1;

    pub(crate) fn from_index(index: usize) -> Handle {
        debug_assert!(index <= Self::MAX_INDEX);
        Handle(index as u32 + 1)
    }

    pub(crate) fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }

    pub(crate) fn into_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        debug_assert!(!self.is_null());
        self.0 as usize - 1
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_null() {
            write!(f, "Handle(null)")
        } else {
            write!(f, "Handle({})", self.index())
        }
    }
}

/// A node handle paired with the number of references handed out through it.
///
/// The external count is bumped by every pop that is about to dereference the
/// node, so two counted pointers naming the same node compare unequal once a
/// reader has registered itself. Both halves travel in a single `u64`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct CountedPtr {
    external_count: u32,
    handle: Handle,
}

impl CountedPtr {
    pub const NULL: CountedPtr = CountedPtr {
        external_count: 0,
        handle: Handle::NULL,
    };

    pub fn new(handle: Handle, external_count: u32) -> Self {
        CountedPtr {
            external_count,
            handle,
        }
    }

    pub fn handle(self) -> Handle {
        self.handle
    }

    pub fn external_count(self) -> u32 {
        self.external_count
    }

    pub fn is_null(self) -> bool {
        self.handle.is_null()
    }

    /// The same pointer with one more registered reader.
    pub fn incremented(self) -> Self {
        CountedPtr {
            external_count: self.external_count.wrapping_add(1),
            handle: self.handle,
        }
    }

    pub(crate) fn into_raw(self) -> u64 {
        (u64::from(self.external_count) << 32) | u64::from(self.handle.into_raw())
    }

    pub(crate) fn from_raw(raw: u64) -> Self {
        CountedPtr {
            external_count: (raw >> 32) as u32,
            handle: Handle::from_raw(raw as u32),
        }
    }
}

/// A `CountedPtr` that can be loaded and swapped as one atomic word.
pub struct AtomicCountedPtr(AtomicU64);

impl AtomicCountedPtr {
    pub fn new(ptr: CountedPtr) -> Self {
        AtomicCountedPtr(AtomicU64::new(ptr.into_raw()))
    }

    pub fn load(&self, order: Ordering) -> CountedPtr {
        CountedPtr::from_raw(self.0.load(order))
    }

    pub fn store(&self, ptr: CountedPtr, order: Ordering) {
        self.0.store(ptr.into_raw(), order)
    }

    pub fn compare_exchange(
        &self,
        current: CountedPtr,
        new: CountedPtr,
        success: Ordering,
        failure: Ordering,
    ) -> Result<CountedPtr, CountedPtr> {
        self.0
            .compare_exchange(current.into_raw(), new.into_raw(), success, failure)
            .map(CountedPtr::from_raw)
            .map_err(CountedPtr::from_raw)
    }

    pub fn compare_exchange_weak(
        &self,
        current: CountedPtr,
        new: CountedPtr,
        success: Ordering,
        failure: Ordering,
    ) -> Result<CountedPtr, CountedPtr> {
        self.0
            .compare_exchange_weak(current.into_raw(), new.into_raw(), success, failure)
            .map(CountedPtr::from_raw)
            .map_err(CountedPtr::from_raw)
    }
}

impl Default for AtomicCountedPtr {
    fn default() -> Self {
        AtomicCountedPtr::new(CountedPtr::NULL)
    }
}

impl fmt::Debug for AtomicCountedPtr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AtomicCountedPtr({:?})", self.load(Ordering::Relaxed))
    }
}
