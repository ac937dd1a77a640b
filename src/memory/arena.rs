use crate::error::{Error, Result};
use crate::memory::counted::Handle;
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicIsize, AtomicPtr, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use thread_local::ThreadLocal;
use tracing::{debug, trace};

/// Segment `k` holds `segment_base << k` slots, so 32 segments cover every
/// index a `Handle` can name even with a base of one.
const MAX_SEGMENTS: usize = 32;

/// Tuning knobs for a `NodeArena`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    segment_base: usize,
    local_cache_limit: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            segment_base: 32,
            local_cache_limit: 64,
        }
    }
}

impl ArenaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in the first segment. Must be a power of two.
    pub fn segment_base(mut self, segment_base: usize) -> Self {
        self.segment_base = segment_base;
        self
    }

    /// Number of freed handles a thread keeps for itself before handing half
    /// of them to the shared free list.
    pub fn local_cache_limit(mut self, local_cache_limit: usize) -> Self {
        self.local_cache_limit = local_cache_limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_base == 0 || !self.segment_base.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "segment_base must be a non-zero power of two, got {}",
                self.segment_base
            )));
        }
        Ok(())
    }
}

/// One node's worth of storage.
pub(crate) struct Slot<T> {
    /// References retired by individual operations; zero when the slot may be freed.
    pub(crate) internal_count: AtomicIsize,
    /// Raw `CountedPtr` of the next node, written before the node is published.
    pub(crate) next: AtomicU64,
    pub(crate) data: UnsafeCell<Option<T>>,
    /// Link in the shared free list.
    free_next: AtomicU32,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Slot {
            internal_count: AtomicIsize::new(0),
            next: AtomicU64::new(0),
            data: UnsafeCell::new(None),
            free_next: AtomicU32::new(0),
        }
    }
}

/// Storage for nodes that concurrent readers may still be looking at.
///
/// Nodes are addressed by `Handle` and never move: the arena grows by adding
/// segments twice the size of the previous one, and segment memory is only
/// returned when the arena itself is dropped. A freed slot goes back on a
/// free list and is handed out again by a later `allocate`.
///
/// Each thread keeps a private cache of freed handles. Once a cache grows past
/// `local_cache_limit`, half of it is pushed onto a shared lock-free free list
/// whose head carries a generation tag, so a stale head can never be swapped in.
pub struct NodeArena<T: Send> {
    segments: Box<[AtomicPtr<Slot<T>>]>,
    fresh: AtomicUsize,
    free_head: AtomicU64,
    local: ThreadLocal<UnsafeCell<Vec<Handle>>>,
    live: AtomicUsize,
    config: ArenaConfig,
}

unsafe impl<T: Send> Send for NodeArena<T> {}
unsafe impl<T: Send> Sync for NodeArena<T> {}

impl<T: Send> NodeArena<T> {
    pub fn new() -> Self {
        Self::from_valid_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ArenaConfig) -> Self {
        let segments: Vec<AtomicPtr<Slot<T>>> =
            (0..MAX_SEGMENTS).map(|_| AtomicPtr::default()).collect();
        NodeArena {
            segments: segments.into_boxed_slice(),
            fresh: AtomicUsize::new(0),
            free_head: AtomicU64::new(0),
            local: ThreadLocal::new(),
            live: AtomicUsize::new(0),
            config,
        }
    }

    /// Number of slots currently holding a node that has not been freed.
    pub fn live_nodes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Number of distinct slots ever handed out. Reused slots are counted once.
    pub fn allocated_slots(&self) -> usize {
        self.fresh.load(Ordering::SeqCst).min(Handle::MAX_INDEX + 1)
    }

    /// Takes a free slot, fills it with `value` and resets its counts.
    ///
    /// The slot is private to the caller until the caller publishes the handle.
    pub(crate) fn allocate(&self, value: T) -> Handle {
        let handle = match self.pop_local().or_else(|| self.pop_shared()) {
            Some(handle) => handle,
            None => self.fresh_handle(),
        };
        let slot = self.slot(handle);
        slot.internal_count.store(0, Ordering::Relaxed);
        slot.next.store(0, Ordering::Relaxed);
        unsafe {
            *slot.data.get() = Some(value);
        }
        self.live.fetch_add(1, Ordering::Relaxed);
        handle
    }

    /// Returns a slot to the arena.
    ///
    /// The caller must be the last holder of any reference to the node: its
    /// internal count has reached zero and the handle is no longer reachable
    /// from any shared pointer.
    pub(crate) fn free(&self, handle: Handle) {
        let slot = self.slot(handle);
        debug_assert_eq!(
            slot.internal_count.load(Ordering::Relaxed),
            0,
            "freeing {:?} while references remain",
            handle
        );
        unsafe {
            drop((*slot.data.get()).take());
        }
        self.live.fetch_sub(1, Ordering::Relaxed);

        // Only the owning thread ever touches its cache.
        let cache = unsafe { &mut *self.local.get_or(|| UnsafeCell::new(Vec::new())).get() };
        cache.push(handle);
        if cache.len() > self.config.local_cache_limit {
            let keep = self.config.local_cache_limit / 2;
            let spill = cache.len() - keep;
            for handle in cache.drain(..spill) {
                self.push_shared(handle);
            }
            trace!(spilled = spill, "moved cached handles to shared free list");
        }
    }

    pub(crate) fn slot(&self, handle: Handle) -> &Slot<T> {
        let (segment, offset) = self.locate(handle.index());
        let base = self.segments[segment].load(Ordering::Acquire);
        debug_assert!(!base.is_null(), "{:?} names an unallocated segment", handle);
        unsafe { &*base.add(offset) }
    }

    fn pop_local(&self) -> Option<Handle> {
        self.local
            .get()
            .and_then(|cache| unsafe { (*cache.get()).pop() })
    }

    fn pop_shared(&self) -> Option<Handle> {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack_free(head);
            if top.is_null() {
                return None;
            }
            // Possibly stale if `top` was taken meanwhile; the tag makes the swap fail then.
            let next = self.slot(top).free_next.load(Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                pack_free(tag.wrapping_add(1), Handle::from_raw(next)),
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(actual) => head = actual,
            }
        }
    }

    fn push_shared(&self, handle: Handle) {
        let slot = self.slot(handle);
        let mut head = self.free_head.load(Ordering::Relaxed);
        loop {
            let (tag, top) = unpack_free(head);
            slot.free_next.store(top.into_raw(), Ordering::Relaxed);
            match self.free_head.compare_exchange_weak(
                head,
                pack_free(tag.wrapping_add(1), handle),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    fn fresh_handle(&self) -> Handle {
        let index = self.fresh.fetch_add(1, Ordering::Relaxed);
        if index > Handle::MAX_INDEX {
            panic!("node arena exhausted after {} slots", Handle::MAX_INDEX + 1);
        }
        let (segment, _) = self.locate(index);
        self.ensure_segment(segment);
        Handle::from_index(index)
    }

    fn ensure_segment(&self, segment: usize) {
        if !self.segments[segment].load(Ordering::Acquire).is_null() {
            return;
        }
        let len = self.segment_len(segment);
        let slots: Box<[Slot<T>]> = (0..len).map(|_| Slot::new()).collect();
        let raw = Box::into_raw(slots) as *mut Slot<T>;
        match self.segments[segment].compare_exchange(
            ptr::null_mut(),
            raw,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => debug!(segment, slots = len, "node arena grew"),
            // Another thread installed it first.
            Err(_) => unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len))) },
        }
    }

    fn segment_len(&self, segment: usize) -> usize {
        self.config.segment_base << segment
    }

    /// Maps a slot index to (segment, offset within segment).
    fn locate(&self, index: usize) -> (usize, usize) {
        let base = self.config.segment_base;
        let scaled = index / base + 1;
        let segment = (usize::BITS - 1 - scaled.leading_zeros()) as usize;
        let first = base * ((1 << segment) - 1);
        (segment, index - first)
    }
}

impl<T: Send> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Drop for NodeArena<T> {
    fn drop(&mut self) {
        for segment in 0..MAX_SEGMENTS {
            let raw = *self.segments[segment].get_mut();
            if !raw.is_null() {
                let len = self.segment_len(segment);
                unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(raw, len))) };
            }
        }
    }
}

impl<T: Send> fmt::Debug for NodeArena<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NodeArena")
            .field("live", &self.live_nodes())
            .field("allocated", &self.allocated_slots())
            .field("config", &self.config)
            .finish()
    }
}

fn pack_free(tag: u32, handle: Handle) -> u64 {
    (u64::from(tag) << 32) | u64::from(handle.into_raw())
}

fn unpack_free(raw: u64) -> (u32, Handle) {
    ((raw >> 32) as u32, Handle::from_raw(raw as u32))
}
