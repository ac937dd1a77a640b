use crate::error::Result;
use crate::memory::{ArenaConfig, AtomicCountedPtr, CountedPtr, NodeArena};
use std::fmt;
use std::sync::atomic::Ordering;
use tracing::trace;

/// A lock-free LIFO stack that reclaims nodes with split reference counts.
///
/// The head is a `CountedPtr`: a node handle plus an external count. A pop
/// first bumps the external count of the head it observed, which registers it
/// as a reader before it touches the node. Every node also has an internal
/// count which each reader decrements when it is done. The thread that
/// detaches a node folds the external count into the internal one. Whoever
/// brings the internal count to zero frees the node, and at that moment no
/// other pop can still reach it.
///
/// Nodes live in a `NodeArena`, so a freed node is recycled rather than
/// returned to the allocator.
pub struct ReclaimingLockFreeStack<T: Send> {
    head: AtomicCountedPtr,
    arena: NodeArena<T>,
}

impl<T: Send> ReclaimingLockFreeStack<T> {
    /// Create a new, empty stack.
    /// # Examples
    /// ```
    /// # use concurrent_collections::ReclaimingLockFreeStack;
    /// let stack: ReclaimingLockFreeStack<String> = ReclaimingLockFreeStack::new();
    /// assert!(stack.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::from_arena(NodeArena::new())
    }

    /// Create a stack whose node storage is tuned by `config`.
    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        Ok(Self::from_arena(NodeArena::with_config(config)?))
    }

    fn from_arena(arena: NodeArena<T>) -> Self {
        ReclaimingLockFreeStack {
            head: AtomicCountedPtr::default(),
            arena,
        }
    }

    /// Push a value onto the top of the stack.
    /// # Examples
    /// ```
    /// # use concurrent_collections::ReclaimingLockFreeStack;
    /// let stack = ReclaimingLockFreeStack::new();
    /// stack.push(1);
    /// stack.push(2);
    /// assert_eq!(stack.pop(), Some(2));
    /// ```
    pub fn push(&self, value: T) {
        let handle = self.arena.allocate(value);
        let node = self.arena.slot(handle);
        let new_head = CountedPtr::new(handle, 1);
        let mut old_head = self.head.load(Ordering::Relaxed);
        loop {
            node.next.store(old_head.into_raw(), Ordering::Relaxed);
            match self.head.compare_exchange_weak(
                old_head,
                new_head,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => old_head = actual,
            }
        }
    }

    /// Take the value from the top of the stack, or return None if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let mut old_head = self.head.load(Ordering::Relaxed);
        loop {
            old_head = self.increase_head_count(old_head);
            let handle = old_head.handle();
            if handle.is_null() {
                return None;
            }
            let node = self.arena.slot(handle);
            let next = CountedPtr::from_raw(node.next.load(Ordering::Relaxed));
            match self.head.compare_exchange(old_head, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => {
                    // The node is ours alone to empty; other readers only look at `next`.
                    let data = unsafe { (*node.data.get()).take() };
                    // One for the head link we removed, one for our own registration.
                    let count_increase = old_head.external_count() as isize - 2;
                    if node.internal_count.fetch_add(count_increase, Ordering::Release)
                        == -count_increase
                    {
                        self.arena.free(handle);
                    }
                    return data;
                }
                Err(actual) => {
                    if node.internal_count.fetch_sub(1, Ordering::Relaxed) == 1 {
                        // Synchronise with the detaching thread's release before recycling.
                        node.internal_count.load(Ordering::Acquire);
                        self.arena.free(handle);
                    }
                    old_head = actual;
                }
            }
        }
    }

    /// Registers this thread as a reader of the current head, retrying until
    /// the increment lands on the value actually stored.
    fn increase_head_count(&self, mut old_head: CountedPtr) -> CountedPtr {
        loop {
            if old_head.is_null() {
                return old_head;
            }
            let new_head = old_head.incremented();
            match self.head.compare_exchange(
                old_head,
                new_head,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return new_head,
                Err(actual) => old_head = actual,
            }
        }
    }

    /// Snapshot check; may be stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Nodes allocated and not yet reclaimed, including detached nodes that a
    /// slower pop is still holding.
    pub fn live_nodes(&self) -> usize {
        self.arena.live_nodes()
    }

    /// Distinct node slots the stack has ever needed.
    pub fn allocated_slots(&self) -> usize {
        self.arena.allocated_slots()
    }
}

impl<T: Send> Default for ReclaimingLockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Drop for ReclaimingLockFreeStack<T> {
    fn drop(&mut self) {
        let mut drained = 0usize;
        while self.pop().is_some() {
            drained += 1;
        }
        trace!(drained, "dropped stack");
    }
}

impl<T: Send> fmt::Debug for ReclaimingLockFreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ReclaimingLockFreeStack")
            .field("head", &self.head)
            .field("arena", &self.arena)
            .finish()
    }
}
