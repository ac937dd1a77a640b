use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Node<T> {
    data: Option<T>,
    next: Option<NonNull<Node<T>>>,
}

impl<T> Node<T> {
    fn new_dummy_node() -> NonNull<Self> {
        NonNull::from(Box::leak(Box::new(Node {
            data: None,
            next: None,
        })))
    }
}

/// An unbounded FIFO queue with separate locks for the head and the tail.
///
/// The chain always ends in a dummy node. A push fills the current dummy and
/// links a fresh one behind it, so it only ever needs the tail lock, and a
/// pop only ever needs the head lock (plus a brief look at the tail pointer
/// to tell whether the head is the dummy). One producer and one consumer
/// therefore never contend.
///
/// The head lock owns the whole chain and a node is freed by the pop that
/// unlinks it. The tail lock only names the dummy. Nodes are only reached
/// through raw pointers, so the producer filling the dummy never overlaps a
/// reference to it held by a consumer.
pub struct UnboundedLinkedQueue<T> {
    head: Mutex<NonNull<Node<T>>>,
    tail: Mutex<NonNull<Node<T>>>,
    data_cond: Condvar,
    /// Consumers parked in `wait_and_pop`. Only incremented under the tail lock.
    waiters: AtomicUsize,
}

unsafe impl<T: Send> Send for UnboundedLinkedQueue<T> {}
unsafe impl<T: Send> Sync for UnboundedLinkedQueue<T> {}

impl<T> UnboundedLinkedQueue<T> {
    /// Create a new, empty queue.
    /// # Examples
    /// ```
    /// # use concurrent_collections::UnboundedLinkedQueue;
    /// let queue: UnboundedLinkedQueue<String> = UnboundedLinkedQueue::new();
    /// assert!(queue.is_empty());
    /// ```
    pub fn new() -> Self {
        let dummy = Node::new_dummy_node();
        UnboundedLinkedQueue {
            head: Mutex::new(dummy),
            tail: Mutex::new(dummy),
            data_cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Add a value to the back of the queue, waking one waiting consumer.
    /// # Examples
    /// ```
    /// # use concurrent_collections::UnboundedLinkedQueue;
    /// let queue = UnboundedLinkedQueue::new();
    /// queue.push("hello".to_owned());
    /// assert_eq!(queue.try_pop(), Some("hello".to_owned()));
    /// ```
    pub fn push(&self, value: T) {
        let new_tail = Node::new_dummy_node();
        let waiting = {
            let mut tail = self.tail.lock();
            // Consumers leave the dummy alone until `tail` moves past it.
            unsafe {
                let old_tail = tail.as_ptr();
                (*old_tail).data = Some(value);
                (*old_tail).next = Some(new_tail);
            }
            *tail = new_tail;
            self.waiters.load(Ordering::Relaxed)
        };
        if waiting > 0 {
            // A waiter that registered under the tail lock either still holds the
            // head lock or is already parked, so taking it here cannot miss it.
            let _head = self.head.lock();
            self.data_cond.notify_one();
        }
    }

    /// Take the value at the front of the queue, or return None if it is empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = self.head.lock();
        if self.is_dummy(*head) {
            return None;
        }
        Self::pop_head(&mut head)
    }

    /// Take the value at the front of the queue, parking the thread until one
    /// is pushed if the queue is empty.
    pub fn wait_and_pop(&self) -> T {
        let mut head = self.head.lock();
        loop {
            if !self.register_if_empty(*head) {
                if let Some(value) = Self::pop_head(&mut head) {
                    return value;
                }
                continue;
            }
            // Woken spuriously or beaten to the value: go round and check again.
            self.data_cond.wait(&mut head);
            self.waiters.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Snapshot check; may be stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        let head = self.head.lock();
        self.is_dummy(*head)
    }

    fn is_dummy(&self, head: NonNull<Node<T>>) -> bool {
        head == *self.tail.lock()
    }

    /// Under the tail lock: returns true and counts the caller as a waiter
    /// if the queue is empty.
    fn register_if_empty(&self, head: NonNull<Node<T>>) -> bool {
        let tail = self.tail.lock();
        if head == *tail {
            self.waiters.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Unlinks and frees the head node. The caller holds the head lock and
    /// has checked under the tail lock that the head is not the dummy.
    fn pop_head(head: &mut NonNull<Node<T>>) -> Option<T> {
        let next = unsafe { (*head.as_ptr()).next }?;
        let old_head = unsafe { Box::from_raw(head.as_ptr()) };
        *head = next;
        old_head.data
    }
}

impl<T> Default for UnboundedLinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for UnboundedLinkedQueue<T> {
    fn drop(&mut self) {
        let mut next = Some(*self.head.get_mut());
        while let Some(node) = next {
            let node = unsafe { Box::from_raw(node.as_ptr()) };
            next = node.next;
        }
    }
}

impl<T> fmt::Debug for UnboundedLinkedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UnboundedLinkedQueue")
            .field("empty", &self.is_empty())
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .finish()
    }
}
