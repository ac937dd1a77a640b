use crossbeam_utils::CachePadded;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

struct Node<T> {
    data: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn new_dummy_node() -> *mut Self {
        Box::into_raw(Box::new(Node {
            data: None,
            next: AtomicPtr::default(),
        }))
    }
}

struct Shared<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
}

unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut();
        while !current.is_null() {
            unsafe {
                let node = Box::from_raw(current);
                current = node.next.load(Ordering::Relaxed);
            }
        }
    }
}

/// Create an unbounded lock-free queue for one producer and one consumer.
///
/// Uses the same dummy-node chain as `UnboundedLinkedQueue`, but with atomic
/// head and tail pointers instead of locks. The producer only writes the
/// current dummy and the tail; the consumer only reads nodes before the tail
/// and frees each one as soon as it has moved past it.
/// # Examples
/// ```
/// # use concurrent_collections::unbounded_spsc;
/// let (mut tx, mut rx) = unbounded_spsc();
/// tx.push(1);
/// tx.push(2);
/// assert_eq!(rx.pop(), Some(1));
/// assert_eq!(rx.pop(), Some(2));
/// assert_eq!(rx.pop(), None);
/// ```
pub fn unbounded_spsc<T: Send>() -> (LinkedProducer<T>, LinkedConsumer<T>) {
    let dummy = Node::new_dummy_node();
    let shared = Arc::new(Shared {
        head: CachePadded::new(AtomicPtr::new(dummy)),
        tail: CachePadded::new(AtomicPtr::new(dummy)),
    });
    (
        LinkedProducer {
            shared: shared.clone(),
        },
        LinkedConsumer { shared },
    )
}

/// The pushing half of an unbounded SPSC queue.
pub struct LinkedProducer<T> {
    shared: Arc<Shared<T>>,
}

/// The popping half of an unbounded SPSC queue.
pub struct LinkedConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> LinkedProducer<T> {
    pub fn push(&mut self, value: T) {
        let new_tail = Node::new_dummy_node();
        let old_tail = self.shared.tail.load(Ordering::Relaxed);
        unsafe {
            (*old_tail).data = Some(value);
            (*old_tail).next.store(new_tail, Ordering::Relaxed);
        }
        self.shared.tail.store(new_tail, Ordering::Release);
    }
}

impl<T: Send> LinkedConsumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        let old_head = self.shared.head.load(Ordering::Relaxed);
        if ptr::eq(old_head, self.shared.tail.load(Ordering::Acquire)) {
            return None;
        }
        let node = unsafe { Box::from_raw(old_head) };
        self.shared
            .head
            .store(node.next.load(Ordering::Relaxed), Ordering::Relaxed);
        node.data
    }

    pub fn is_empty(&self) -> bool {
        ptr::eq(
            self.shared.head.load(Ordering::Relaxed),
            self.shared.tail.load(Ordering::Acquire),
        )
    }
}

impl<T> fmt::Debug for LinkedProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinkedProducer {{ tail: {:?} }}", self.shared.tail.load(Ordering::Relaxed))
    }
}

impl<T> fmt::Debug for LinkedConsumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinkedConsumer {{ head: {:?} }}", self.shared.head.load(Ordering::Relaxed))
    }
}
