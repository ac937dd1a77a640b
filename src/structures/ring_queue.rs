use crate::error::{Error, Result};
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Fixed array of `capacity + 1` slots with four positions.
///
/// Positions count up modulo `wrap`, the largest multiple of `slots.len()`
/// that fits in a `usize`, and a position maps to slot `position % slots.len()`.
/// Because `wrap` is a multiple of the slot count, consecutive positions stay
/// on consecutive slots across the wrap. Producers reserve at `tail` and
/// publish at `read_tail`; consumers reserve at `head` and release at
/// `read_head`. Publication and release both happen in reservation order, so
/// measured modulo `wrap`
///
/// `read_head <= head <= read_tail <= tail <= read_head + capacity`
///
/// and a slot is touched by at most one thread between two advances.
struct RingBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    wrap: usize,
    head: CachePadded<AtomicUsize>,
    read_head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    read_tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        let len = capacity
            .checked_add(1)
            .ok_or(Error::CapacityOverflow { capacity })?;
        let slots: Box<[UnsafeCell<MaybeUninit<T>>]> =
            (0..len).map(|_| UnsafeCell::new(MaybeUninit::uninit())).collect();
        Ok(RingBuffer {
            slots,
            wrap: usize::MAX - usize::MAX % len,
            head: CachePadded::new(AtomicUsize::new(0)),
            read_head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            read_tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    fn slot(&self, position: usize) -> *mut MaybeUninit<T> {
        self.slots[position % self.slots.len()].get()
    }

    #[inline]
    fn advance(&self, position: usize) -> usize {
        let next = position + 1;
        if next == self.wrap {
            0
        } else {
            next
        }
    }

    /// How far `to` is ahead of `from`, modulo `wrap`.
    #[inline]
    fn distance(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            to + (self.wrap - from)
        }
    }

    fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        head == self.read_tail.load(Ordering::Acquire)
    }

    fn is_full(&self) -> bool {
        let read_head = self.read_head.load(Ordering::Acquire);
        self.distance(read_head, self.tail.load(Ordering::Acquire)) >= self.capacity()
    }

    fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let read_tail = self.read_tail.load(Ordering::Acquire);
        self.distance(head, read_tail).min(self.capacity())
    }

    /// # Safety
    /// At most one thread may be pushing at any time.
    unsafe fn push_single(&self, value: T) -> std::result::Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if self.distance(self.read_head.load(Ordering::Acquire), tail) == self.capacity() {
            return Err(value);
        }
        let next = self.advance(tail);
        self.tail.store(next, Ordering::Relaxed);
        (*self.slot(tail)).as_mut_ptr().write(value);
        self.read_tail.store(next, Ordering::Release);
        Ok(())
    }

    /// # Safety
    /// At most one thread may be popping at any time.
    unsafe fn pop_single(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.read_tail.load(Ordering::Acquire) {
            return None;
        }
        // Read before releasing the slot, or the producer could overwrite it.
        let value = (*self.slot(head)).as_ptr().read();
        let next = self.advance(head);
        self.head.store(next, Ordering::Relaxed);
        self.read_head.store(next, Ordering::Release);
        Some(value)
    }

    fn push_multi(&self, value: T) -> std::result::Result<(), T> {
        let backoff = Backoff::new();
        let mut tail = self.tail.load(Ordering::Relaxed);
        loop {
            let used = self.distance(self.read_head.load(Ordering::Acquire), tail);
            if used > self.capacity() {
                // `tail` went stale while consumers released past it.
                tail = self.tail.load(Ordering::Relaxed);
                continue;
            }
            if used == self.capacity() {
                return Err(value);
            }
            match self.tail.compare_exchange_weak(
                tail,
                self.advance(tail),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    tail = actual;
                    backoff.spin();
                }
            }
        }

        unsafe { (*self.slot(tail)).as_mut_ptr().write(value) };

        // Wait for earlier producers to publish their slots, then publish ours.
        let backoff = Backoff::new();
        while self
            .read_tail
            .compare_exchange_weak(tail, self.advance(tail), Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        Ok(())
    }

    fn pop_multi(&self) -> Option<T> {
        let backoff = Backoff::new();
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            if head == self.read_tail.load(Ordering::Acquire) {
                return None;
            }
            match self.head.compare_exchange_weak(
                head,
                self.advance(head),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => {
                    head = actual;
                    backoff.spin();
                }
            }
        }

        let value = unsafe { (*self.slot(head)).as_ptr().read() };

        let backoff = Backoff::new();
        while self
            .read_head
            .compare_exchange_weak(head, self.advance(head), Ordering::Release, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        Some(value)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let read_tail = *self.read_tail.get_mut();
        let mut position = head;
        while position != read_tail {
            unsafe { (*self.slot(position)).as_mut_ptr().drop_in_place() };
            position = self.advance(position);
        }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("read_head", &self.read_head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("read_tail", &self.read_tail.load(Ordering::Relaxed))
            .finish()
    }
}

/// A bounded lock-free queue over a fixed circular buffer.
///
/// Shared by any number of producers and consumers. Reservations are made by
/// CAS on the `tail` and `head` positions, and each reservation is then
/// published in order, so a consumer never sees a half-written slot and a
/// producer never overwrites a slot that is still being read. Nothing is
/// allocated after construction.
///
/// Values pushed by one producer come out in the order it pushed them; the
/// interleaving between producers is unspecified. For strict FIFO with one
/// producer and one consumer, use [`BoundedRingQueue::spsc`].
#[derive(Debug)]
pub struct BoundedRingQueue<T> {
    buffer: RingBuffer<T>,
}

impl<T: Send> BoundedRingQueue<T> {
    /// Create a queue holding at most `capacity` values.
    /// # Examples
    /// ```
    /// # use concurrent_collections::BoundedRingQueue;
    /// let queue = BoundedRingQueue::new(2).unwrap();
    /// assert!(queue.push(1).is_ok());
    /// assert!(queue.push(2).is_ok());
    /// assert_eq!(queue.push(3), Err(3));
    /// assert_eq!(queue.pop(), Some(1));
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        let buffer = RingBuffer::new(capacity)?;
        debug!(capacity, "created mpmc ring queue");
        Ok(BoundedRingQueue { buffer })
    }

    /// Create a single-producer single-consumer queue, returned as its two halves.
    ///
    /// Neither half can be cloned, so each index has exactly one writer.
    /// # Examples
    /// ```
    /// # use concurrent_collections::BoundedRingQueue;
    /// let (mut tx, mut rx) = BoundedRingQueue::spsc(4).unwrap();
    /// tx.push("a").unwrap();
    /// assert_eq!(rx.pop(), Some("a"));
    /// ```
    pub fn spsc(capacity: usize) -> Result<(RingProducer<T>, RingConsumer<T>)> {
        let buffer = Arc::new(RingBuffer::new(capacity)?);
        debug!(capacity, "created spsc ring queue");
        Ok((
            RingProducer {
                buffer: buffer.clone(),
            },
            RingConsumer { buffer },
        ))
    }

    /// Add a value at the tail, or hand it back if the queue is full.
    pub fn push(&self, value: T) -> std::result::Result<(), T> {
        self.buffer.push_multi(value)
    }

    /// Take the value at the head, or return None if the queue is empty.
    pub fn pop(&self) -> Option<T> {
        self.buffer.pop_multi()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

/// The pushing half of an SPSC ring queue.
#[derive(Debug)]
pub struct RingProducer<T> {
    buffer: Arc<RingBuffer<T>>,
}

/// The popping half of an SPSC ring queue.
#[derive(Debug)]
pub struct RingConsumer<T> {
    buffer: Arc<RingBuffer<T>>,
}

impl<T: Send> RingProducer<T> {
    pub fn push(&mut self, value: T) -> std::result::Result<(), T> {
        // `&mut self` on the only producer handle rules out a second pusher.
        unsafe { self.buffer.push_single(value) }
    }

    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}

impl<T: Send> RingConsumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        unsafe { self.buffer.pop_single() }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
