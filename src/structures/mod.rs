//! The concurrent collections.
//!
//! - `BoundedRingQueue`: fixed-capacity circular buffer, shared MPMC or split into SPSC halves
//! - `UnboundedLinkedQueue`: dummy-node linked FIFO with separate head and tail locks
//! - `unbounded_spsc`: lock-free single-producer single-consumer linked FIFO
//! - `ReclaimingLockFreeStack`: lock-free LIFO with split reference counting

pub use self::linked_queue::UnboundedLinkedQueue;
pub use self::ring_queue::{BoundedRingQueue, RingConsumer, RingProducer};
pub use self::spsc_queue::{unbounded_spsc, LinkedConsumer, LinkedProducer};
pub use self::stack::ReclaimingLockFreeStack;

mod linked_queue;
mod ring_queue;
mod spsc_queue;
mod stack;
