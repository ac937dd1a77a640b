//! Lock-free and fine-grained locking concurrent collections for Rust.
//!
//! The crate provides a bounded ring queue (single- or multi-producer/consumer),
//! an unbounded linked queue with separate head and tail locks and a blocking
//! pop, and a lock-free stack that reclaims nodes through split reference
//! counting. Full and empty collections are reported through return values;
//! no operation other than `UnboundedLinkedQueue::wait_and_pop` ever parks
//! the calling thread.

pub mod error;
pub mod memory;
pub mod structures;
pub mod testing;

pub use self::error::{Error, Result};
pub use self::structures::{
    unbounded_spsc, BoundedRingQueue, LinkedConsumer, LinkedProducer, ReclaimingLockFreeStack,
    RingConsumer, RingProducer, UnboundedLinkedQueue,
};
