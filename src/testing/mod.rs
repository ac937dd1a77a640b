//! Utilities for testing linearizability of concurrent collections, based on the strategy
//! described by Lowe in [Testing for Linearizability](http://www.cs.ox.ac.uk/people/gavin.lowe/LinearizabiltyTesting/paper.pdf).
//! Worker threads log every operation through a `ThreadLog`; the merged `History` is then
//! checked against a `SequentialModel`.

//! # Example
//! ```
//! use concurrent_collections::ReclaimingLockFreeStack;
//! use concurrent_collections::testing::{CollectionOp, LinearizabilityTester, StackModel, ThreadLog};
//! use rand::{thread_rng, Rng};
//!
//! let stack: ReclaimingLockFreeStack<u32> = ReclaimingLockFreeStack::new();
//! let tester = LinearizabilityTester::new(StackModel::<u32>::default(), 4, 50);
//!
//! fn worker(stack: &ReclaimingLockFreeStack<u32>, log: &mut ThreadLog<CollectionOp<u32>, Option<u32>>) {
//!     if thread_rng().gen_range(0..100) < 40 {
//!         let val = thread_rng().gen_range(0..1000);
//!         log.log(CollectionOp::Push(val), || { stack.push(val); None });
//!     } else {
//!         log.log(CollectionOp::Pop, || stack.pop());
//!     }
//! }
//!
//! let result = tester.run(&stack, worker).unwrap();
//! assert!(result.is_success());
//! ```

pub use self::automaton::History;
pub use self::linearizability_tester::{LinearizabilityResult, LinearizabilityTester};
pub use self::sequential::{CollectionOp, QueueModel, SequentialModel, StackModel};
pub use self::time_stamped::{Clock, ThreadLog, TimeStamped};

mod automaton;
pub mod linearizability_tester;
mod sequential;
mod time_stamped;
