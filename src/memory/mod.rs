//! Node storage for lock-free structures.
//!
//! Nodes are kept in a `NodeArena` and named by `Handle`s that stay valid for
//! the life of the arena. A `CountedPtr` pairs a handle with an external
//! reference count in a single atomic word. Together they let a structure
//! tell exactly when the last reader of a node has finished with it, and so
//! avoid both use-after-free and the
//! [ABA problem](https://en.wikipedia.org/wiki/ABA_problem) without locks.

pub use self::arena::{ArenaConfig, NodeArena};
pub use self::counted::{AtomicCountedPtr, CountedPtr, Handle};

mod arena;
mod counted;
