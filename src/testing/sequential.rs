use im::Vector;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

/// A sequential reference model that concurrent histories are checked against.
pub trait SequentialModel {
    type State: Clone + Eq + Hash;
    type Op: Clone + Debug;
    type Ret: Clone + Eq + Debug;

    fn initial(&self) -> Self::State;

    /// Applies `op` to `state`, returning the new state and what the operation returned.
    fn step(&self, state: &Self::State, op: &Self::Op) -> (Self::State, Self::Ret);
}

/// Operations shared by the stack and queue models.
///
/// `Push` returns `None` on success or gives the value back when a bounded
/// collection is full; `Pop` returns the value taken, if any.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollectionOp<T> {
    Push(T),
    Pop,
}

/// LIFO model.
#[derive(Debug)]
pub struct StackModel<T>(PhantomData<fn() -> T>);

impl<T> Default for StackModel<T> {
    fn default() -> Self {
        StackModel(PhantomData)
    }
}

impl<T: Clone + Eq + Hash + Debug> SequentialModel for StackModel<T> {
    type State = Vector<T>;
    type Op = CollectionOp<T>;
    type Ret = Option<T>;

    fn initial(&self) -> Vector<T> {
        Vector::new()
    }

    fn step(&self, state: &Vector<T>, op: &CollectionOp<T>) -> (Vector<T>, Option<T>) {
        let mut next = state.clone();
        match op {
            CollectionOp::Push(value) => {
                next.push_back(value.clone());
                (next, None)
            }
            CollectionOp::Pop => {
                let popped = next.pop_back();
                (next, popped)
            }
        }
    }
}

/// FIFO model, optionally bounded.
#[derive(Debug)]
pub struct QueueModel<T> {
    capacity: Option<usize>,
    _values: PhantomData<fn() -> T>,
}

impl<T> QueueModel<T> {
    pub fn unbounded() -> Self {
        QueueModel {
            capacity: None,
            _values: PhantomData,
        }
    }

    pub fn bounded(capacity: usize) -> Self {
        QueueModel {
            capacity: Some(capacity),
            _values: PhantomData,
        }
    }
}

impl<T: Clone + Eq + Hash + Debug> SequentialModel for QueueModel<T> {
    type State = Vector<T>;
    type Op = CollectionOp<T>;
    type Ret = Option<T>;

    fn initial(&self) -> Vector<T> {
        Vector::new()
    }

    fn step(&self, state: &Vector<T>, op: &CollectionOp<T>) -> (Vector<T>, Option<T>) {
        match op {
            CollectionOp::Push(value) => {
                if self.capacity.map_or(false, |cap| state.len() >= cap) {
                    return (state.clone(), Some(value.clone()));
                }
                let mut next = state.clone();
                next.push_back(value.clone());
                (next, None)
            }
            CollectionOp::Pop => {
                let mut next = state.clone();
                let popped = next.pop_front();
                (next, popped)
            }
        }
    }
}
