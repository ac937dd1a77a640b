use super::sequential::SequentialModel;
use super::time_stamped::TimeStamped;
use std::collections::HashSet;
use std::mem;

/// A complete concurrent history: every operation with its invocation and
/// response ticks.
#[derive(Clone, Debug, Default)]
pub struct History<Op, Ret> {
    ops: Vec<TimeStamped<Op, Ret>>,
}

impl<Op, Ret> History<Op, Ret> {
    pub fn new() -> Self {
        History { ops: Vec::new() }
    }

    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = TimeStamped<Op, Ret>>,
    {
        History {
            ops: events.into_iter().collect(),
        }
    }

    pub fn push(&mut self, op: TimeStamped<Op, Ret>) {
        debug_assert!(op.invoked <= op.returned);
        self.ops.push(op);
    }

    pub fn operations(&self) -> &[TimeStamped<Op, Ret>] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Searches for a sequential order of the operations that respects
    /// real-time precedence and that `model` accepts.
    ///
    /// Depth-first search in the style of Wing and Gong: repeatedly pick a
    /// pending call that no outstanding response precedes, apply it to the
    /// model, and backtrack when an operation's recorded result disagrees.
    /// Configurations (set of linearised ops, model state) already explored
    /// are cached and pruned, following Lowe.
    pub fn check<S>(&self, model: &S) -> bool
    where
        S: SequentialModel<Op = Op, Ret = Ret>,
        Ret: PartialEq,
    {
        let mut events = EventList::new(&self.ops);
        let mut state = model.initial();
        let mut linearized = BitSet::new(self.ops.len());
        let mut seen: HashSet<(BitSet, S::State)> = HashSet::new();
        let mut calls: Vec<(usize, S::State)> = Vec::new();
        let mut entry = events.first();

        while !events.is_empty() {
            let op = events.op(entry);
            if events.is_call(entry) {
                let (next_state, ret) = model.step(&state, &self.ops[op].op);
                if ret == self.ops[op].ret {
                    let mut next_linearized = linearized.clone();
                    next_linearized.insert(op);
                    if seen.insert((next_linearized.clone(), next_state.clone())) {
                        calls.push((entry, mem::replace(&mut state, next_state)));
                        linearized = next_linearized;
                        events.lift(entry);
                        entry = events.first();
                        continue;
                    }
                }
                entry = events.next(entry);
            } else {
                // Reached a response whose call could not be placed: undo the
                // most recent choice and try the call after it.
                let (call, previous) = match calls.pop() {
                    Some(choice) => choice,
                    None => return false,
                };
                state = previous;
                linearized.remove(events.op(call));
                events.unlift(call);
                entry = events.next(call);
            }
        }
        true
    }
}

/// Calls and responses in tick order, as a doubly linked list that supports
/// removing a call together with its response and restoring them in reverse.
struct EventList {
    entries: Vec<Event>,
}

struct Event {
    op: usize,
    is_call: bool,
    matching: usize,
    prev: usize,
    next: usize,
}

/// Index of the list sentinel.
const HEAD: usize = 0;

impl EventList {
    fn new<Op, Ret>(ops: &[TimeStamped<Op, Ret>]) -> Self {
        // Calls sort before responses on equal ticks so that touching
        // operations are treated as overlapping.
        let mut order: Vec<(usize, bool, usize)> = Vec::with_capacity(ops.len() * 2);
        for (i, op) in ops.iter().enumerate() {
            order.push((op.invoked, false, i));
            order.push((op.returned, true, i));
        }
        order.sort();

        let len = order.len() + 1;
        let mut entries: Vec<Event> = Vec::with_capacity(len);
        entries.push(Event {
            op: usize::MAX,
            is_call: false,
            matching: HEAD,
            prev: len - 1,
            next: if len > 1 { 1 } else { HEAD },
        });
        let mut call_entry = vec![HEAD; ops.len()];
        for (position, &(_, is_return, op)) in order.iter().enumerate() {
            let index = position + 1;
            let matching = if is_return { call_entry[op] } else { HEAD };
            if is_return {
                entries[call_entry[op]].matching = index;
            } else {
                call_entry[op] = index;
            }
            entries.push(Event {
                op,
                is_call: !is_return,
                matching,
                prev: index - 1,
                next: if index + 1 < len { index + 1 } else { HEAD },
            });
        }
        EventList { entries }
    }

    fn is_empty(&self) -> bool {
        self.entries[HEAD].next == HEAD
    }

    fn first(&self) -> usize {
        self.entries[HEAD].next
    }

    fn next(&self, entry: usize) -> usize {
        self.entries[entry].next
    }

    fn op(&self, entry: usize) -> usize {
        self.entries[entry].op
    }

    fn is_call(&self, entry: usize) -> bool {
        self.entries[entry].is_call
    }

    fn unlink(&mut self, entry: usize) {
        let (prev, next) = (self.entries[entry].prev, self.entries[entry].next);
        self.entries[prev].next = next;
        self.entries[next].prev = prev;
    }

    fn relink(&mut self, entry: usize) {
        let (prev, next) = (self.entries[entry].prev, self.entries[entry].next);
        self.entries[prev].next = entry;
        self.entries[next].prev = entry;
    }

    fn lift(&mut self, call: usize) {
        self.unlink(call);
        self.unlink(self.entries[call].matching);
    }

    fn unlift(&mut self, call: usize) {
        self.relink(self.entries[call].matching);
        self.relink(call);
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct BitSet(Vec<u64>);

impl BitSet {
    fn new(len: usize) -> Self {
        BitSet(vec![0; (len + 63) / 64])
    }

    fn insert(&mut self, bit: usize) {
        self.0[bit / 64] |= 1 << (bit % 64);
    }

    fn remove(&mut self, bit: usize) {
        self.0[bit / 64] &= !(1 << (bit % 64));
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::testing::sequential::{CollectionOp, QueueModel, StackModel};
    use crate::testing::time_stamped::TimeStamped;

    fn op(
        thread: usize,
        op: CollectionOp<u32>,
        ret: Option<u32>,
        invoked: usize,
        returned: usize,
    ) -> TimeStamped<CollectionOp<u32>, Option<u32>> {
        TimeStamped {
            thread,
            op,
            ret,
            invoked,
            returned,
        }
    }

    #[test]
    fn test_empty_history_is_linearizable() {
        let history: History<CollectionOp<u32>, Option<u32>> = History::new();
        assert!(history.check(&StackModel::<u32>::default()));
    }

    #[test]
    fn test_overlapping_pushes_may_reorder() {
        use crate::testing::sequential::CollectionOp::*;
        let mut history = History::new();
        // Both pushes overlap, then a pop sees 1 on top: 2 must go first.
        history.push(op(0, Push(1), None, 0, 3));
        history.push(op(1, Push(2), None, 1, 2));
        history.push(op(0, Pop, Some(1), 4, 5));
        assert!(history.check(&StackModel::<u32>::default()));
    }

    #[test]
    fn test_sequential_pushes_fix_the_order() {
        use crate::testing::sequential::CollectionOp::*;
        let mut history = History::new();
        history.push(op(0, Push(1), None, 0, 1));
        history.push(op(1, Push(2), None, 2, 3));
        history.push(op(0, Pop, Some(1), 4, 5));
        assert!(!history.check(&StackModel::<u32>::default()));
    }

    #[test]
    fn test_invented_value_is_rejected() {
        use crate::testing::sequential::CollectionOp::*;
        let mut history = History::new();
        history.push(op(0, Push(1), None, 0, 1));
        history.push(op(1, Pop, Some(7), 2, 3));
        assert!(!history.check(&QueueModel::<u32>::unbounded()));
    }

    #[test]
    fn test_pop_concurrent_with_push_may_see_empty() {
        use crate::testing::sequential::CollectionOp::*;
        let mut history = History::new();
        history.push(op(0, Push(5), None, 0, 3));
        history.push(op(1, Pop, None, 1, 2));
        history.push(op(1, Pop, Some(5), 4, 5));
        assert!(history.check(&QueueModel::<u32>::unbounded()));
    }

    #[test]
    fn test_owned_return_values_are_compared() {
        use crate::testing::sequential::CollectionOp::*;
        let stamp = |op, ret: Option<&str>, invoked, returned| TimeStamped {
            thread: 0,
            op,
            ret: ret.map(str::to_owned),
            invoked,
            returned,
        };
        let mut history = History::new();
        history.push(stamp(Push("a".to_owned()), None, 0, 1));
        history.push(stamp(Pop, Some("a"), 2, 3));
        assert!(history.check(&QueueModel::<String>::unbounded()));

        history.push(stamp(Pop, Some("a"), 4, 5));
        assert!(!history.check(&QueueModel::<String>::unbounded()));
    }
}
