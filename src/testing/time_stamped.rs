use std::sync::atomic::{AtomicUsize, Ordering};

/// Logical clock shared by every thread taking part in a run.
///
/// Ticks are totally ordered, so an operation whose response tick is lower
/// than another's invocation tick really did finish first.
#[derive(Debug, Default)]
pub struct Clock(AtomicUsize);

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// One completed operation with the ticks of its invocation and response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeStamped<Op, Ret> {
    pub thread: usize,
    pub op: Op,
    pub ret: Ret,
    pub invoked: usize,
    pub returned: usize,
}

/// Per-thread record of the operations a worker performed.
#[derive(Debug)]
pub struct ThreadLog<'a, Op, Ret> {
    id: usize,
    clock: &'a Clock,
    events: Vec<TimeStamped<Op, Ret>>,
}

impl<'a, Op, Ret: Clone> ThreadLog<'a, Op, Ret> {
    pub fn new(id: usize, clock: &'a Clock) -> Self {
        ThreadLog {
            id,
            clock,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs `concurrent` against the structure under test and records it as `op`.
    pub fn log<F>(&mut self, op: Op, concurrent: F) -> Ret
    where
        F: FnOnce() -> Ret,
    {
        let invoked = self.clock.tick();
        let ret = concurrent();
        let returned = self.clock.tick();
        self.events.push(TimeStamped {
            thread: self.id,
            op,
            ret: ret.clone(),
            invoked,
            returned,
        });
        ret
    }

    pub fn into_events(self) -> Vec<TimeStamped<Op, Ret>> {
        self.events
    }
}
