use super::automaton::History;
use super::sequential::SequentialModel;
use super::time_stamped::{Clock, ThreadLog, TimeStamped};
use crate::error::Result;
use parking_lot::Mutex;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

/// Outcome of a linearizability run. A failure carries the offending history.
#[derive(Debug)]
pub enum LinearizabilityResult<Op, Ret> {
    Success,
    Failure(History<Op, Ret>),
}

impl<Op, Ret> LinearizabilityResult<Op, Ret> {
    pub fn is_success(&self) -> bool {
        match self {
            LinearizabilityResult::Success => true,
            LinearizabilityResult::Failure(_) => false,
        }
    }
}

/// Drives a concurrent structure from several threads, records what each
/// operation returned, and checks the history against a sequential model.
#[derive(Debug)]
pub struct LinearizabilityTester<S> {
    model: S,
    num_threads: usize,
    ops_per_thread: usize,
}

impl<S> LinearizabilityTester<S>
where
    S: SequentialModel + Sync,
    S::Op: Send,
    S::Ret: Send,
{
    pub fn new(model: S, num_threads: usize, ops_per_thread: usize) -> Self {
        LinearizabilityTester {
            model,
            num_threads,
            ops_per_thread,
        }
    }

    /// Calls `worker` `ops_per_thread` times on each of `num_threads` pool
    /// threads. Each call should perform one operation on `concurrent` through
    /// `ThreadLog::log`.
    pub fn run<C, W>(&self, concurrent: &C, worker: W) -> Result<LinearizabilityResult<S::Op, S::Ret>>
    where
        C: Sync,
        W: Fn(&C, &mut ThreadLog<'_, S::Op, S::Ret>) + Sync,
    {
        let pool = ThreadPoolBuilder::new().num_threads(self.num_threads).build()?;
        let clock = Clock::new();
        let logs: Mutex<Vec<Vec<TimeStamped<S::Op, S::Ret>>>> =
            Mutex::new(Vec::with_capacity(self.num_threads));

        pool.scope(|scope| {
            for id in 0..self.num_threads {
                let (clock, logs, worker) = (&clock, &logs, &worker);
                let ops_per_thread = self.ops_per_thread;
                scope.spawn(move |_| {
                    let mut log = ThreadLog::new(id, clock);
                    for _ in 0..ops_per_thread {
                        worker(concurrent, &mut log);
                    }
                    logs.lock().push(log.into_events());
                });
            }
        });

        let history = History::from_events(logs.into_inner().into_iter().flatten());
        if history.check(&self.model) {
            info!(operations = history.len(), threads = self.num_threads, "history is linearizable");
            Ok(LinearizabilityResult::Success)
        } else {
            warn!(operations = history.len(), threads = self.num_threads, "history is not linearizable");
            Ok(LinearizabilityResult::Failure(history))
        }
    }
}
