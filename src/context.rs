//! Execution contexts: the places handlers run.
//!
//! The core never spawns threads of its own. Every handler is handed to an
//! [`ExecutionContext`] chosen by whoever registered it. Three contexts ship
//! with the crate:
//!
//! - [`Inline`] runs the job right away on the enqueuing thread.
//! - [`ManualQueue`] holds jobs until its owner steps it, for deterministic tests.
//! - [`SerialQueue`] drains jobs in order on a dedicated worker thread.
//!
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt, io,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::ErrorInfo;

/// A unit of work handed to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run a closure asynchronously, preserving enqueue order
/// when it is serial.
pub trait ExecutionContext: Send + Sync {
    fn execute(&self, job: Job);
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn execute(&self, job: Job) {
        (**self).execute(job)
    }
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl ExecutionContext for Inline {
    fn execute(&self, job: Job) {
        job()
    }
}

thread_local! {
    static PROPAGATION: RefCell<Option<VecDeque<Job>>> = const { RefCell::new(None) };
}

/// Runs jobs on the calling thread without nesting them.
///
/// The outermost `execute` on a thread runs its job and then drains, in FIFO
/// order, every job enqueued meanwhile on that thread. Nested calls only
/// enqueue. Propagation down a chain of any length therefore uses constant
/// stack, and all of it has happened by the time the outermost call returns.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Trampoline;

impl ExecutionContext for Trampoline {
    fn execute(&self, job: Job) {
        let job = PROPAGATION.with(|pending| match pending.borrow_mut().as_mut() {
            Some(queue) => {
                queue.push_back(job);
                None
            }
            None => Some(job),
        });
        let Some(job) = job else {
            return;
        };
        PROPAGATION.with(|pending| *pending.borrow_mut() = Some(VecDeque::new()));
        run_isolated("propagation", job);
        while let Some(next) =
            PROPAGATION.with(|pending| pending.borrow_mut().as_mut().and_then(VecDeque::pop_front))
        {
            run_isolated("propagation", next);
        }
        PROPAGATION.with(|pending| *pending.borrow_mut() = None);
    }
}

/// Runs `job`, logging a panic instead of letting it unwind into the caller.
pub(crate) fn run_isolated<F: FnOnce()>(label: &str, job: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        let error = ErrorInfo::from_panic(payload);
        warn!(queue = label, message = %error.message, "job panicked");
    }
}

/// A FIFO of jobs that only run when the owner asks.
///
/// # Examples
///
/// ```
/// use promise_future::{of_value, ManualQueue};
///
/// let queue = ManualQueue::new();
/// let mapped = of_value(3).map(&queue, |x| x + 1);
/// assert!(!mapped.has_completed());
/// queue.run_until_idle();
/// assert_eq!(mapped.result(), Some(4));
/// ```
#[derive(Clone, Default)]
pub struct ManualQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Runs the oldest job, if any. Returns `false` when the queue was empty.
    pub fn run_next(&self) -> bool {
        // Pop under the lock, run outside it: jobs may enqueue more jobs.
        let job = self.jobs.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until none are left, including jobs enqueued along the way.
    /// Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl ExecutionContext for ManualQueue {
    fn execute(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Settings for spawning a [`SerialQueue`].
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    name: Option<String>,
    capacity: usize,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names the worker thread.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Bounds the job channel. `0`, the default, means unbounded.
    ///
    /// With a bound, `execute` blocks while the queue is full, so a job must
    /// not enqueue onto its own full queue.
    #[inline]
    pub fn capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Spawns the worker thread.
    pub fn spawn(self) -> io::Result<SerialQueue> {
        let (sender, receiver) = if self.capacity == 0 {
            crossbeam_channel::unbounded()
        } else {
            crossbeam_channel::bounded(self.capacity)
        };
        let mut builder = thread::Builder::new();
        if let Some(name) = self.name.clone() {
            builder = builder.name(name);
        }
        let label = self.name.clone().unwrap_or_else(|| "<unnamed>".to_owned());
        builder.spawn(move || drain(&label, receiver))?;
        Ok(SerialQueue {
            inner: Arc::new(SerialInner {
                sender,
                name: self.name,
            }),
        })
    }
}

fn drain(label: &str, receiver: Receiver<Job>) {
    debug!(queue = label, "serial queue starting");
    for job in receiver {
        run_isolated(label, job);
    }
    debug!(queue = label, "serial queue exiting");
}

/// Runs jobs one at a time, in enqueue order, on a worker thread.
///
/// Handles are cheap to clone. The worker exits once every handle is dropped
/// and the queued jobs have run; it is never joined.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<SerialInner>,
}

struct SerialInner {
    sender: Sender<Job>,
    name: Option<String>,
}

impl SerialQueue {
    /// Spawns an unbounded queue whose worker thread is called `name`.
    pub fn new(name: impl Into<String>) -> io::Result<Self> {
        QueueConfig::new().name(name).spawn()
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }
}

impl ExecutionContext for SerialQueue {
    fn execute(&self, job: Job) {
        if self.inner.sender.send(job).is_err() {
            // The worker catches panics, so this only happens if it could not
            // keep its receiver; nothing can run the job any more.
            warn!(queue = ?self.inner.name, "serial queue worker is gone, dropping job");
        } else {
            trace!(queue = ?self.inner.name, "job enqueued");
        }
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("name", &self.inner.name)
            .field("queued", &self.inner.sender.len())
            .finish()
    }
}
