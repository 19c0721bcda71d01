//! The reader side of a future: state queries, notification and cancellation.
//!
//! A [`Future`] is a cheap handle onto a shared core. The core holds the
//! outcome and the pending handlers behind one lock. Many handles may exist;
//! all of them observe the same single transition out of `Running`.
//!
//! Awaiting a `Future` yields `Result<T, Error>`:
//!
//! ```
//! use promise_future::{MutableFuture, Promise};
//! use futures::executor::block_on;
//! use std::thread;
//!
//! let producer = MutableFuture::<String>::new();
//! let consumer = producer.future();
//! let task = thread::spawn(move || block_on(async {
//!     println!("Received {:?}", consumer.await);
//! }));
//! producer.resolve("Hi".into());
//! task.join().expect("The task thread has panicked.");
//! ```
use std::{
    fmt,
    future::Future as StdFuture,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    context::{run_isolated, Trampoline},
    registry::{Callback, CallbackKind, DynContext, Handler, Registration, Registry},
    state::StateCell,
    Error, ErrorInfo, ExecutionContext, FutureState, Outcome,
};

/// A single-assignment cell holding the eventual outcome of an operation.
pub struct Future<T> {
    core: Arc<Mutex<Core<T>>>,
}

struct Core<T> {
    cell: StateCell<T>,
    registry: Registry<T>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            core: self.core.clone(),
        }
    }
}

pub(crate) fn into_dyn<C: ExecutionContext + Clone + 'static>(context: &C) -> DynContext {
    Arc::new(context.clone())
}

/// Context for the crate's own propagation steps.
pub(crate) fn inline() -> DynContext {
    Arc::new(Trampoline)
}

impl<T> Future<T> {
    fn from_cell(cell: StateCell<T>) -> Self {
        Future {
            core: Arc::new(Mutex::new(Core {
                cell,
                registry: Registry::new(),
            })),
        }
    }

    pub(crate) fn running() -> Self {
        Self::from_cell(StateCell::new())
    }

    pub(crate) fn with_outcome(outcome: Outcome<T>) -> Self {
        Self::from_cell(StateCell::completed(outcome))
    }

    pub fn state(&self) -> FutureState {
        self.core.lock().cell.state()
    }

    pub fn has_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// The error, present only in `CompletedWithError`.
    pub fn error(&self) -> Option<ErrorInfo> {
        match self.core.lock().cell.load() {
            Some(Outcome::Error(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Whether both handles refer to the same future.
    pub fn ptr_eq(&self, other: &Future<T>) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl<T: Clone> Future<T> {
    /// The value, present only in `CompletedWithResult`.
    pub fn result(&self) -> Option<T> {
        match self.core.lock().cell.load() {
            Some(Outcome::Result(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The terminal outcome, or `None` while running.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.core.lock().cell.load().cloned()
    }
}

impl<T: Send + 'static> Future<T> {
    /// A future that is already cancelled.
    pub fn cancelled() -> Self {
        Self::with_outcome(Outcome::Cancelled)
    }

    pub fn from_result(result: Result<T, ErrorInfo>) -> Self {
        Self::with_outcome(result.into())
    }

    /// Moves a running future to `CompletedWithCancellation`. No-op once terminal.
    pub fn cancel(&self) -> &Self {
        self.complete(Outcome::Cancelled);
        self
    }

    /// Runs `handler` on `context` once the future reaches any terminal state,
    /// cancellation included. Registering on a finished future schedules the
    /// handler right away.
    pub fn on_completion<C, F>(&self, context: &C, handler: F) -> &Self
    where
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(Future<T>) + Send + 'static,
    {
        self.subscribe(into_dyn(context), CallbackKind::Completion, Box::new(handler));
        self
    }

    /// Runs `handler` on `context` only if the future ends up cancelled.
    pub fn on_cancellation<C, F>(&self, context: &C, handler: F) -> &Self
    where
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(Future<T>) + Send + 'static,
    {
        self.subscribe(into_dyn(context), CallbackKind::Cancellation, Box::new(handler));
        self
    }

    pub(crate) fn subscribe(&self, context: DynContext, kind: CallbackKind, handler: Handler<T>) {
        let callback = Callback::new(context, kind, handler);
        let registration = {
            let mut core = self.core.lock();
            let state = core.cell.state();
            core.registry.register(state, callback)
        };
        if let Registration::Ready(callback) = registration {
            run_isolated("handler", || callback.fire(self));
        }
    }

    /// Attempts the one transition out of `Running`. Handlers and wakers are
    /// released after the lock is dropped, so they may re-enter this future.
    /// A handler that panics on an inline context is logged and skipped; the
    /// rest still fire.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        let state = outcome.state();
        let (mut callbacks, wakers) = {
            let mut core = self.core.lock();
            if !core.cell.try_transition(outcome) {
                trace!(attempted = %state, current = %core.cell.state(), "ignoring repeated transition");
                return false;
            }
            core.registry.drain()
        };
        trace!(state = %state, handlers = callbacks.len(), wakers = wakers.len(), "future completed");
        loop {
            for callback in callbacks {
                run_isolated("handler", || callback.fire(self));
            }
            let next = self.core.lock().registry.next_batch();
            match next {
                Some(batch) => callbacks = batch,
                None => break,
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T: Clone> StdFuture for Future<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        match core.cell.load() {
            Some(outcome) => Poll::Ready(outcome.clone().into_result()),
            None => {
                core.registry.register_waker(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("state", &self.state())
            .finish()
    }
}
