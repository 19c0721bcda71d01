//! Pending handlers and wakers attached to a future.
use std::{sync::Arc, task::Waker};

use tracing::trace;

use crate::{ExecutionContext, Future, FutureState};

pub(crate) type DynContext = Arc<dyn ExecutionContext>;
pub(crate) type Handler<T> = Box<dyn FnOnce(Future<T>) + Send + 'static>;

/// Which terminal states a handler cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackKind {
    Completion,
    Cancellation,
}

impl CallbackKind {
    pub(crate) fn matches(self, state: FutureState) -> bool {
        match self {
            CallbackKind::Completion => state.is_terminal(),
            CallbackKind::Cancellation => state == FutureState::CompletedWithCancellation,
        }
    }
}

pub(crate) struct Callback<T> {
    context: DynContext,
    handler: Handler<T>,
    kind: CallbackKind,
}

impl<T: Send + 'static> Callback<T> {
    pub(crate) fn new(context: DynContext, kind: CallbackKind, handler: Handler<T>) -> Self {
        Callback {
            context,
            handler,
            kind,
        }
    }

    /// Hands the handler to its context if `future`'s terminal state matches.
    /// A non-matching handler is dropped here, never run.
    pub(crate) fn fire(self, future: &Future<T>) {
        if !self.kind.matches(future.state()) {
            return;
        }
        trace!(kind = ?self.kind, "scheduling handler");
        let handler = self.handler;
        let future = future.clone();
        self.context.execute(Box::new(move || handler(future)));
    }
}

/// What became of a registration.
pub(crate) enum Registration<T> {
    /// The future is still running; the callback waits in the registry.
    Stored,
    /// The future already finished; the caller must fire the callback once the
    /// lock is released.
    Ready(Callback<T>),
}

/// Insertion-ordered callbacks plus the wakers of tasks awaiting the future.
///
/// Lives under the same lock as the future's state cell. While the completing
/// thread is still handing out callbacks (`firing`), late registrations queue
/// behind them instead of overtaking them.
pub(crate) struct Registry<T> {
    callbacks: Vec<Callback<T>>,
    wakers: Vec<Waker>,
    firing: bool,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Registry {
            callbacks: Vec::new(),
            wakers: Vec::new(),
            firing: false,
        }
    }

    pub(crate) fn register(&mut self, state: FutureState, callback: Callback<T>) -> Registration<T> {
        if state.is_terminal() && !self.firing {
            Registration::Ready(callback)
        } else {
            self.callbacks.push(callback);
            Registration::Stored
        }
    }

    pub(crate) fn register_waker(&mut self, waker: &Waker) {
        if !self.wakers.iter().any(|w| w.will_wake(waker)) {
            self.wakers.push(waker.clone());
        }
    }

    /// Empties the registry at transition time and starts the firing pass.
    /// Callbacks come back in registration order, including non-matching
    /// ones, so that they are dropped outside the lock.
    pub(crate) fn drain(&mut self) -> (Vec<Callback<T>>, Vec<Waker>) {
        self.firing = true;
        (
            std::mem::take(&mut self.callbacks),
            std::mem::take(&mut self.wakers),
        )
    }

    /// Hands out callbacks registered since the last batch, or ends the
    /// firing pass when there are none.
    pub(crate) fn next_batch(&mut self) -> Option<Vec<Callback<T>>> {
        if self.callbacks.is_empty() {
            self.firing = false;
            None
        } else {
            Some(std::mem::take(&mut self.callbacks))
        }
    }
}
