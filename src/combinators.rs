//! Constructors that derive new futures from existing ones.
//!
//! None of these spawn anything. User functions run on the context passed in;
//! everything else (mirroring an inner future, propagating an error or a
//! cancellation, fanning results in) happens on whichever thread completed
//! the input, before that completion returns. Those steps are queued and run
//! one after another rather than nested, so chains of any length are safe.
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    future::{inline, into_dyn},
    registry::{CallbackKind, DynContext},
    ErrorInfo, ExecutionContext, Future, FutureState, MutableFuture, Outcome, Promise,
};

/// A future already completed with `value`.
pub fn of_value<T: Send + 'static>(value: T) -> Future<T> {
    Future::with_outcome(Outcome::Result(value))
}

/// A future already completed with `error`.
pub fn of_error<T: Send + 'static>(error: ErrorInfo) -> Future<T> {
    Future::with_outcome(Outcome::Error(error))
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Continues with `f` on every terminal state but cancellation, which is
    /// passed straight to the returned future without calling `f`. The result
    /// mirrors whatever future `f` returns.
    ///
    /// Cancelling the returned future does not cancel `self`.
    pub fn chain<U, C, F>(&self, context: &C, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(Future<T>) -> Future<U> + Send + 'static,
    {
        let out = MutableFuture::new();
        let result = out.future();
        let context = into_dyn(context);
        self.subscribe(
            inline(),
            CallbackKind::Completion,
            Box::new(move |input: Future<T>| {
                if input.state() == FutureState::CompletedWithCancellation {
                    out.cancel();
                    return;
                }
                run_continuation(&context, out, move || f(input));
            }),
        );
        result
    }

    /// Flat-maps a successful value through `f`. Errors and cancellation pass
    /// through untouched and `f` never runs.
    pub fn fmap<U, C, F>(&self, context: &C, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        self.on_success(into_dyn(context), f)
    }

    /// Maps a successful value through `f`.
    ///
    /// ```
    /// use promise_future::{of_value, Inline};
    ///
    /// let four = of_value(3).map(&Inline, |x| x + 1);
    /// assert_eq!(four.result(), Some(4));
    /// ```
    pub fn map<U, C, F>(&self, context: &C, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.on_success(into_dyn(context), move |value| of_value(f(value)))
    }

    /// Like [`map`](Self::map), but `f` may fail with an error of its own.
    pub fn try_map<U, C, F>(&self, context: &C, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        C: ExecutionContext + Clone + 'static,
        F: FnOnce(T) -> Result<U, ErrorInfo> + Send + 'static,
    {
        self.on_success(into_dyn(context), move |value| Future::from_result(f(value)))
    }

    fn on_success<U, F>(&self, context: DynContext, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        let out = MutableFuture::new();
        let result = out.future();
        self.subscribe(
            inline(),
            CallbackKind::Completion,
            Box::new(move |input: Future<T>| match input.outcome() {
                Some(Outcome::Result(value)) => run_continuation(&context, out, move || f(value)),
                Some(Outcome::Error(error)) => {
                    out.reject(error);
                }
                Some(Outcome::Cancelled) => {
                    out.cancel();
                }
                None => {}
            }),
        );
        result
    }

    /// Completes `target` with this future's outcome once there is one.
    pub(crate) fn mirror_into(&self, target: MutableFuture<T>) {
        self.subscribe(
            inline(),
            CallbackKind::Completion,
            Box::new(move |input: Future<T>| {
                if let Some(outcome) = input.outcome() {
                    target.complete(outcome);
                }
            }),
        );
    }
}

/// Schedules `body` on `context` and mirrors the future it returns into `out`.
/// A panic inside `body` becomes `out`'s error.
fn run_continuation<U, B>(context: &DynContext, out: MutableFuture<U>, body: B)
where
    U: Clone + Send + 'static,
    B: FnOnce() -> Future<U> + Send + 'static,
{
    context.execute(Box::new(move || {
        if out.has_completed() {
            trace!(state = %out.state(), "downstream already finished, skipping continuation");
            return;
        }
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(inner) => inner.mirror_into(out),
            Err(payload) => {
                let error = ErrorInfo::from_panic(payload);
                debug!(message = %error.message, "continuation panicked");
                out.reject(error);
            }
        }
    }));
}

struct Slots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Collects every input's value, in input order.
///
/// The first error rejects the result and the first cancellation cancels it.
/// Inputs still running at that point are left alone, and their values are
/// discarded. No inputs means an immediately resolved empty vector.
///
/// ```
/// use promise_future::{all, of_value};
///
/// let letters = all(vec![of_value("a"), of_value("b"), of_value("c")]);
/// assert_eq!(letters.result(), Some(vec!["a", "b", "c"]));
/// ```
pub fn all<T, I>(futures: I) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    if futures.is_empty() {
        return of_value(Vec::new());
    }
    let out = MutableFuture::new();
    let slots = Arc::new(Mutex::new(Slots {
        values: vec![None; futures.len()],
        remaining: futures.len(),
    }));
    for (index, input) in futures.iter().enumerate() {
        let out = out.clone();
        let slots = slots.clone();
        input.subscribe(
            inline(),
            CallbackKind::Completion,
            Box::new(move |input: Future<T>| match input.outcome() {
                Some(Outcome::Result(value)) => {
                    if out.has_completed() {
                        return;
                    }
                    let values = {
                        let mut slots = slots.lock();
                        slots.values[index] = Some(value);
                        slots.remaining -= 1;
                        if slots.remaining == 0 {
                            Some(std::mem::take(&mut slots.values))
                        } else {
                            None
                        }
                    };
                    if let Some(values) = values {
                        out.resolve(values.into_iter().flatten().collect());
                    }
                }
                Some(Outcome::Error(error)) => {
                    debug!(index, %error, "input of all() failed");
                    out.reject(error);
                }
                Some(Outcome::Cancelled) => {
                    debug!(index, "input of all() cancelled");
                    out.cancel();
                }
                None => {}
            }),
        );
    }
    out.future()
}

/// Mirrors whichever input finishes first, in any terminal state, and
/// cancels the rest. No inputs means an already cancelled future.
///
/// The inputs are also cancelled if the returned future itself is cancelled
/// before any of them finish.
pub fn race<T, I>(futures: I) -> Future<T>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<Future<T>> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::cancelled();
    }
    let out = MutableFuture::new();
    for (index, input) in futures.iter().enumerate() {
        let out = out.clone();
        input.subscribe(
            inline(),
            CallbackKind::Completion,
            Box::new(move |input: Future<T>| {
                if let Some(outcome) = input.outcome() {
                    let state = outcome.state();
                    if out.complete(outcome) {
                        debug!(index, %state, "race won");
                    }
                }
            }),
        );
    }
    out.subscribe(
        inline(),
        CallbackKind::Completion,
        Box::new(move |_| {
            for loser in futures {
                loser.cancel();
            }
        }),
    );
    out.future()
}
