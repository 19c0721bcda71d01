use std::fmt;
use std::ops::Deref;

use crate::{ErrorInfo, Future, Outcome, Promise};

/// The producer side of a future: whoever holds it decides the outcome.
///
/// Derefs to [`Future`], so it can be read, cancelled and composed like any
/// other future. Hand [`MutableFuture::future`] to consumers that must not
/// resolve it.
///
/// # Examples
///
/// ```
/// use promise_future::{MutableFuture, Promise, FutureState};
///
/// let op = MutableFuture::new();
/// op.resolve(String::from("🍓")).resolve(String::from("ignored"));
/// assert_eq!(op.result().as_deref(), Some("🍓"));
/// assert_eq!(op.state(), FutureState::CompletedWithResult);
/// ```
pub struct MutableFuture<T> {
    future: Future<T>,
}

impl<T: Send + 'static> MutableFuture<T> {
    pub fn new() -> Self {
        MutableFuture {
            future: Future::running(),
        }
    }

    /// A reader handle onto the same future.
    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }
}

impl<T: Send + 'static> Default for MutableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MutableFuture<T> {
    fn clone(&self) -> Self {
        MutableFuture {
            future: self.future.clone(),
        }
    }
}

impl<T> Deref for MutableFuture<T> {
    type Target = Future<T>;

    fn deref(&self) -> &Future<T> {
        &self.future
    }
}

impl<T> From<MutableFuture<T>> for Future<T> {
    fn from(producer: MutableFuture<T>) -> Self {
        producer.future
    }
}

impl<T: Send + 'static> Promise for MutableFuture<T> {
    type Output = T;
    type Waiter = Future<T>;

    fn pair() -> (Self, Future<T>) {
        let producer = Self::new();
        let consumer = producer.future();
        (producer, consumer)
    }

    fn resolve(&self, value: T) -> &Self {
        self.future.complete(Outcome::Result(value));
        self
    }

    fn reject(&self, error: ErrorInfo) -> &Self {
        self.future.complete(Outcome::Error(error));
        self
    }
}

impl<T> fmt::Debug for MutableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableFuture").field(&self.future).finish()
    }
}
