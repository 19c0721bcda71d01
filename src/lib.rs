//! Single-assignment futures that complete once, with a value, an error or a
//! cancellation, and notify handlers on execution contexts chosen by the
//! caller.
//!
//! A producer creates a [`MutableFuture`], hands [`Future`] readers to its
//! consumers and later resolves, rejects or cancels it. Consumers either read
//! the outcome, register handlers, await it, or compose it with [`all`],
//! [`race`] and the `chain`/`fmap`/`map` methods.
//!
//! ```
//! use promise_future::{race, MutableFuture, Promise, FutureState};
//!
//! let a = MutableFuture::new();
//! let b = MutableFuture::new();
//! let winner = race([a.future(), b.future()]);
//! a.resolve(1);
//! assert_eq!(winner.result(), Some(1));
//! assert_eq!(b.state(), FutureState::CompletedWithCancellation);
//! ```

pub mod combinators;
pub mod context;
pub mod error;
pub mod future;
pub mod mutable;
pub mod state;

mod registry;

pub use combinators::{all, of_error, of_value, race};
pub use context::{ExecutionContext, Inline, Job, ManualQueue, QueueConfig, SerialQueue};
pub use error::{Error, ErrorInfo};
pub use future::Future;
pub use mutable::MutableFuture;
pub use state::{FutureState, Outcome};

/// The producer capability of a future.
///
/// Only the holder of a `Promise` decides how the future ends. Repeated
/// calls after the first transition are silently ignored.
pub trait Promise {
    type Output;
    type Waiter;

    /// Creates a producer together with a reader of the same future.
    fn pair() -> (Self, Self::Waiter)
    where
        Self: Sized;

    fn resolve(&self, value: Self::Output) -> &Self;

    fn reject(&self, error: ErrorInfo) -> &Self;
}
