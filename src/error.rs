//! Errors carried by futures and returned when awaiting them.
use std::any::Any;
use thiserror::Error;

/// Opaque error descriptor passed through futures unmodified.
///
/// Producers reject with one of these; the core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{domain} ({code}): {message}")]
pub struct ErrorInfo {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl ErrorInfo {
    /// Domain used for panics caught inside combinator functions.
    pub const PANIC_DOMAIN: &'static str = "promise_future.panic";

    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        ErrorInfo {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// Builds the descriptor for a panic payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        ErrorInfo::new(Self::PANIC_DOMAIN, 0, message)
    }

    pub fn is_panic(&self) -> bool {
        self.domain == Self::PANIC_DOMAIN
    }
}

/// Non-success outcome of awaiting a [`Future`](crate::Future).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Failed(#[from] ErrorInfo),
    #[error("future was cancelled")]
    Cancelled,
}
