//! Lifecycle state of a future and the cell guarding its single transition.
use std::fmt;

use crate::{Error, ErrorInfo};

/// Where a future is in its lifecycle. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureState {
    Running,
    CompletedWithResult,
    CompletedWithError,
    CompletedWithCancellation,
}

impl FutureState {
    /// Tag used when logging a state.
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureState::Running => "Running",
            FutureState::CompletedWithResult => "CompletedWithResult",
            FutureState::CompletedWithError => "CompletedWithError",
            FutureState::CompletedWithCancellation => "CompletedWithCancellation",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, FutureState::Running)
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Result(T),
    Error(ErrorInfo),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn state(&self) -> FutureState {
        match self {
            Outcome::Result(_) => FutureState::CompletedWithResult,
            Outcome::Error(_) => FutureState::CompletedWithError,
            Outcome::Cancelled => FutureState::CompletedWithCancellation,
        }
    }

    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(error) => Err(Error::Failed(error)),
            Outcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

impl<T> From<Result<T, ErrorInfo>> for Outcome<T> {
    fn from(result: Result<T, ErrorInfo>) -> Self {
        match result {
            Ok(value) => Outcome::Result(value),
            Err(error) => Outcome::Error(error),
        }
    }
}

/// Holds the outcome once set. Callers serialize access through the owning
/// future's lock, which gives `load` acquire semantics against `try_transition`.
#[derive(Debug)]
pub(crate) struct StateCell<T> {
    outcome: Option<Outcome<T>>,
}

impl<T> StateCell<T> {
    pub(crate) fn new() -> Self {
        StateCell { outcome: None }
    }

    pub(crate) fn completed(outcome: Outcome<T>) -> Self {
        StateCell {
            outcome: Some(outcome),
        }
    }

    /// Publishes `outcome` if the cell is still running. A rejected attempt
    /// leaves the cell untouched and drops `outcome`.
    pub(crate) fn try_transition(&mut self, outcome: Outcome<T>) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub(crate) fn load(&self) -> Option<&Outcome<T>> {
        self.outcome.as_ref()
    }

    pub(crate) fn state(&self) -> FutureState {
        self.outcome
            .as_ref()
            .map_or(FutureState::Running, Outcome::state)
    }
}
