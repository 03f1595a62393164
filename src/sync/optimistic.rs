//! Optimistic mutation results

use std::fmt;

/// Undo handle for a local cache change.
///
/// Running it restores the cache entries touched by one mutation to their
/// pre-mutation state. It never touches the remote store. Dropping it
/// without running it keeps the change.
pub struct Rollback(Option<Box<dyn FnOnce() + Send>>);

impl Rollback {
    pub fn new(undo: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(undo)))
    }

    /// A rollback with nothing to undo
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn run(mut self) {
        if let Some(undo) = self.0.take() {
            undo();
        }
    }
}

impl fmt::Debug for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rollback")
            .field(&if self.0.is_some() { "pending" } else { "noop" })
            .finish()
    }
}

/// The outcome of an acknowledged write plus the rollback for its local
/// cache change.
#[derive(Debug)]
pub struct Optimistic<T> {
    value: T,
    rollback: Rollback,
}

impl<T> Optimistic<T> {
    pub fn new(value: T, rollback: Rollback) -> Self {
        Self { value, rollback }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Keep the local change and take the outcome
    pub fn into_value(self) -> T {
        self.value
    }

    /// Undo the local change and take the outcome
    pub fn rollback(self) -> T {
        self.rollback.run();
        self.value
    }

    pub fn into_parts(self) -> (T, Rollback) {
        (self.value, self.rollback)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Optimistic<U> {
        Optimistic {
            value: f(self.value),
            rollback: self.rollback,
        }
    }
}
