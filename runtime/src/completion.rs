//! Completion cell - bridges callback-style completion into an awaitable.
//!
//! The engine signals milestones (module ready, dependency count reaching
//! zero, injection failures) by invoking plain callbacks. A
//! [`CompletionCell`] converts such a signal into something awaitable
//! exactly once: the write side (`fulfill`/`fail`) is synchronous,
//! non-blocking and idempotent, and exists from the moment of
//! construction; the read side suspends until the cell is written.

use std::pin::pin;
use std::sync::Mutex;

use tokio::sync::Notify;

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Failed(E),
}

/// A one-shot result cell with external fulfill/fail and async read.
///
/// The first write wins; later writes are no-ops. Payloads are `Clone` so
/// any number of waiters may observe the outcome.
pub struct CompletionCell<T, E> {
    state: Mutex<State<T, E>>,
    notify: Notify,
}

impl<T, E> CompletionCell<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Pending),
            notify: Notify::new(),
        }
    }

    /// Complete the cell with a value. Returns `false` if it was already
    /// completed.
    pub fn fulfill(&self, value: T) -> bool {
        self.complete(State::Fulfilled(value))
    }

    /// Complete the cell with an error. Returns `false` if it was already
    /// completed.
    pub fn fail(&self, error: E) -> bool {
        self.complete(State::Failed(error))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(
            *self.state.lock().expect("completion cell lock poisoned"),
            State::Pending
        )
    }

    fn complete(&self, outcome: State<T, E>) -> bool {
        {
            let mut state = self.state.lock().expect("completion cell lock poisoned");
            if !matches!(*state, State::Pending) {
                return false;
            }
            *state = outcome;
        }
        self.notify.notify_waiters();
        true
    }
}

impl<T: Clone, E: Clone> CompletionCell<T, E> {
    /// Suspend until the cell is completed and return the outcome.
    pub async fn wait(&self) -> Result<T, E> {
        loop {
            // Register as a waiter before inspecting state, otherwise a
            // write between the check and the await would be lost.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let state = self.state.lock().expect("completion cell lock poisoned");
                match &*state {
                    State::Pending => {}
                    State::Fulfilled(value) => return Ok(value.clone()),
                    State::Failed(error) => return Err(error.clone()),
                }
            }
            notified.await;
        }
    }
}

impl<T, E> Default for CompletionCell<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
