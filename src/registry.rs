use crate::error::Outcome;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

/// A completion callback. Receives the terminal outcome exactly once.
pub(crate) type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

/// Callbacks waiting for a pending result, in registration order.
pub(crate) struct CallbackRegistry<T> {
  callbacks: Vec<Callback<T>>,
}

impl<T> CallbackRegistry<T> {
  pub(crate) fn new() -> Self {
    Self { callbacks: Vec::new() }
  }

  pub(crate) fn push(&mut self, callback: Callback<T>) {
    self.callbacks.push(callback);
  }

  pub(crate) fn len(&self) -> usize {
    self.callbacks.len()
  }

  /// Invokes every queued callback with `outcome`, consuming the registry.
  pub(crate) fn drain(self, result_id: u64, outcome: &Outcome<T>) {
    for callback in self.callbacks {
      invoke(result_id, callback, outcome);
    }
  }
}

impl<T> fmt::Debug for CallbackRegistry<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CallbackRegistry")
      .field("pending_callbacks", &self.callbacks.len())
      .finish()
  }
}

/// Runs one callback, containing any panic it raises.
pub(crate) fn invoke<T>(result_id: u64, callback: Callback<T>, outcome: &Outcome<T>) {
  let result = catch_unwind(AssertUnwindSafe(|| callback(outcome)));
  if result.is_err() {
    error!(%result_id, "A completion callback panicked during execution.");
  }
}
