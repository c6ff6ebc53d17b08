use crate::error::{FutureError, Outcome};
use crate::executor::Carrier;
use crate::registry::{self, Callback, CallbackRegistry};

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

lazy_static::lazy_static! {
  static ref NEXT_RESULT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

pub(crate) fn next_result_id() -> u64 {
  NEXT_RESULT_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

enum State<T> {
  Pending {
    carrier: Option<Box<dyn Carrier>>,
    callbacks: CallbackRegistry<T>,
  },
  Completed(Arc<Outcome<T>>),
}

/// Single owner of one result's terminal state and its pending callbacks.
///
/// Every transition and every callback registration goes through the one
/// `state` lock, so a callback is either queued before the transition drains
/// the registry or sees the stored outcome. Callbacks and carrier interrupts
/// always run after the lock is released.
pub(crate) struct Completer<T> {
  id: u64,
  state: Mutex<State<T>>,
}

impl<T: Send + Sync + 'static> Completer<T> {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self {
      id: next_result_id(),
      state: Mutex::new(State::Pending {
        carrier: None,
        callbacks: CallbackRegistry::new(),
      }),
    })
  }

  pub(crate) fn completed(outcome: Outcome<T>) -> Arc<Self> {
    Arc::new(Self {
      id: next_result_id(),
      state: Mutex::new(State::Completed(Arc::new(outcome))),
    })
  }

  pub(crate) fn id(&self) -> u64 {
    self.id
  }

  pub(crate) fn is_completed(&self) -> bool {
    matches!(&*self.state.lock(), State::Completed(_))
  }

  pub(crate) fn outcome(&self) -> Option<Arc<Outcome<T>>> {
    match &*self.state.lock() {
      State::Pending { .. } => None,
      State::Completed(outcome) => Some(outcome.clone()),
    }
  }

  /// Records the carrier running this result's work so cancellation can interrupt it.
  ///
  /// If the result was already cancelled while the work was being submitted,
  /// the carrier is interrupted right away.
  pub(crate) fn attach_carrier(&self, carrier: Box<dyn Carrier>) {
    let cancelled_early = {
      let mut state = self.state.lock();
      match &mut *state {
        State::Pending { carrier: slot, .. } => {
          *slot = Some(carrier);
          return;
        }
        State::Completed(outcome) => matches!(&**outcome, Err(FutureError::Cancelled)),
      }
    };
    if cancelled_early {
      debug!(result_id = %self.id, "Result cancelled during submission. Interrupting carrier.");
      carrier.interrupt();
    }
  }

  /// Moves `Pending` to `Completed(outcome)`. Returns `false` and discards
  /// `outcome` if the result was already completed.
  pub(crate) fn try_complete(&self, outcome: Outcome<T>) -> bool {
    match self.transition(outcome) {
      Some((outcome, _carrier, callbacks)) => {
        debug!(result_id = %self.id, ok = outcome.is_ok(), callbacks = callbacks.len(), "Result completed.");
        callbacks.drain(self.id, &outcome);
        true
      }
      None => {
        trace!(result_id = %self.id, "Completion discarded, result already terminal.");
        false
      }
    }
  }

  /// Completes the result as cancelled and interrupts its carrier. Returns
  /// `false` if the result was already terminal.
  pub(crate) fn request_cancel(&self) -> bool {
    match self.transition(Err(FutureError::Cancelled)) {
      Some((outcome, carrier, callbacks)) => {
        debug!(result_id = %self.id, callbacks = callbacks.len(), "Result cancelled.");
        if let Some(carrier) = carrier {
          carrier.interrupt();
        }
        callbacks.drain(self.id, &outcome);
        true
      }
      None => {
        trace!(result_id = %self.id, "Cancellation ignored, result already terminal.");
        false
      }
    }
  }

  /// Queues `callback` while pending; runs it immediately on this thread otherwise.
  pub(crate) fn register_callback(&self, callback: Callback<T>) {
    let outcome = {
      let mut state = self.state.lock();
      match &mut *state {
        State::Pending { callbacks, .. } => {
          callbacks.push(callback);
          return;
        }
        State::Completed(outcome) => outcome.clone(),
      }
    };
    registry::invoke(self.id, callback, &outcome);
  }

  #[allow(clippy::type_complexity)]
  fn transition(
    &self,
    outcome: Outcome<T>,
  ) -> Option<(Arc<Outcome<T>>, Option<Box<dyn Carrier>>, CallbackRegistry<T>)> {
    let mut state = self.state.lock();
    let State::Pending { carrier, callbacks } = &mut *state else {
      return None;
    };
    let carrier = carrier.take();
    let callbacks = mem::replace(callbacks, CallbackRegistry::new());
    let outcome = Arc::new(outcome);
    *state = State::Completed(outcome.clone());
    Some((outcome, carrier, callbacks))
  }
}

impl<T> fmt::Debug for Completer<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let status = match self.state.try_lock().as_deref() {
      Some(State::Pending { .. }) => "pending",
      Some(State::Completed(_)) => "completed",
      None => "locked",
    };
    f.debug_struct("Completer")
      .field("id", &self.id)
      .field("status", &status)
      .finish()
  }
}

/// Completes a result with the work's outcome, or with `Cancelled` if the
/// work is dropped before it produces one.
pub(crate) struct CompletionGuard<T: Send + Sync + 'static> {
  completer: Option<Arc<Completer<T>>>,
}

impl<T: Send + Sync + 'static> CompletionGuard<T> {
  pub(crate) fn new(completer: Arc<Completer<T>>) -> Self {
    Self {
      completer: Some(completer),
    }
  }

  pub(crate) fn complete(mut self, outcome: Outcome<T>) {
    if let Some(completer) = self.completer.take() {
      completer.try_complete(outcome);
    }
  }
}

impl<T: Send + Sync + 'static> Drop for CompletionGuard<T> {
  fn drop(&mut self) {
    if let Some(completer) = self.completer.take() {
      if completer.try_complete(Err(FutureError::Cancelled)) {
        debug!(result_id = %completer.id(), "Work dropped by its carrier before completing.");
      }
    }
  }
}
