use crate::completer::{Completer, CompletionGuard};
use crate::error::{BoxError, FutureError, Outcome};
use crate::executor::Executor;
use crate::task::{Work, WorkBody};

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{error, warn};

/// A shared, read-only view of an eventual [`Outcome`].
///
/// Cloning a handle is cheap; all clones observe the same result. None of the
/// methods block the calling thread.
pub struct ResultHandle<T> {
  pub(crate) completer: Arc<Completer<T>>,
}

impl<T: Send + Sync + 'static> ResultHandle<T> {
  /// Submits `work` to `executor` and returns the handle of its result.
  ///
  /// An `Err` returned by the work, or a panic raised while it runs, becomes a
  /// failed outcome. If the executor rejects the work the result completes
  /// with [`FutureError::Rejected`]. If the executor drops the work before it
  /// finishes the result completes with [`FutureError::Cancelled`].
  pub fn spawn<E, F>(executor: &E, work: F) -> Self
  where
    E: Executor + ?Sized,
    F: Future<Output = Result<T, BoxError>> + Send + 'static,
  {
    let completer: Arc<Completer<T>> = Completer::new();
    let result_id = completer.id();
    let guard = CompletionGuard::new(completer.clone());

    let future = async move {
      let caught = AssertUnwindSafe(work).catch_unwind().await;
      guard.complete(settle(result_id, caught));
    }
    .boxed();

    submit(executor, completer, WorkBody::Async(future))
  }

  /// Like [`spawn`](Self::spawn) for a synchronous closure that may block.
  ///
  /// The closure is submitted as blocking work, so a
  /// [`PooledExecutor`](crate::PooledExecutor) runs it on the runtime's
  /// blocking threads instead of its async workers. Cancelling a blocked
  /// closure completes the result at once; the thread stays occupied until
  /// the closure returns, and its late outcome is discarded.
  pub fn of<E, F>(executor: &E, work: F) -> Self
  where
    E: Executor + ?Sized,
    F: FnOnce() -> Result<T, BoxError> + Send + 'static,
  {
    let completer: Arc<Completer<T>> = Completer::new();
    let result_id = completer.id();
    let guard = CompletionGuard::new(completer.clone());

    let run = move || {
      let caught = catch_unwind(AssertUnwindSafe(work));
      guard.complete(settle(result_id, caught));
    };

    submit(executor, completer, WorkBody::Blocking(Box::new(run)))
  }

  /// A result that is already completed with `outcome`.
  pub fn completed(outcome: Outcome<T>) -> Self {
    Self {
      completer: Completer::completed(outcome),
    }
  }

  pub fn successful(value: T) -> Self {
    Self::completed(Ok(value))
  }

  pub fn failed(error: FutureError) -> Self {
    Self::completed(Err(error))
  }

  /// Process-unique id of this result, as it appears in logs.
  pub fn id(&self) -> u64 {
    self.completer.id()
  }

  pub fn is_completed(&self) -> bool {
    self.completer.is_completed()
  }

  pub fn is_cancelled(&self) -> bool {
    self
      .completer
      .outcome()
      .is_some_and(|outcome| matches!(&*outcome, Err(FutureError::Cancelled)))
  }

  /// Requests cancellation.
  ///
  /// Returns `true` if this call completed the result as cancelled, `false`
  /// if it was already completed. On `true` the carrier running the work is
  /// asked to stop; whether it does is up to the executor and the work.
  pub fn cancel(&self) -> bool {
    self.completer.request_cancel()
  }

  /// Registers `callback` to receive the outcome exactly once.
  ///
  /// While pending, callbacks are queued and later run in registration order
  /// on the thread that completes the result. Once completed, `callback` runs
  /// immediately on the calling thread. A panicking callback is logged and
  /// does not affect other callbacks.
  pub fn on_complete<F>(&self, callback: F)
  where
    F: FnOnce(&Outcome<T>) + Send + 'static,
  {
    self.completer.register_callback(Box::new(callback));
  }
}

impl<T: Clone + Send + Sync + 'static> ResultHandle<T> {
  /// Snapshot of the outcome: `None` while pending.
  pub fn value(&self) -> Option<Outcome<T>> {
    self.completer.outcome().map(|outcome| (*outcome).clone())
  }

  /// Waits asynchronously for the outcome without blocking the thread.
  pub async fn await_outcome(&self) -> Outcome<T> {
    if let Some(outcome) = self.value() {
      return outcome;
    }
    let (tx, rx) = oneshot::channel::<Outcome<T>>();
    self.on_complete(move |outcome| {
      let _ = tx.send(outcome.clone());
    });
    match rx.await {
      Ok(outcome) => outcome,
      Err(recv_error) => {
        // The callback was dropped without running; the stored outcome is still authoritative.
        error!(result_id = %self.id(), "Completion channel closed early: {}", recv_error);
        self.value().unwrap_or(Err(FutureError::Cancelled))
      }
    }
  }
}

impl<T> Clone for ResultHandle<T> {
  fn clone(&self) -> Self {
    Self {
      completer: self.completer.clone(),
    }
  }
}

impl<T> fmt::Debug for ResultHandle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResultHandle")
      .field("completer", &self.completer)
      .finish()
  }
}

fn submit<T, E>(executor: &E, completer: Arc<Completer<T>>, body: WorkBody) -> ResultHandle<T>
where
  T: Send + Sync + 'static,
  E: Executor + ?Sized,
{
  let result_id = completer.id();
  match executor.submit(Work { result_id, body }) {
    Ok(carrier) => completer.attach_carrier(carrier),
    Err(rejected) => {
      let (work, reason) = rejected.into_parts();
      warn!(%result_id, %reason, "Work unit rejected by executor.");
      completer.try_complete(Err(FutureError::Rejected(reason)));
      drop(work);
    }
  }
  ResultHandle { completer }
}

fn settle<T>(result_id: u64, caught: Result<Result<T, BoxError>, Box<dyn Any + Send>>) -> Outcome<T> {
  match caught {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(work_error)) => Err(FutureError::failed(work_error)),
    Err(panic_payload) => {
      error!(%result_id, "Work unit panicked during execution.");
      Err(FutureError::from_panic(panic_payload))
    }
  }
}
