use std::fmt;

use futures::future::BoxFuture;
use futures::FutureExt;

/// What a [`Work`] unit runs.
pub enum WorkBody {
  /// Cooperative work; an executor drives it as a future.
  Async(BoxFuture<'static, ()>),
  /// A synchronous closure that may block its thread; an executor should run
  /// it where blocking does not stall other work.
  Blocking(Box<dyn FnOnce() + Send + 'static>),
}

/// A unit of work handed to an [`Executor`](crate::Executor).
///
/// The body already carries everything needed to record its outcome; an
/// executor only has to run it, or drop it to interrupt it.
pub struct Work {
  pub(crate) result_id: u64,
  pub(crate) body: WorkBody,
}

impl Work {
  /// Id of the result this work will complete.
  pub fn result_id(&self) -> u64 {
    self.result_id
  }

  pub fn is_blocking(&self) -> bool {
    matches!(self.body, WorkBody::Blocking(_))
  }

  pub fn into_body(self) -> WorkBody {
    self.body
  }

  /// The work as a future. A blocking body runs inline on whichever thread polls it.
  pub fn into_future(self) -> BoxFuture<'static, ()> {
    match self.body {
      WorkBody::Async(future) => future,
      WorkBody::Blocking(run) => async move { run() }.boxed(),
    }
  }
}

impl fmt::Debug for Work {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Work")
      .field("result_id", &self.result_id)
      .field("blocking", &self.is_blocking())
      .finish_non_exhaustive()
  }
}

/// An executor's refusal to run a unit of work. Hands the work back so the
/// caller decides how its result completes.
pub struct Rejected {
  work: Work,
  reason: String,
}

impl Rejected {
  pub fn new(work: Work, reason: impl Into<String>) -> Self {
    Self {
      work,
      reason: reason.into(),
    }
  }

  pub fn reason(&self) -> &str {
    &self.reason
  }

  pub fn into_parts(self) -> (Work, String) {
    (self.work, self.reason)
  }
}

impl fmt::Debug for Rejected {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Rejected")
      .field("result_id", &self.work.result_id)
      .field("reason", &self.reason)
      .finish()
  }
}
