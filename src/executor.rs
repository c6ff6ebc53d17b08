use crate::task::{Rejected, Work, WorkBody};

use std::fmt;

use tracing::trace;

/// A handle to the carrier running one submitted unit of work.
pub trait Carrier: Send + Sync + fmt::Debug {
  /// Requests that the carrier stop running its work. Best effort: carriers
  /// that cannot interrupt treat this as a no-op.
  fn interrupt(&self);
}

/// Something that can run units of work.
///
/// `submit` must either take ownership of `work` and eventually drive or drop
/// it, or hand it back inside [`Rejected`]. It must not wait on the work's
/// progress unless the executor runs work on the caller's thread by definition.
pub trait Executor: Send + Sync {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected>;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected> {
    (**self).submit(work)
  }
}

/// Carrier for work that has already finished or cannot be interrupted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCarrier;

impl Carrier for NoopCarrier {
  fn interrupt(&self) {}
}

/// Runs each unit of work to completion on the submitting thread before
/// `submit` returns.
///
/// Results created through it are always completed by the time the caller
/// holds their handle. Work that awaits something only another thread can
/// provide will block the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl ImmediateExecutor {
  pub fn new() -> Self {
    ImmediateExecutor
  }
}

impl Executor for ImmediateExecutor {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected> {
    let result_id = work.result_id();
    trace!(%result_id, "ImmediateExecutor: running work on the calling thread.");
    match work.into_body() {
      WorkBody::Async(future) => futures::executor::block_on(future),
      WorkBody::Blocking(run) => run(),
    }
    Ok(Box::new(NoopCarrier))
  }
}
