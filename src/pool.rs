use crate::completer::next_result_id;
use crate::executor::{Carrier, Executor};
use crate::task::{Rejected, Work, WorkBody};

use std::sync::Arc;

use tokio::runtime::Handle as TokioHandle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, trace, warn, Instrument};

/// Defines how the pool should behave upon shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Stops accepting work and waits for running work to finish.
  Graceful,
  /// Stops accepting work and interrupts everything still running.
  ForcefulCancel,
}

/// Runs work units as tasks on a Tokio runtime.
///
/// `submit` returns as soon as the task is spawned. At most
/// `concurrency_limit` units make progress at once; the rest wait for a
/// permit inside their own task, where they can still be interrupted.
/// Blocking work runs on the runtime's blocking threads while its task holds
/// the permit. Interrupting it releases the permit and the task at once, but
/// the blocking thread stays busy until the closure returns.
#[derive(Debug, Clone)]
pub struct PooledExecutor {
  pool_name: Arc<String>,
  semaphore: Arc<Semaphore>,
  tokio_handle: TokioHandle,
  shutdown_token: CancellationToken,
  tracker: TaskTracker,
}

impl PooledExecutor {
  /// `concurrency_limit` is clamped to `1..=Semaphore::MAX_PERMITS`.
  pub fn new(concurrency_limit: usize, tokio_handle: TokioHandle, pool_name: &str) -> Arc<Self> {
    let concurrency_limit = concurrency_limit.clamp(1, Semaphore::MAX_PERMITS);
    info!(%pool_name, concurrency_limit, "Pooled executor created.");
    Arc::new(Self {
      pool_name: Arc::new(pool_name.to_string()),
      semaphore: Arc::new(Semaphore::new(concurrency_limit)),
      tokio_handle,
      shutdown_token: CancellationToken::new(),
      tracker: TaskTracker::new(),
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Number of spawned work units that have not finished yet, including those waiting for a permit.
  pub fn active_count(&self) -> usize {
    self.tracker.len()
  }

  pub fn is_shutting_down(&self) -> bool {
    self.tracker.is_closed()
  }

  /// Stops accepting work and waits until every spawned unit has finished.
  ///
  /// With `ForcefulCancel` every running unit is interrupted first; results
  /// whose work is interrupted this way complete as cancelled.
  pub async fn shutdown(&self, mode: ShutdownMode) {
    let already_initiating_shutdown = !self.tracker.close();
    if already_initiating_shutdown {
      info!(pool_name = %self.pool_name, "Shutdown already in progress or initiated by another call.");
    } else {
      info!(pool_name = %self.pool_name, "Initiating pool shutdown (mode: {:?}).", mode);
    }

    if mode == ShutdownMode::ForcefulCancel {
      info!(pool_name = %self.pool_name, active = self.tracker.len(), "Forceful shutdown: interrupting all active work.");
      self.shutdown_token.cancel();
    }

    self.tracker.wait().await;
    info!(pool_name = %self.pool_name, "Pool shutdown completed.");
  }
}

impl Executor for PooledExecutor {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected> {
    let result_id = work.result_id();
    if self.tracker.is_closed() {
      warn!(pool_name = %self.pool_name, %result_id, "Submit: Attempted to submit work to a pool that is shutting down.");
      let reason = format!("pool '{}' is shutting down", self.pool_name);
      return Err(Rejected::new(work, reason));
    }

    let carrier_id = next_result_id();
    let token = self.shutdown_token.child_token();
    let task_token = token.clone();
    let semaphore = self.semaphore.clone();
    let pool_name = self.pool_name.clone();
    let span = info_span!("pooled_work", pool_name = %*self.pool_name, %carrier_id, %result_id);

    debug!(pool_name = %self.pool_name, %result_id, %carrier_id, blocking = work.is_blocking(), "Spawning work on pool.");

    let task = async move {
      tokio::select! {
        biased;
        _ = task_token.cancelled() => {
          debug!(pool_name = %*pool_name, %carrier_id, "Work interrupted by its carrier token.");
        }
        _ = async {
          let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
              warn!(pool_name = %*pool_name, %carrier_id, "Semaphore closed. Dropping work.");
              return;
            }
          };
          trace!(pool_name = %*pool_name, %carrier_id, "Acquired permit. Running work.");
          match work.into_body() {
            WorkBody::Async(future) => future.await,
            WorkBody::Blocking(run) => {
              if let Err(join_error) = tokio::task::spawn_blocking(run).await {
                warn!(pool_name = %*pool_name, %carrier_id, "Blocking work did not finish: {}", join_error);
              }
            }
          }
        } => {
          trace!(pool_name = %*pool_name, %carrier_id, "Work finished.");
        }
      }
      trace!(pool_name = %*pool_name, %carrier_id, "Pooled carrier released.");
    }
    .instrument(span);

    self.tokio_handle.spawn(self.tracker.track_future(task));

    Ok(Box::new(PooledCarrier {
      carrier_id,
      pool_name: self.pool_name.clone(),
      token,
    }))
  }
}

/// Interrupts one pooled work unit through its cancellation token.
#[derive(Debug)]
pub struct PooledCarrier {
  carrier_id: u64,
  pool_name: Arc<String>,
  token: CancellationToken,
}

impl PooledCarrier {
  pub fn id(&self) -> u64 {
    self.carrier_id
  }
}

impl Carrier for PooledCarrier {
  fn interrupt(&self) {
    debug!(pool_name = %self.pool_name, carrier_id = %self.carrier_id, "PooledCarrier: Interrupt requested.");
    self.token.cancel();
  }
}
