use futures_promise::{
  BoxError, Carrier, Executor, FutureError, ImmediateExecutor, NoopCarrier, PooledExecutor, Rejected, ResultHandle,
  ShutdownMode, Work,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

#[derive(Debug, thiserror::Error)]
#[error("work unit {0} failed")]
struct WorkError(u32);

// Helper to initialize tracing for tests
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,futures_promise=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

// Polls `condition` until it holds, failing the test after five seconds.
async fn wait_until(mut condition: impl FnMut() -> bool) {
  timeout(Duration::from_secs(5), async {
    while !condition() {
      sleep(Duration::from_millis(5)).await;
    }
  })
  .await
  .expect("condition was not met within 5s");
}

fn exploding_work() -> Result<i32, BoxError> {
  panic!("work exploded")
}

fn assert_failed_with<T: Clone + Send + Sync + 'static>(handle: &ResultHandle<T>) -> FutureError {
  assert!(handle.is_completed());
  match handle.value() {
    Some(Err(error)) => error,
    Some(Ok(_)) => panic!("expected a failed outcome, got a success"),
    None => panic!("expected a failed outcome, result still pending"),
  }
}

/// Runs work on a Tokio task but ignores interrupt requests.
#[derive(Debug)]
struct DetachedExecutor;

impl Executor for DetachedExecutor {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected> {
    tokio::spawn(work.into_future());
    Ok(Box::new(NoopCarrier))
  }
}

/// Refuses everything.
#[derive(Debug)]
struct ClosedExecutor;

impl Executor for ClosedExecutor {
  fn submit(&self, work: Work) -> Result<Box<dyn Carrier>, Rejected> {
    Err(Rejected::new(work, "closed for the day"))
  }
}

// -- immediate executor

#[test]
fn immediate_executor_completes_before_returning() {
  setup_tracing_for_test();
  let handle = ResultHandle::of(&ImmediateExecutor, || Ok(1));
  assert!(handle.is_completed());
  assert_eq!(handle.value(), Some(Ok(1)));
}

#[test]
fn cancelling_a_completed_result_changes_nothing() {
  setup_tracing_for_test();
  let handle = ResultHandle::of(&ImmediateExecutor, || Ok(1));
  assert!(!handle.cancel());
  assert!(!handle.cancel());
  assert!(!handle.is_cancelled());
  assert_eq!(handle.value(), Some(Ok(1)));
}

#[test]
fn immediate_failure_is_stored_with_its_error_type() {
  setup_tracing_for_test();
  let handle: ResultHandle<i32> = ResultHandle::of(&ImmediateExecutor, || Err(Box::new(WorkError(7)) as BoxError));
  let error = assert_failed_with(&handle);
  assert_eq!(error.downcast_ref::<WorkError>().map(|e| e.0), Some(7));
}

#[test]
fn question_mark_converts_work_errors() {
  setup_tracing_for_test();
  let handle: ResultHandle<u32> = ResultHandle::of(&ImmediateExecutor, || {
    let parsed: u32 = "not a number".parse()?;
    Ok(parsed)
  });
  let error = assert_failed_with(&handle);
  assert!(error.downcast_ref::<std::num::ParseIntError>().is_some());
}

#[test]
fn immediate_panic_is_captured_as_failure() {
  setup_tracing_for_test();
  let handle: ResultHandle<i32> = ResultHandle::of(&ImmediateExecutor, exploding_work);
  assert_eq!(assert_failed_with(&handle), FutureError::Panicked("work exploded".to_string()));
}

#[test]
fn callback_registered_after_completion_runs_immediately() {
  setup_tracing_for_test();
  let actual = Arc::new(Mutex::new(-1));
  let handle: ResultHandle<i32> = ResultHandle::of(&ImmediateExecutor, || Ok(1));
  assert_eq!(handle.value(), Some(Ok(1)));
  assert_eq!(*actual.lock().unwrap(), -1);

  let sink = actual.clone();
  handle.on_complete(move |outcome| *sink.lock().unwrap() = *outcome.as_ref().unwrap());
  assert_eq!(*actual.lock().unwrap(), 1);
}

#[test]
fn same_callback_registered_twice_runs_twice() {
  setup_tracing_for_test();
  let calls = Arc::new(AtomicUsize::new(0));
  let handle = ResultHandle::successful("done");
  for _ in 0..2 {
    let calls = calls.clone();
    handle.on_complete(move |_| {
      calls.fetch_add(1, Ordering::SeqCst);
    });
  }
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn prebuilt_results_are_completed() {
  let ok = ResultHandle::successful(3);
  assert_eq!(ok.value(), Some(Ok(3)));

  let failed: ResultHandle<i32> = ResultHandle::failed(FutureError::Cancelled);
  assert!(failed.is_cancelled());
  assert!(!failed.cancel());
}

#[test]
fn rejected_work_completes_as_rejected() {
  setup_tracing_for_test();
  let ran = Arc::new(AtomicUsize::new(0));
  let ran_in_work = ran.clone();
  let handle = ResultHandle::of(&ClosedExecutor, move || {
    ran_in_work.fetch_add(1, Ordering::SeqCst);
    Ok(())
  });
  assert_eq!(
    assert_failed_with(&handle),
    FutureError::Rejected("closed for the day".to_string())
  );
  assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn handle_clones_share_one_result() {
  let handle = ResultHandle::successful(5);
  let clone = handle.clone();
  assert_eq!(handle.id(), clone.id());
  assert_eq!(clone.value(), Some(Ok(5)));
}

// -- pooled executor

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_failure_is_reported_once_terminal() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(4, tokio::runtime::Handle::current(), "pooled_failure");
  let handle: ResultHandle<i32> = ResultHandle::spawn(&executor, async { Err(Box::new(WorkError(1)) as BoxError) });

  wait_until(|| handle.is_completed()).await;
  let error = assert_failed_with(&handle);
  assert!(error.downcast_ref::<WorkError>().is_some());

  executor.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_panic_is_reported_once_terminal() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(4, tokio::runtime::Handle::current(), "pooled_panic");
  let handle: ResultHandle<i32> = ResultHandle::spawn(&executor, async { exploding_work() });

  let outcome = handle.await_outcome().await;
  assert_eq!(outcome, Err(FutureError::Panicked("work exploded".to_string())));

  executor.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callback_registered_before_completion_receives_the_value() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(4, tokio::runtime::Handle::current(), "callback_before");
  let (release_tx, release_rx) = oneshot::channel::<()>();
  let actual = Arc::new(Mutex::new(-1));

  let handle: ResultHandle<i32> = ResultHandle::spawn(&executor, async move {
    release_rx.await?;
    Ok(1)
  });

  let sink = actual.clone();
  handle.on_complete(move |outcome| *sink.lock().unwrap() = *outcome.as_ref().unwrap());
  assert!(!handle.is_completed());
  assert_eq!(handle.value(), None);
  assert_eq!(*actual.lock().unwrap(), -1);

  release_tx.send(()).unwrap();

  wait_until(|| handle.is_completed()).await;
  wait_until(|| *actual.lock().unwrap() == 1).await;
  assert_eq!(handle.value(), Some(Ok(1)));

  executor.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelling_blocked_work_fails_it_as_cancelled() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(4, tokio::runtime::Handle::current(), "cancel_blocked");
  let (_never_tx, never_rx) = oneshot::channel::<()>();

  let handle: ResultHandle<()> = ResultHandle::spawn(&executor, async move {
    never_rx.await?;
    Ok(())
  });

  let seen = Arc::new(Mutex::new(None));
  let sink = seen.clone();
  handle.on_complete(move |outcome| *sink.lock().unwrap() = Some(outcome.clone()));

  assert!(handle.cancel());
  assert!(handle.is_cancelled());
  assert_eq!(assert_failed_with(&handle), FutureError::Cancelled);
  assert_eq!(*seen.lock().unwrap(), Some(Err(FutureError::Cancelled)));

  // The carrier drops the interrupted work.
  wait_until(|| executor.active_count() == 0).await;
  assert!(!handle.cancel());

  executor.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_wins_over_work_that_ignores_interrupts() {
  setup_tracing_for_test();
  let (release_tx, release_rx) = oneshot::channel::<()>();
  let (finished_tx, finished_rx) = oneshot::channel::<()>();

  let handle: ResultHandle<i32> = ResultHandle::spawn(&DetachedExecutor, async move {
    release_rx.await?;
    let _ = finished_tx.send(());
    Ok(42)
  });

  assert!(handle.cancel());
  release_tx.send(()).unwrap();
  finished_rx.await.unwrap();

  assert_eq!(handle.value(), Some(Err(FutureError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn await_outcome_resolves_for_pending_and_completed_results() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(2, tokio::runtime::Handle::current(), "await_outcome");
  let handle = ResultHandle::spawn(&executor, async {
    sleep(Duration::from_millis(30)).await;
    Ok("late".to_string())
  });

  assert_eq!(handle.await_outcome().await, Ok("late".to_string()));
  assert_eq!(handle.await_outcome().await, Ok("late".to_string()));

  executor.shutdown(ShutdownMode::Graceful).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callbacks_fire_exactly_once_under_concurrent_registration() {
  setup_tracing_for_test();
  let executor = PooledExecutor::new(4, tokio::runtime::Handle::current(), "concurrent_callbacks");
  let calls = Arc::new(AtomicUsize::new(0));

  for round in 0..20_u64 {
    let handle = ResultHandle::spawn(&executor, async move {
      sleep(Duration::from_millis(round % 3)).await;
      Ok(round)
    });

    let registrars: Vec<_> = (0..4)
      .map(|_| {
        let handle = handle.clone();
        let calls = calls.clone();
        std::thread::spawn(move || {
          for _ in 0..10 {
            let calls = calls.clone();
            handle.on_complete(move |outcome| {
              assert!(outcome.is_ok());
              calls.fetch_add(1, Ordering::SeqCst);
            });
          }
        })
      })
      .collect();
    for registrar in registrars {
      registrar.join().unwrap();
    }
    handle.await_outcome().await.unwrap();
  }

  wait_until(|| calls.load(Ordering::SeqCst) == 20 * 40).await;
  executor.shutdown(ShutdownMode::Graceful).await;
}
