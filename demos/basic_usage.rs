use futures_promise::{PooledExecutor, ResultHandle, ShutdownMode};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn my_work_fn(id: usize, delay_ms: u64) -> String {
  info!("Work {} starting, will sleep for {}ms", id, delay_ms);
  tokio::time::sleep(Duration::from_millis(delay_ms)).await;
  let result = format!("Work {} finished successfully after {}ms", id, delay_ms);
  info!("{}", result);
  result
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  let executor = PooledExecutor::new(2, Handle::current(), "basic_pool");

  let handles: Vec<ResultHandle<String>> = (0..5)
    .map(|i| {
      let sleep_duration: u64 = 500 + (i as u64 % 3 * 250);
      let handle = ResultHandle::spawn(&executor, async move { Ok(my_work_fn(i, sleep_duration).await) });
      handle.on_complete(move |outcome| info!("Callback for work {}: ok = {}", i, outcome.is_ok()));
      handle
    })
    .collect();

  // Cancel the last one before it gets a permit.
  let cancelled = handles[4].cancel();
  info!("Cancelled work 4: {}", cancelled);

  for (i, handle) in handles.iter().enumerate() {
    match handle.await_outcome().await {
      Ok(result) => info!("Result for work {}: {}", i, result),
      Err(e) => info!("Error for work {}: {}", i, e),
    }
  }

  executor.shutdown(ShutdownMode::Graceful).await;
  info!("--- Basic Usage Example End ---");
}
