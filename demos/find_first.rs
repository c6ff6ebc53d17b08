use futures_promise::{find, PooledExecutor, ResultHandle, ShutdownMode};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Find First Example ---");

  let executor = PooledExecutor::new(8, Handle::current(), "find_pool");

  // Twenty candidates finishing in reverse order of their value.
  let sources: Vec<ResultHandle<u64>> = (1..=20_u64)
    .map(|i| {
      ResultHandle::spawn(&executor, async move {
        tokio::time::sleep(Duration::from_millis((21 - i) * 20)).await;
        Ok(i)
      })
    })
    .collect();

  let first_multiple_of_five = find(sources.clone(), |v| v % 5 == 0);
  let first_above_hundred = find(sources, |v| *v > 100);

  info!("First multiple of five to finish: {:?}", first_multiple_of_five.await_outcome().await);
  info!("First value above one hundred: {:?}", first_above_hundred.await_outcome().await);

  executor.shutdown(ShutdownMode::Graceful).await;
  info!("--- Find First Example End ---");
}
