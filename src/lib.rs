//! Cancellable, thread-safe result handles for work dispatched to pluggable
//! executors, with exactly-once completion callbacks and a first-match
//! combinator.

mod completer;
mod error;
mod executor;
mod find;
mod handle;
mod pool;
mod registry;
mod task;

pub use error::{BoxError, FutureError, Outcome};
pub use executor::{Carrier, Executor, ImmediateExecutor, NoopCarrier};
pub use find::find;
pub use handle::ResultHandle;
pub use pool::{PooledCarrier, PooledExecutor, ShutdownMode};
pub use task::{Rejected, Work, WorkBody};
