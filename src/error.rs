use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error a work unit may return. Any `E: Error + Send + Sync` converts
/// into it with `?`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The terminal resolution of a result: the work unit's value, or why there is none.
pub type Outcome<T> = Result<T, FutureError>;

/// Failure kinds stored in a completed result.
#[derive(Error, Debug, Clone)]
pub enum FutureError {
  #[error("Result was cancelled before it completed")]
  Cancelled,

  #[error("Work unit panicked: {0}")]
  Panicked(String),

  #[error("Work unit failed: {0}")]
  Failed(Arc<dyn StdError + Send + Sync + 'static>),

  #[error("Executor rejected the work unit: {0}")]
  Rejected(String),
}

impl FutureError {
  /// Wraps an error returned by a work unit.
  pub fn failed(error: BoxError) -> Self {
    FutureError::Failed(Arc::from(error))
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, FutureError::Cancelled)
  }

  /// Returns the work unit's own error as `E`, if this is a `Failed` of that type.
  pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
    match self {
      FutureError::Failed(inner) => inner.downcast_ref::<E>(),
      _ => None,
    }
  }

  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    FutureError::Panicked(message)
  }
}

// `Failed` compares by identity: two outcomes are equal only if they carry the same error instance.
impl PartialEq for FutureError {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (FutureError::Cancelled, FutureError::Cancelled) => true,
      (FutureError::Panicked(a), FutureError::Panicked(b)) => a == b,
      (FutureError::Rejected(a), FutureError::Rejected(b)) => a == b,
      (FutureError::Failed(a), FutureError::Failed(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}
