use crate::completer::Completer;
use crate::error::Outcome;
use crate::handle::ResultHandle;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

struct FindState<T, P> {
  completer: Arc<Completer<Option<T>>>,
  remaining: AtomicUsize,
  predicate: P,
}

impl<T, P> FindState<T, P>
where
  T: Clone + Send + Sync + 'static,
  P: Fn(&T) -> bool + Send + Sync + 'static,
{
  fn on_source_complete(&self, source_id: u64, outcome: &Outcome<T>) {
    if self.completer.is_completed() {
      trace!(find_id = %self.completer.id(), %source_id, "Source completed after find resolved. Ignoring.");
      return;
    }

    if let Ok(value) = outcome {
      if self.matches(source_id, value) {
        if self.completer.try_complete(Ok(Some(value.clone()))) {
          debug!(find_id = %self.completer.id(), %source_id, "Find resolved with a matching value.");
        }
        return;
      }
    }

    if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 && self.completer.try_complete(Ok(None)) {
      debug!(find_id = %self.completer.id(), "Find resolved empty, no source matched.");
    }
  }

  fn matches(&self, source_id: u64, value: &T) -> bool {
    match catch_unwind(AssertUnwindSafe(|| (self.predicate)(value))) {
      Ok(matched) => matched,
      Err(_) => {
        warn!(find_id = %self.completer.id(), %source_id, "Find predicate panicked. Treating value as not matching.");
        false
      }
    }
  }
}

/// Races `sources` for the first success whose value satisfies `predicate`.
///
/// The returned result completes with `Ok(Some(value))` for the first source,
/// in completion order, that succeeds with a matching value, or with
/// `Ok(None)` once every source has completed without one. Failed sources
/// count as completed but never match, and a panicking predicate counts as a
/// non-match, so the result only fails if it is itself cancelled. Sources
/// still running after a match are left alone.
pub fn find<T, I, P>(sources: I, predicate: P) -> ResultHandle<Option<T>>
where
  T: Clone + Send + Sync + 'static,
  I: IntoIterator<Item = ResultHandle<T>>,
  P: Fn(&T) -> bool + Send + Sync + 'static,
{
  let sources: Vec<ResultHandle<T>> = sources.into_iter().collect();
  let completer: Arc<Completer<Option<T>>> = Completer::new();
  debug!(find_id = %completer.id(), sources = sources.len(), "Find created.");

  if sources.is_empty() {
    completer.try_complete(Ok(None));
    return ResultHandle { completer };
  }

  let state = Arc::new(FindState {
    completer: completer.clone(),
    remaining: AtomicUsize::new(sources.len()),
    predicate,
  });

  for source in &sources {
    let state = state.clone();
    let source_id = source.id();
    source.on_complete(move |outcome| state.on_source_complete(source_id, outcome));
  }

  ResultHandle { completer }
}
