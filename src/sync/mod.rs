//! Optimistic project state and its persistence.
//!
//! The session applies every change to an in-memory tree first and then
//! persists it. Completion toggles go through a single-consumer queue so
//! they reach the backend in submission order; other edits are made
//! synchronously and rolled back when the call fails.

pub mod session;
pub mod toggle_queue;

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use crate::io::api::ApiError;
use crate::model::project::Project;

pub use session::{ProjectSession, SessionError};
pub use toggle_queue::{SyncEvent, ToggleQueue};

/// State shared between the session and the queue worker
#[derive(Debug, Clone)]
pub struct SessionState {
    /// What the user sees, including unconfirmed changes
    pub project: Project,
    /// Last state known to be persisted
    pub committed: Project,
    /// Toggles enqueued but not yet finished
    pub pending: usize,
    /// Bumped on every rollback; queued toggles from an older generation
    /// were undone by it and are discarded
    pub generation: u64,
}

pub type SharedProject = Arc<(Mutex<SessionState>, Condvar)>;

pub fn shared(project: Project) -> SharedProject {
    Arc::new((
        Mutex::new(SessionState {
            committed: project.clone(),
            project,
            pending: 0,
            generation: 0,
        }),
        Condvar::new(),
    ))
}

/// Lock the shared state. A panic on another thread does not leave the
/// tree half-written (every update swaps in a whole new tree), so a
/// poisoned lock is taken over as is.
pub(crate) fn lock(shared: &SharedProject) -> MutexGuard<'_, SessionState> {
    shared.0.lock().unwrap_or_else(|e| e.into_inner())
}

/// Most calls `fire_all` keeps in flight at once
pub(crate) const MAX_IN_FLIGHT: usize = 8;

/// Run `call` for every item, at most `MAX_IN_FLIGHT` at a time, and wait
/// for all of them. A failure does not stop the remaining calls.
/// Returns the first error; later ones are logged.
pub(crate) fn fire_all<T, F>(items: &[T], call: F) -> Result<(), ApiError>
where
    T: Sync,
    F: Fn(&T) -> Result<(), ApiError> + Sync,
{
    let call = &call;
    let mut first_err = None;
    for chunk in items.chunks(MAX_IN_FLIGHT) {
        thread::scope(|s| {
            let handles: Vec<_> = chunk.iter().map(|item| s.spawn(move || call(item))).collect();
            for handle in handles {
                let result = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                if let Err(e) = result {
                    match first_err {
                        None => first_err = Some(e),
                        Some(_) => tracing::warn!(error = %e, "additional persistence failure"),
                    }
                }
            }
        });
    }
    first_err.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn failure(id: usize) -> ApiError {
        ApiError::Status {
            path: format!("/todos/items/{}", id),
            status: 500,
            detail: "boom".to_string(),
        }
    }

    #[test]
    fn fire_all_bounds_concurrency_and_finishes_everything() {
        let items: Vec<usize> = (0..100).collect();
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let done = AtomicUsize::new(0);

        let result = fire_all(&items, |&i| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            running.fetch_sub(1, Ordering::SeqCst);
            done.fetch_add(1, Ordering::SeqCst);
            if i == 3 || i == 70 { Err(failure(i)) } else { Ok(()) }
        });

        assert_eq!(done.load(Ordering::SeqCst), 100);
        assert!(peak.load(Ordering::SeqCst) <= MAX_IN_FLIGHT);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("/todos/items/3"), "{}", err);
    }

    #[test]
    fn fire_all_empty_is_ok() {
        let items: Vec<usize> = Vec::new();
        assert!(fire_all(&items, |_| Err(failure(0))).is_ok());
    }
}
