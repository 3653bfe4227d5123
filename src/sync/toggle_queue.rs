use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::io::api::{ApiError, ItemUpdate, TaskStore};
use crate::model::task::TaskNode;
use crate::ops::tree_ops::{apply_toggle, completion_changes, find_by_id, order_entries};
use crate::sync::{SharedProject, fire_all, lock};

/// Outcome notifications from the queue worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The queue drained and the optimistic tree is now the confirmed one
    Committed { entries: usize },
    /// A toggle could not be persisted and was rolled back
    Failed { message: String },
}

/// One enqueued toggle with the tree as it was before it
struct Entry {
    id: String,
    completed: bool,
    snapshot: Vec<TaskNode>,
    generation: u64,
}

/// Serializes completion toggles onto one worker thread.
///
/// Each toggle is applied to the shared tree at once; the worker then
/// persists, in submission order, every node whose completion differs from
/// the entry's snapshot. When nothing else is waiting it persists every
/// node's order in one batch and marks the tree as committed.
pub struct ToggleQueue {
    shared: SharedProject,
    tx: Option<Sender<Entry>>,
    events: Receiver<SyncEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ToggleQueue {
    pub fn start<S: TaskStore + 'static>(shared: SharedProject, store: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || run_worker(rx, worker_shared, store, event_tx));
        ToggleQueue {
            shared,
            tx: Some(tx),
            events,
            worker: Some(worker),
        }
    }

    /// Apply the toggle locally and enqueue its persistence.
    /// Returns false when `id` is not in the tree.
    pub fn toggle(&self, id: &str, completed: bool) -> bool {
        let entry = {
            let mut state = lock(&self.shared);
            if find_by_id(&state.project.items, id).is_none() {
                return false;
            }
            let snapshot = state.project.items.clone();
            state.project.items = apply_toggle(&snapshot, id, completed);
            state.pending += 1;
            Entry {
                id: id.to_string(),
                completed,
                snapshot,
                generation: state.generation,
            }
        };
        tracing::debug!(id, completed, "toggle enqueued");

        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(entry).is_ok());
        if !sent {
            tracing::error!(id, "toggle worker is gone");
            let mut state = lock(&self.shared);
            state.pending -= 1;
        }
        sent
    }

    /// Block until every enqueued toggle and the final order batch are done.
    pub fn wait_idle(&self) {
        let (mutex, cvar) = &*self.shared;
        let mut state = mutex.lock().unwrap_or_else(|e| e.into_inner());
        while state.pending > 0 {
            state = cvar.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.shared).pending > 0
    }

    /// Non-blocking poll for worker notifications.
    /// Returns all queued events (may be empty).
    pub fn poll(&self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.events.try_recv() {
            events.push(evt);
        }
        events
    }
}

impl Drop for ToggleQueue {
    fn drop(&mut self) {
        // closing the channel ends the worker loop once it has drained
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker<S: TaskStore>(
    rx: Receiver<Entry>,
    shared: SharedProject,
    store: Arc<S>,
    events: Sender<SyncEvent>,
) {
    while let Ok(first) = rx.recv() {
        let mut handled = 0;
        let mut persisted = 0;
        let mut failure: Option<ApiError> = None;

        let mut next = Some(first);
        while let Some(entry) = next {
            handled += 1;
            let current_generation = lock(&shared).generation;
            if entry.generation == current_generation {
                match persist_entry(&shared, store.as_ref(), &entry) {
                    Ok(()) => persisted += 1,
                    Err(e) => {
                        tracing::warn!(id = %entry.id, error = %e, "toggle failed, rolling back");
                        let mut state = lock(&shared);
                        state.project.items = entry.snapshot;
                        state.generation += 1;
                        if failure.is_none() {
                            failure = Some(e);
                        }
                    }
                }
            } else {
                tracing::debug!(id = %entry.id, "dropping toggle undone by rollback");
            }
            next = rx.try_recv().ok();
        }

        // queue drained: persist orders and commit, unless this round failed
        let outcome = match failure {
            Some(e) => Err(e),
            None => persist_orders(&shared, store.as_ref()),
        };
        let event = match outcome {
            Ok(()) => {
                let mut state = lock(&shared);
                state.committed.items = state.project.items.clone();
                tracing::debug!(entries = persisted, "toggles committed");
                SyncEvent::Committed { entries: persisted }
            }
            Err(e) => SyncEvent::Failed {
                message: e.to_string(),
            },
        };

        // report before releasing waiters so wait_idle callers see the event
        let _ = events.send(event);
        {
            let mut state = lock(&shared);
            state.pending -= handled;
        }
        shared.1.notify_all();
    }
}

/// Persist every completion that differs between the entry's snapshot and
/// the current tree, which also covers cascaded parents and children.
fn persist_entry<S: TaskStore>(
    shared: &SharedProject,
    store: &S,
    entry: &Entry,
) -> Result<(), ApiError> {
    let current = lock(shared).project.items.clone();
    let changes = completion_changes(&entry.snapshot, &current);
    tracing::debug!(
        id = %entry.id,
        completed = entry.completed,
        changes = changes.len(),
        "persisting toggle"
    );
    fire_all(&changes, |change| {
        store.update_item(&change.id, &ItemUpdate::completion(change.is_completed))
    })
}

fn persist_orders<S: TaskStore>(shared: &SharedProject, store: &S) -> Result<(), ApiError> {
    let current = lock(shared).project.items.clone();
    let orders = order_entries(&current);
    fire_all(&orders, |(id, order)| store.update_item(id, &ItemUpdate::order(*order)))
}
