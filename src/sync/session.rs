use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset};

use crate::io::api::{ApiError, ItemUpdate, ListUpdate, QuickItem, TaskStore};
use crate::model::project::Project;
use crate::model::task::{Priority, TaskNode};
use crate::ops::tree_ops;
use crate::ops::validate::{ValidationError, validate_keyword, validate_task_text};
use crate::parse::nlp_parser;
use crate::sync::toggle_queue::{SyncEvent, ToggleQueue};
use crate::sync::{SharedProject, fire_all, lock, shared};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One open project: its optimistic tree, the store it persists to and
/// the toggle queue.
///
/// Every edit except toggling is applied locally, persisted with a single
/// call, and undone if that call fails.
///
/// Edits and toggle rounds never overlap: an edit first waits for the
/// toggle queue to drain, and no toggle is enqueued while an edit is in
/// flight. A failed toggle round restores its snapshot, so it can only
/// discard other toggles.
pub struct ProjectSession<S: TaskStore + 'static> {
    shared: SharedProject,
    store: Arc<S>,
    queue: ToggleQueue,
    edit_gate: Mutex<()>,
}

impl<S: TaskStore + 'static> ProjectSession<S> {
    pub fn new(project: Project, store: Arc<S>) -> Self {
        let shared = shared(project);
        let queue = ToggleQueue::start(Arc::clone(&shared), Arc::clone(&store));
        ProjectSession {
            shared,
            store,
            queue,
            edit_gate: Mutex::new(()),
        }
    }

    pub fn project_id(&self) -> String {
        lock(&self.shared).project.id.clone()
    }

    /// Current tree, including changes not yet confirmed.
    pub fn snapshot(&self) -> Project {
        lock(&self.shared).project.clone()
    }

    /// Last tree known to be persisted.
    pub fn committed(&self) -> Project {
        lock(&self.shared).committed.clone()
    }

    // --- item edits ---

    pub fn edit_description(&self, id: &str, description: &str) -> Result<(), SessionError> {
        let description = validate_task_text(description)?;
        self.optimistic(
            id,
            |tree| tree_ops::edit_description(tree, id, description),
            |store| store.update_item(id, &ItemUpdate::description(description)),
        )
    }

    pub fn set_priority(&self, id: &str, priority: Priority) -> Result<(), SessionError> {
        self.optimistic(
            id,
            |tree| tree_ops::set_priority(tree, id, priority),
            |store| store.update_item(id, &ItemUpdate::priority(priority)),
        )
    }

    pub fn set_due_date(
        &self,
        id: &str,
        due_date: Option<DateTime<FixedOffset>>,
    ) -> Result<(), SessionError> {
        self.optimistic(
            id,
            |tree| tree_ops::set_due_date(tree, id, due_date),
            |store| store.update_item(id, &ItemUpdate::due_date(due_date)),
        )
    }

    pub fn delete_item(&self, id: &str) -> Result<(), SessionError> {
        self.optimistic(
            id,
            |tree| tree_ops::delete_subtree(tree, id),
            |store| store.delete_item(id),
        )
    }

    /// Completion toggles are persisted in the background, in order.
    pub fn toggle(&self, id: &str, completed: bool) -> Result<(), SessionError> {
        let enqueued = {
            let _gate = self.gate();
            self.queue.toggle(id, completed)
        };
        if enqueued {
            Ok(())
        } else {
            Err(SessionError::NotFound(id.to_string()))
        }
    }

    // --- ordering ---

    /// Move a sibling during a drag. Local only; `save_order` persists it.
    pub fn move_item(
        &self,
        parent_id: Option<&str>,
        from: usize,
        to: usize,
    ) -> Result<(), SessionError> {
        let _gate = self.quiesce();
        let mut state = lock(&self.shared);
        if let Some(pid) = parent_id {
            if tree_ops::find_by_id(&state.project.items, pid).is_none() {
                return Err(SessionError::NotFound(pid.to_string()));
            }
        }
        let reordered = tree_ops::reorder_siblings(&state.project.items, parent_id, from, to);
        state.project.items = reordered;
        Ok(())
    }

    /// End of a drag: renumber every level and persist all orders.
    pub fn save_order(&self) -> Result<(), SessionError> {
        let _gate = self.quiesce();
        let (snapshot, renumbered) = {
            let mut state = lock(&self.shared);
            let snapshot = state.project.items.clone();
            state.project.items = tree_ops::reassign_order(&snapshot);
            (snapshot, state.project.items.clone())
        };

        let orders = tree_ops::order_entries(&renumbered);
        let store = self.store.as_ref();
        let saved = fire_all(&orders, |(id, order)| {
            store.update_item(id, &ItemUpdate::order(*order))
        });
        if let Err(e) = saved {
            tracing::warn!(error = %e, "saving order failed, restoring previous order");
            lock(&self.shared).project.items = snapshot;
            return Err(e.into());
        }

        lock(&self.shared).committed.items = renumbered;
        Ok(())
    }

    // --- creation ---

    /// Create an item from free text; the server parses it.
    pub fn add_from_text(&self, text: &str) -> Result<TaskNode, SessionError> {
        let text = validate_task_text(text)?;
        let _gate = self.quiesce();
        let list_id = self.project_id();
        let node = self.store.create_item_from_text(text, &list_id)?;
        self.insert(None, node.clone());
        Ok(node)
    }

    /// Parse `text` locally and create the item as is, optionally as a
    /// subtask of `parent_id`.
    pub fn quick_add(
        &self,
        text: &str,
        parent_id: Option<&str>,
    ) -> Result<TaskNode, SessionError> {
        let text = validate_task_text(text)?;
        let _gate = self.quiesce();
        if let Some(pid) = parent_id {
            if tree_ops::find_by_id(&lock(&self.shared).project.items, pid).is_none() {
                return Err(SessionError::NotFound(pid.to_string()));
            }
        }

        let parsed = nlp_parser::parse(text);
        // input made only of date words still needs a description
        let description = if parsed.description.is_empty() {
            text.to_string()
        } else {
            parsed.description
        };
        let item = QuickItem {
            description,
            list_id: self.project_id(),
            priority: parsed.priority,
            due_date: parsed.due_date,
            parent_id: parent_id.map(str::to_string),
        };
        let node = self.store.create_quick_item(&item)?;
        self.insert(parent_id, node.clone());
        Ok(node)
    }

    /// Ask the server to break an item into subtasks.
    pub fn generate_subtasks(&self, id: &str) -> Result<TaskNode, SessionError> {
        let _gate = self.quiesce();
        if tree_ops::find_by_id(&lock(&self.shared).project.items, id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        let node = self.store.generate_subtasks(id)?;
        let mut state = lock(&self.shared);
        state.project.items = tree_ops::replace_node(&state.project.items, &node);
        state.committed.items = tree_ops::replace_node(&state.committed.items, &node);
        Ok(node)
    }

    // --- project ---

    pub fn rename_project(&self, keyword: &str) -> Result<(), SessionError> {
        let keyword = validate_keyword(keyword)?;
        let _gate = self.quiesce();
        let (list_id, previous) = {
            let mut state = lock(&self.shared);
            let previous = std::mem::replace(&mut state.project.keyword, keyword.to_string());
            (state.project.id.clone(), previous)
        };

        let update = ListUpdate {
            keyword: Some(keyword.to_string()),
            ..Default::default()
        };
        if let Err(e) = self.store.update_list(&list_id, &update) {
            tracing::warn!(error = %e, "rename failed, restoring keyword");
            lock(&self.shared).project.keyword = previous;
            return Err(e.into());
        }
        lock(&self.shared).committed.keyword = keyword.to_string();
        Ok(())
    }

    // --- queue ---

    pub fn wait_idle(&self) {
        self.queue.wait_idle();
    }

    pub fn is_busy(&self) -> bool {
        self.queue.is_busy()
    }

    pub fn poll(&self) -> Vec<SyncEvent> {
        self.queue.poll()
    }

    // --- internals ---

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.edit_gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hold off new toggles and wait for the in-flight round to finish.
    fn quiesce(&self) -> MutexGuard<'_, ()> {
        let gate = self.gate();
        self.queue.wait_idle();
        gate
    }

    /// Snapshot, apply `local`, persist with `call`; restore the snapshot on
    /// failure. On success the same change is applied to the committed tree.
    fn optimistic<L, C>(&self, id: &str, local: L, call: C) -> Result<(), SessionError>
    where
        L: Fn(&[TaskNode]) -> Vec<TaskNode>,
        C: FnOnce(&S) -> Result<(), ApiError>,
    {
        let _gate = self.quiesce();
        let snapshot = {
            let mut state = lock(&self.shared);
            if tree_ops::find_by_id(&state.project.items, id).is_none() {
                return Err(SessionError::NotFound(id.to_string()));
            }
            let snapshot = state.project.items.clone();
            state.project.items = local(&snapshot);
            snapshot
        };

        if let Err(e) = call(self.store.as_ref()) {
            tracing::warn!(id, error = %e, "update failed, restoring previous state");
            lock(&self.shared).project.items = snapshot;
            return Err(e.into());
        }

        let mut state = lock(&self.shared);
        state.committed.items = local(&state.committed.items);
        Ok(())
    }

    fn insert(&self, parent_id: Option<&str>, node: TaskNode) {
        let mut state = lock(&self.shared);
        state.project.items = tree_ops::append_child(&state.project.items, parent_id, node.clone());
        state.committed.items = tree_ops::append_child(&state.committed.items, parent_id, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::{Call, MockStore, sample_project};
    use pretty_assertions::assert_eq;

    fn session(store: MockStore) -> (ProjectSession<MockStore>, Arc<MockStore>) {
        let store = Arc::new(store);
        (ProjectSession::new(sample_project(), Arc::clone(&store)), store)
    }

    fn root_ids(project: &Project) -> Vec<String> {
        project.items.iter().map(|n| n.id.clone()).collect()
    }

    // --- edits ---

    #[test]
    fn edit_updates_both_trees_on_success() {
        let (s, store) = session(MockStore::default());
        s.edit_description("a1", "  주방 정리 ").unwrap();

        let find = |p: &Project| tree_ops::find_by_id(&p.items, "a1").unwrap().description.clone();
        assert_eq!(find(&s.snapshot()), "주방 정리");
        assert_eq!(find(&s.committed()), "주방 정리");
        assert_eq!(
            store.calls(),
            vec![Call::Update("a1".into(), ItemUpdate::description("주방 정리"))]
        );
    }

    #[test]
    fn failed_edit_restores_snapshot() {
        let (s, _store) = session(MockStore::failing_on("b"));
        let err = s.set_priority("b", Priority::High).unwrap_err();
        assert!(matches!(err, SessionError::Api(_)));
        assert_eq!(s.snapshot(), sample_project());
        assert_eq!(s.committed(), sample_project());
    }

    #[test]
    fn failed_delete_brings_subtree_back() {
        let (s, _store) = session(MockStore::failing_on("a"));
        assert!(s.delete_item("a").is_err());
        assert!(tree_ops::find_by_id(&s.snapshot().items, "a2").is_some());
    }

    #[test]
    fn delete_and_due_date() {
        let (s, store) = session(MockStore::default());
        s.delete_item("a").unwrap();
        assert_eq!(root_ids(&s.snapshot()), vec!["b", "c"]);

        s.set_due_date("b", None).unwrap();
        assert_eq!(
            store.calls(),
            vec![
                Call::Delete("a".into()),
                Call::Update("b".into(), ItemUpdate::due_date(None)),
            ]
        );
    }

    #[test]
    fn validation_and_missing_ids_make_no_calls() {
        let (s, store) = session(MockStore::default());
        assert!(matches!(
            s.edit_description("a1", "   "),
            Err(SessionError::Invalid(ValidationError::Empty(_)))
        ));
        assert!(matches!(
            s.set_priority("nope", Priority::Low),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(s.rename_project("x"), Err(SessionError::Invalid(_))));
        assert!(matches!(s.toggle("nope", true), Err(SessionError::NotFound(_))));
        assert!(store.calls().is_empty());
    }

    // --- ordering ---

    #[test]
    fn move_is_local_until_saved() {
        let (s, store) = session(MockStore::default());
        s.move_item(None, 2, 0).unwrap();
        assert_eq!(root_ids(&s.snapshot()), vec!["c", "a", "b"]);
        assert_eq!(root_ids(&s.committed()), vec!["a", "b", "c"]);
        assert!(store.calls().is_empty());

        s.save_order().unwrap();
        let committed = s.committed();
        assert_eq!(root_ids(&committed), vec!["c", "a", "b"]);
        let orders: Vec<i64> = committed.items.iter().map(|n| n.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(store.calls().len(), 5);
    }

    #[test]
    fn failed_save_order_restores() {
        let (s, _store) = session(MockStore::failing_on("c"));
        s.move_item(None, 2, 0).unwrap();
        let before_save = s.snapshot();
        assert!(s.save_order().is_err());
        assert_eq!(s.snapshot(), before_save);
    }

    #[test]
    fn move_under_missing_parent() {
        let (s, _store) = session(MockStore::default());
        assert!(matches!(s.move_item(Some("zz"), 0, 1), Err(SessionError::NotFound(_))));
    }

    // --- creation ---

    #[test]
    fn add_from_text_appends_server_item() {
        let (s, store) = session(MockStore::replying(TaskNode::new("n1", "보고서 작성").with_order(3)));
        let node = s.add_from_text("내일 보고서 작성").unwrap();
        assert_eq!(node.id, "n1");
        assert_eq!(root_ids(&s.snapshot()), vec!["a", "b", "c", "n1"]);
        assert_eq!(
            store.calls(),
            vec![Call::FromText("내일 보고서 작성".into(), "p1".into())]
        );
    }

    #[test]
    fn quick_add_parses_locally() {
        let (s, store) = session(MockStore::replying(TaskNode::new("q1", "가구 배치")));
        s.quick_add("긴급 가구 배치", Some("a")).unwrap();

        let calls = store.calls();
        let Call::Quick(item) = &calls[0] else {
            panic!("expected quick create, got {:?}", calls);
        };
        assert_eq!(item.description, "가구 배치");
        assert_eq!(item.priority, Priority::High);
        assert_eq!(item.parent_id.as_deref(), Some("a"));
        assert_eq!(item.due_date, None);

        let a = s.snapshot().items[0].clone();
        assert_eq!(a.children.last().map(|n| n.id.as_str()), Some("q1"));
    }

    #[test]
    fn generate_subtasks_replaces_node() {
        let generated = TaskNode::new("b", "전입 신고")
            .with_order(1)
            .with_children(vec![TaskNode::new("b1", "신분증 챙기기")]);
        let (s, _store) = session(MockStore::replying(generated));
        s.generate_subtasks("b").unwrap();
        assert!(tree_ops::find_by_id(&s.snapshot().items, "b1").is_some());
        assert!(tree_ops::find_by_id(&s.committed().items, "b1").is_some());
    }

    // --- project ---

    #[test]
    fn rename_success_and_failure() {
        let (s, store) = session(MockStore::default());
        s.rename_project(" 새 집 ").unwrap();
        assert_eq!(s.snapshot().keyword, "새 집");
        assert_eq!(s.committed().keyword, "새 집");
        assert_eq!(
            store.calls(),
            vec![Call::List(
                "p1".into(),
                ListUpdate {
                    keyword: Some("새 집".into()),
                    ..Default::default()
                }
            )]
        );

        let (s, _store) = session(MockStore::failing_on("p1"));
        assert!(s.rename_project("새 집").is_err());
        assert_eq!(s.snapshot().keyword, "이사 준비");
    }

    // --- toggles ---

    #[test]
    fn toggle_goes_through_queue() {
        let (s, store) = session(MockStore::default());
        s.toggle("b", true).unwrap();
        s.wait_idle();
        assert!(!s.is_busy());
        assert!(tree_ops::find_by_id(&s.committed().items, "b").unwrap().is_completed);
        assert_eq!(s.poll(), vec![SyncEvent::Committed { entries: 1 }]);
        assert!(!store.calls().is_empty());
    }

    #[test]
    fn edit_waits_for_failing_toggle_round() {
        let (store, release) = MockStore::gated_failing_on("b");
        let (s, store) = session(store);
        s.toggle("b", true).unwrap();

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            release.send(()).unwrap();
        });
        s.edit_description("a", "짐 싸기 끝내기").unwrap();
        releaser.join().unwrap();

        let snapshot = s.snapshot();
        let committed = s.committed();
        assert_eq!(
            tree_ops::find_by_id(&snapshot.items, "a").unwrap().description,
            "짐 싸기 끝내기"
        );
        assert_eq!(
            tree_ops::find_by_id(&committed.items, "a").unwrap().description,
            "짐 싸기 끝내기"
        );
        assert!(!tree_ops::find_by_id(&snapshot.items, "b").unwrap().is_completed);
        assert!(matches!(s.poll().as_slice(), [SyncEvent::Failed { .. }]));

        // the toggle call went out before the edit
        let calls = store.calls();
        assert!(matches!(&calls[0], Call::Update(id, _) if id == "b"));
        assert_eq!(
            calls.last(),
            Some(&Call::Update("a".into(), ItemUpdate::description("짐 싸기 끝내기")))
        );
    }

    #[test]
    fn toggle_after_edit_keeps_both() {
        let (s, _store) = session(MockStore::default());
        s.set_priority("a", Priority::Low).unwrap();
        s.toggle("b", true).unwrap();
        s.wait_idle();

        let committed = s.committed();
        assert_eq!(tree_ops::find_by_id(&committed.items, "a").unwrap().priority, Priority::Low);
        assert!(tree_ops::find_by_id(&committed.items, "b").unwrap().is_completed);
    }
}
