//! Pure operations over a task tree.
//!
//! Every function takes the current tree by reference and returns a new one;
//! the input is never modified. An id that does not exist leaves the tree
//! as it was.

use chrono::{DateTime, FixedOffset};

use crate::model::task::{Priority, TaskNode};

/// One node whose completion state has to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionChange {
    pub id: String,
    pub is_completed: bool,
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Depth-first search, first match wins.
pub fn find_by_id<'a>(tree: &'a [TaskNode], id: &str) -> Option<&'a TaskNode> {
    for node in tree {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_by_id(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_by_id_mut<'a>(tree: &'a mut [TaskNode], id: &str) -> Option<&'a mut TaskNode> {
    for node in tree.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_by_id_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Clone the tree and apply `f` to the node with `id`, if present.
fn update_node(tree: &[TaskNode], id: &str, f: impl FnOnce(&mut TaskNode)) -> Vec<TaskNode> {
    let mut next = tree.to_vec();
    if let Some(node) = find_by_id_mut(&mut next, id) {
        f(node);
    }
    next
}

/// Total number of nodes at every depth.
pub fn count_nodes(tree: &[TaskNode]) -> usize {
    tree.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

/// `(completed, total)` over every node, parents included.
pub fn progress(tree: &[TaskNode]) -> (usize, usize) {
    tree.iter().fold((0, 0), |(done, total), node| {
        let (child_done, child_total) = progress(&node.children);
        (
            done + usize::from(node.is_completed) + child_done,
            total + 1 + child_total,
        )
    })
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Set the target and all of its descendants to `completed`.
/// Ancestors are left for `synchronize_parents`.
pub fn toggle_completion(tree: &[TaskNode], id: &str, completed: bool) -> Vec<TaskNode> {
    update_node(tree, id, |node| node.set_completed_recursive(completed))
}

/// Recompute each parent's completion from its children until nothing changes.
pub fn synchronize_parents(tree: &[TaskNode]) -> Vec<TaskNode> {
    let mut next = tree.to_vec();
    while sync_sweep(&mut next) {}
    next
}

/// One bottom-up sweep. Returns whether any node changed.
fn sync_sweep(nodes: &mut [TaskNode]) -> bool {
    let mut changed = false;
    for node in nodes.iter_mut() {
        if node.children.is_empty() {
            continue;
        }
        changed |= sync_sweep(&mut node.children);
        let all_done = node.children.iter().all(|c| c.is_completed);
        if node.is_completed != all_done {
            node.is_completed = all_done;
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Move the sibling at `from` to position `to` within the children of
/// `parent_id`, or within the roots when `parent_id` is `None`.
pub fn reorder_siblings(
    tree: &[TaskNode],
    parent_id: Option<&str>,
    from: usize,
    to: usize,
) -> Vec<TaskNode> {
    let mut next = tree.to_vec();
    let siblings = match parent_id {
        None => Some(&mut next),
        Some(pid) => find_by_id_mut(&mut next, pid).map(|p| &mut p.children),
    };
    if let Some(siblings) = siblings {
        if from < siblings.len() && to < siblings.len() && from != to {
            let moved = siblings.remove(from);
            siblings.insert(to, moved);
        }
    }
    next
}

/// Rewrite every `order` to the node's index among its siblings.
pub fn reassign_order(tree: &[TaskNode]) -> Vec<TaskNode> {
    let mut next = tree.to_vec();
    reassign_in_place(&mut next);
    next
}

fn reassign_in_place(nodes: &mut [TaskNode]) {
    for (i, node) in nodes.iter_mut().enumerate() {
        node.order = i as i64;
        reassign_in_place(&mut node.children);
    }
}

/// Incomplete nodes first, then by `order`, at every level. Stable.
pub fn sort_by_completion_then_order(tree: &[TaskNode]) -> Vec<TaskNode> {
    let mut next = tree.to_vec();
    sort_in_place(&mut next);
    next
}

fn sort_in_place(nodes: &mut [TaskNode]) {
    nodes.sort_by_key(|n| (n.is_completed, n.order));
    for node in nodes.iter_mut() {
        sort_in_place(&mut node.children);
    }
}

/// Every node's id and order, pre-order.
pub fn order_entries(tree: &[TaskNode]) -> Vec<(String, i64)> {
    let mut out = Vec::new();
    collect_orders(tree, &mut out);
    out
}

fn collect_orders(nodes: &[TaskNode], out: &mut Vec<(String, i64)>) {
    for node in nodes {
        out.push((node.id.clone(), node.order));
        collect_orders(&node.children, out);
    }
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

pub fn edit_description(tree: &[TaskNode], id: &str, description: &str) -> Vec<TaskNode> {
    update_node(tree, id, |node| node.description = description.to_string())
}

pub fn set_priority(tree: &[TaskNode], id: &str, priority: Priority) -> Vec<TaskNode> {
    update_node(tree, id, |node| node.priority = priority)
}

pub fn set_due_date(
    tree: &[TaskNode],
    id: &str,
    due_date: Option<DateTime<FixedOffset>>,
) -> Vec<TaskNode> {
    update_node(tree, id, |node| node.due_date = due_date)
}

/// Remove the node and everything under it, at whatever depth it sits.
pub fn delete_subtree(tree: &[TaskNode], id: &str) -> Vec<TaskNode> {
    tree.iter()
        .filter(|n| n.id != id)
        .map(|n| TaskNode {
            children: delete_subtree(&n.children, id),
            ..n.clone()
        })
        .collect()
}

/// Append `node` under `parent_id`, or at the root when `None`.
pub fn append_child(tree: &[TaskNode], parent_id: Option<&str>, node: TaskNode) -> Vec<TaskNode> {
    match parent_id {
        None => {
            let mut next = tree.to_vec();
            next.push(node);
            next
        }
        Some(pid) => update_node(tree, pid, |parent| parent.children.push(node)),
    }
}

/// Swap in a node returned by the server (same id), keeping its position.
pub fn replace_node(tree: &[TaskNode], replacement: &TaskNode) -> Vec<TaskNode> {
    update_node(tree, &replacement.id, |node| *node = replacement.clone())
}

// ---------------------------------------------------------------------------
// Composite pipelines
// ---------------------------------------------------------------------------

/// Optimistic toggle: cascade down, derive parents, push completed nodes
/// after open ones and renumber.
pub fn apply_toggle(tree: &[TaskNode], id: &str, completed: bool) -> Vec<TaskNode> {
    let toggled = toggle_completion(tree, id, completed);
    let synced = synchronize_parents(&toggled);
    let sorted = sort_by_completion_then_order(&synced);
    reassign_order(&sorted)
}

/// Nodes of `after` that are new or whose completion differs from `before`.
pub fn completion_changes(before: &[TaskNode], after: &[TaskNode]) -> Vec<CompletionChange> {
    let mut out = Vec::new();
    collect_changes(before, after, &mut out);
    out
}

fn collect_changes(before: &[TaskNode], nodes: &[TaskNode], out: &mut Vec<CompletionChange>) {
    for node in nodes {
        let prior = find_by_id(before, &node.id);
        if prior.is_none_or(|p| p.is_completed != node.is_completed) {
            out.push(CompletionChange {
                id: node.id.clone(),
                is_completed: node.is_completed,
            });
        }
        collect_changes(before, &node.children, out);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
