use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::model::datetime;
use crate::model::project::Project;
use crate::model::task::{Priority, Recurrence, TaskNode, is_date_only};
use crate::ops::tree_ops;
use crate::parse::ParsedTask;
use crate::util::unicode::{display_width, pad_to_width};

/// Widest project title column in `tn projects`
const TITLE_COLUMN: usize = 32;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    /// 1-based position path, e.g. "2.1"
    pub path: String,
    pub description: String,
    pub is_completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct ProjectJson {
    pub id: String,
    pub keyword: String,
    pub done: usize,
    pub total: usize,
    pub items: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct ProjectSummaryJson {
    pub index: usize,
    pub id: String,
    pub keyword: String,
    pub done: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ParsedJson<'a> {
    pub description: &'a str,
    pub priority: Priority,
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
}

#[derive(Serialize)]
pub struct SuggestionsJson<'a> {
    pub task: &'a str,
    pub subtasks: &'a [&'a str],
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(node: &TaskNode, path: &str) -> TaskJson {
    TaskJson {
        id: node.id.clone(),
        path: path.to_string(),
        description: node.description.clone(),
        is_completed: node.is_completed,
        priority: node.priority,
        due_date: node.due_date.as_ref().map(datetime::format_iso),
        subtasks: node
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| task_to_json(child, &child_path(path, i)))
            .collect(),
    }
}

pub fn project_to_json(project: &Project) -> ProjectJson {
    let (done, total) = tree_ops::progress(&project.items);
    ProjectJson {
        id: project.id.clone(),
        keyword: project.keyword.clone(),
        done,
        total,
        items: project
            .items
            .iter()
            .enumerate()
            .map(|(i, node)| task_to_json(node, &(i + 1).to_string()))
            .collect(),
    }
}

pub fn summary_to_json(index: usize, project: &Project) -> ProjectSummaryJson {
    let (done, total) = tree_ops::progress(&project.items);
    ProjectSummaryJson {
        index,
        id: project.id.clone(),
        keyword: project.keyword.clone(),
        done,
        total,
    }
}

pub fn parsed_to_json(parsed: &ParsedTask) -> ParsedJson<'_> {
    ParsedJson {
        description: &parsed.description,
        priority: parsed.priority,
        due_date: parsed.due_date.as_ref().map(datetime::format_iso),
        recurring: parsed.recurring,
    }
}

/// `parent` is the position path of the parent, `index` is 0-based.
pub fn child_path(parent: &str, index: usize) -> String {
    format!("{}.{}", parent, index + 1)
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Date-only values print without a time of day.
pub fn format_due(due: &DateTime<FixedOffset>) -> String {
    if is_date_only(due) {
        due.format("%Y-%m-%d").to_string()
    } else {
        due.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Format a single task as a one-line summary
pub fn format_task_line(node: &TaskNode, path: &str) -> String {
    let check = if node.is_completed { 'x' } else { ' ' };
    let marker = node
        .priority
        .marker()
        .map(|m| format!(" {}", m))
        .unwrap_or_default();
    let due = node
        .due_date
        .as_ref()
        .map(|d| format!(" (due {})", format_due(d)))
        .unwrap_or_default();
    format!("[{}] {} {}{}{}", check, path, node.description, marker, due)
}

/// Format a task with its subtasks, indented
pub fn format_task_tree(node: &TaskNode, path: &str, indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let prefix = "  ".repeat(indent);
    lines.push(format!("{}{}", prefix, format_task_line(node, path)));

    for (i, child) in node.children.iter().enumerate() {
        lines.extend(format_task_tree(child, &child_path(path, i), indent + 1));
    }
    lines
}

/// Header line followed by the whole tree
pub fn format_project(project: &Project) -> Vec<String> {
    let (done, total) = tree_ops::progress(&project.items);
    let mut lines = vec![format!("{} ({}/{})", project.keyword, done, total)];
    if project.items.is_empty() {
        lines.push("  (no tasks)".to_string());
    }
    for (i, node) in project.items.iter().enumerate() {
        lines.extend(format_task_tree(node, &(i + 1).to_string(), 1));
    }
    lines
}

/// One row per project: position, padded title, progress and id
pub fn format_project_rows(projects: &[Project]) -> Vec<String> {
    let title_width = projects
        .iter()
        .map(|p| display_width(&p.keyword))
        .max()
        .unwrap_or(0)
        .min(TITLE_COLUMN);
    let index_width = projects.len().to_string().len();

    projects
        .iter()
        .enumerate()
        .map(|(i, project)| {
            let (done, total) = tree_ops::progress(&project.items);
            format!(
                "{:>iw$}  {}  {:>3}/{:<3}  {}",
                i + 1,
                pad_to_width(&project.keyword, title_width),
                done,
                total,
                project.id,
                iw = index_width,
            )
        })
        .collect()
}

pub fn format_parsed(parsed: &ParsedTask) -> Vec<String> {
    let mut lines = vec![
        format!("description: {}", parsed.description),
        format!("priority:    {}", parsed.priority),
    ];
    match &parsed.due_date {
        Some(due) => lines.push(format!("due:         {}", datetime::format_iso(due))),
        None => lines.push("due:         -".to_string()),
    }
    if let Some(r) = parsed.recurring {
        let cadence = match r {
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        };
        lines.push(format!("repeats:     {}", cadence));
    }
    lines
}
