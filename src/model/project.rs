use serde::{Deserialize, Serialize};

use super::task::TaskNode;

/// A named to-do list and its task tree (a "list" in the backend's API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Title the list was generated from
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Root tasks, in sibling order
    #[serde(default)]
    pub items: Vec<TaskNode>,
}

impl Project {
    pub fn new(id: impl Into<String>, keyword: impl Into<String>) -> Self {
        Project {
            id: id.into(),
            keyword: keyword.into(),
            color: None,
            icon: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<TaskNode>) -> Self {
        self.items = items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_unknown_backend_fields() {
        let json = r##"{
            "id": "p1",
            "keyword": "이사 준비",
            "color": "#ff0000",
            "created_at": "2025-01-01T00:00:00",
            "updated_at": "2025-01-02T00:00:00",
            "items": []
        }"##;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.keyword, "이사 준비");
        assert_eq!(project.color.as_deref(), Some("#ff0000"));
        assert!(project.icon.is_none());
        assert!(project.items.is_empty());
    }
}
