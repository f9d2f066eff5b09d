/// Change notifications broadcast after successful writes.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum BoardChangeEvent {
    /// Project metadata, its columns, or a single task changed.
    ProjectChanged { project_id: String },
    ProjectDeleted { project_id: String },
    /// A bulk reorder touched tasks of these projects.
    TasksReordered { project_ids: Vec<String> },
}

impl BoardChangeEvent {
    pub fn changed(project_id: &str) -> Self {
        Self::ProjectChanged {
            project_id: project_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_by_type() {
        let json = serde_json::to_value(BoardChangeEvent::changed("p1")).unwrap();
        assert_eq!(json["type"], "ProjectChanged");
        assert_eq!(json["projectId"], "p1");

        let reordered = BoardChangeEvent::TasksReordered {
            project_ids: vec!["p1".into()],
        };
        let json = serde_json::to_value(reordered).unwrap();
        assert_eq!(json["projectIds"], serde_json::json!(["p1"]));
    }
}
