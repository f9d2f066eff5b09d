use std::fmt::Write;

use flowboard_core::board::BoardView;
use flowboard_core::drag::{BoardObserver, Notice, NoticeLevel};

/// Board as text, one block per column:
///
/// ```text
/// == To Do (2)
///   0. Write docs
///   1. Ship
/// ```
pub fn board_text(view: &BoardView) -> String {
    let mut out = String::new();
    for column in &view.columns {
        let _ = writeln!(out, "== {} ({})", column.name, column.tasks.len());
        if column.tasks.is_empty() {
            let _ = writeln!(out, "  (empty)");
        }
        for (index, task) in column.tasks.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}  [{}]", index, task.title, task.id);
        }
    }
    out
}

/// Prints every render to stdout and notices to stderr.
pub struct TerminalObserver {
    pub quiet: bool,
}

impl BoardObserver for TerminalObserver {
    fn render(&self, view: &BoardView) {
        if !self.quiet {
            print!("{}", board_text(view));
        }
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowboard_core::board::project;
    use flowboard_core::types::{Project, Task};

    #[test]
    fn test_board_text_lists_columns_in_order() {
        let p = Project::new("Launch", "");
        let task = sample_task(&p.id, "Write docs");
        let view = project(&[task], &p.column_order);

        let text = board_text(&view);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "== To Do (1)");
        assert!(lines[1].starts_with("  0. Write docs"));
        assert_eq!(lines[2], "== In Progress (0)");
        assert_eq!(lines[3], "  (empty)");
    }

    fn sample_task(project_id: &str, title: &str) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": "t1",
            "projectId": project_id,
            "title": title,
            "status": "To Do",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }
}
